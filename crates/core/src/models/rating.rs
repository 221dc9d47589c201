use crate::error::RatingsError;
use serde::{Deserialize, Serialize};

/// A single observed rating as it appears in the raw dataset.
///
/// Ids are 1-based; use [`RatingRecord::user_index`] and
/// [`RatingRecord::item_index`] for 0-based matrix positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: u32,
    pub item_id: u32,
    pub rating: f64,
    pub timestamp: i64,
}

impl RatingRecord {
    pub fn new(user_id: u32, item_id: u32, rating: f64, timestamp: i64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
            timestamp,
        }
    }

    /// 0-based column index of the user
    pub fn user_index(&self) -> Result<usize, RatingsError> {
        to_index(self.user_id, "user_id")
    }

    /// 0-based row index of the item
    pub fn item_index(&self) -> Result<usize, RatingsError> {
        to_index(self.item_id, "item_id")
    }
}

fn to_index(id: u32, field: &str) -> Result<usize, RatingsError> {
    if id == 0 {
        return Err(RatingsError::InvalidInput(format!(
            "{} must be 1-based, got 0",
            field
        )));
    }
    Ok(id as usize - 1)
}

/// Ratings of a record set, in record order
pub fn ratings_of(records: &[RatingRecord]) -> Vec<f64> {
    records.iter().map(|r| r.rating).collect()
}
