//! Dense item-by-user rating matrix
//!
//! Rows are items, columns are users. Every cell is an explicit
//! `Option<f64>`: `None` marks a rating that was not observed in the
//! training split.

use crate::error::RatingsError;
use crate::models::rating::RatingRecord;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingMatrix {
    cells: Array2<Option<f64>>,
}

impl RatingMatrix {
    /// Matrix of the given shape with every cell missing
    pub fn new(n_items: usize, n_users: usize) -> Self {
        Self {
            cells: Array2::from_elem((n_items, n_users), None),
        }
    }

    /// Fill a matrix of the given shape from records.
    ///
    /// Later records overwrite earlier ones for the same cell.
    pub fn from_records(
        records: &[RatingRecord],
        n_items: usize,
        n_users: usize,
    ) -> Result<Self, RatingsError> {
        let mut matrix = Self::new(n_items, n_users);

        for record in records {
            let item = record.item_index()?;
            let user = record.user_index()?;
            if item >= n_items || user >= n_users {
                return Err(RatingsError::InvalidInput(format!(
                    "record (user {}, item {}) outside a {}x{} matrix",
                    record.user_id, record.item_id, n_items, n_users
                )));
            }
            matrix.cells[[item, user]] = Some(record.rating);
        }

        Ok(matrix)
    }

    /// Build from item rows; all rows must have the same length
    pub fn from_rows(rows: &[Vec<Option<f64>>]) -> Result<Self, RatingsError> {
        let n_users = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != n_users) {
            return Err(RatingsError::InvalidInput(
                "rating rows must all have the same length".to_string(),
            ));
        }

        let flat: Vec<Option<f64>> = rows.iter().flatten().copied().collect();
        let cells = Array2::from_shape_vec((rows.len(), n_users), flat)
            .map_err(|e| RatingsError::InvalidInput(e.to_string()))?;

        Ok(Self { cells })
    }

    pub fn n_items(&self) -> usize {
        self.cells.nrows()
    }

    pub fn n_users(&self) -> usize {
        self.cells.ncols()
    }

    /// Rating of `user` for `item`, `None` when missing or out of range
    pub fn get(&self, item: usize, user: usize) -> Option<f64> {
        self.cells.get([item, user]).copied().flatten()
    }

    pub fn contains(&self, item: usize, user: usize) -> bool {
        item < self.n_items() && user < self.n_users()
    }

    /// All users' ratings of one item
    pub fn item_row(&self, item: usize) -> ArrayView1<'_, Option<f64>> {
        self.cells.row(item)
    }

    /// All items' ratings by one user
    pub fn user_column(&self, user: usize) -> ArrayView1<'_, Option<f64>> {
        self.cells.column(user)
    }

    /// Observed cells as `(item, user, rating)`, item-major then user-minor
    pub fn observed(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cells
            .indexed_iter()
            .filter_map(|((item, user), cell)| (*cell).map(|rating| (item, user, rating)))
    }

    pub fn observed_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}
