//! Baseline estimation: global average plus per-user and per-item offsets

use ndarray::Array1;
use ratings_core::{RatingMatrix, RatingRecord};

/// Additive user and item offsets from the global average
#[derive(Debug, Clone, PartialEq)]
pub struct Biases {
    /// Indexed by user (matrix column)
    pub user: Array1<f64>,
    /// Indexed by item (matrix row)
    pub item: Array1<f64>,
}

impl Biases {
    pub fn zeros(n_items: usize, n_users: usize) -> Self {
        Self {
            user: Array1::zeros(n_users),
            item: Array1::zeros(n_items),
        }
    }

    /// Zero-order prediction `global_average + user_bias[user] + item_bias[item]`
    pub fn baseline(&self, global_average: f64, item: usize, user: usize) -> f64 {
        global_average + self.user[user] + self.item[item]
    }

    pub fn matches(&self, matrix: &RatingMatrix) -> bool {
        self.item.len() == matrix.n_items() && self.user.len() == matrix.n_users()
    }
}

/// Mean rating of a record set; 0.0 when empty
pub fn global_average(records: &[RatingRecord]) -> f64 {
    mean(records.iter().map(|r| r.rating)).unwrap_or(0.0)
}

/// Per-user and per-item offsets from `global_average`.
///
/// A user or item without any rating gets exactly 0.0.
pub fn compute_biases(matrix: &RatingMatrix, global_average: f64) -> Biases {
    let offset = |mean: Option<f64>| mean.map_or(0.0, |m| m - global_average);

    let user = (0..matrix.n_users())
        .map(|u| offset(mean(matrix.user_column(u).iter().flatten().copied())))
        .collect::<Array1<f64>>();
    let item = (0..matrix.n_items())
        .map(|i| offset(mean(matrix.item_row(i).iter().flatten().copied())))
        .collect::<Array1<f64>>();

    Biases { user, item }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
