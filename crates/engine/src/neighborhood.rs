//! Item-based neighborhood predictor
//!
//! Predicts a rating as the baseline estimate corrected by the
//! similarity-weighted deviations of the most similar items the user rated.

use crate::bias::Biases;
use crate::similarity::item_similarities;
use ratings_core::{RatingMatrix, RatingRecord, RatingsError};
use std::cmp::Ordering;

/// One (item, user) cell to predict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionRequest {
    pub item: usize,
    pub user: usize,
}

impl PredictionRequest {
    pub fn new(item: usize, user: usize) -> Self {
        Self { item, user }
    }

    /// Request for a record's cell, checked against the matrix shape
    pub fn from_record(record: &RatingRecord, matrix: &RatingMatrix) -> Result<Self, RatingsError> {
        let request = Self::new(record.item_index()?, record.user_index()?);
        if !matrix.contains(request.item, request.user) {
            return Err(RatingsError::InvalidInput(format!(
                "record (user {}, item {}) outside a {}x{} matrix",
                record.user_id,
                record.item_id,
                matrix.n_items(),
                matrix.n_users()
            )));
        }
        Ok(request)
    }

    pub fn from_records(
        records: &[RatingRecord],
        matrix: &RatingMatrix,
    ) -> Result<Vec<Self>, RatingsError> {
        records
            .iter()
            .map(|record| Self::from_record(record, matrix))
            .collect()
    }
}

/// Neighborhood predictor over read-only shared state
#[derive(Debug, Clone, Copy)]
pub struct NeighborhoodPredictor<'a> {
    matrix: &'a RatingMatrix,
    biases: &'a Biases,
    global_average: f64,
}

impl<'a> NeighborhoodPredictor<'a> {
    pub fn new(matrix: &'a RatingMatrix, biases: &'a Biases, global_average: f64) -> Self {
        Self {
            matrix,
            biases,
            global_average,
        }
    }

    pub fn baseline(&self, item: usize, user: usize) -> f64 {
        self.biases.baseline(self.global_average, item, user)
    }

    /// Predict `user`'s rating of `item` from its `k` most similar items
    pub fn predict(&self, user: usize, item: usize, k: usize) -> f64 {
        let mut neighbours = item_similarities(self.matrix, item, user);
        // Stable: equal correlations keep item order
        neighbours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (neighbour, similarity) in neighbours.into_iter().take(k) {
            if similarity.is_nan() {
                continue;
            }
            let Some(rating) = self.matrix.get(neighbour, user) else {
                continue;
            };
            weighted_sum += similarity * (rating - self.baseline(neighbour, user));
            weight_sum += similarity;
        }

        let baseline = self.baseline(item, user);
        if weight_sum == 0.0 {
            baseline
        } else {
            baseline + weighted_sum / weight_sum
        }
    }

    pub fn predict_request(&self, request: &PredictionRequest, k: usize) -> f64 {
        self.predict(request.user, request.item, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::compute_biases;

    fn scenario() -> RatingMatrix {
        RatingMatrix::from_rows(&[
            vec![Some(4.0), Some(3.0), Some(5.0)],
            vec![Some(2.0), None, Some(4.0)],
            vec![Some(3.0), Some(5.0), Some(1.0)],
        ])
        .unwrap()
    }

    #[test]
    fn test_scenario_prediction_k1() {
        let matrix = scenario();
        let biases = compute_biases(&matrix, 3.375);
        let predictor = NeighborhoodPredictor::new(&matrix, &biases, 3.375);

        // Best neighbour is item 0 (r = 1): 3.625 + (3 - 4.625)
        let prediction = predictor.predict(1, 1, 1);
        assert!((prediction - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_prediction_k2_cancels_out() {
        let matrix = scenario();
        let biases = compute_biases(&matrix, 3.375);
        let predictor = NeighborhoodPredictor::new(&matrix, &biases, 3.375);

        // Correlations +1 and -1 sum to zero weight: baseline fallback
        let prediction = predictor.predict(1, 1, 2);
        assert!((prediction - predictor.baseline(1, 1)).abs() < 1e-12);
    }

    #[test]
    fn test_equal_similarities_keep_item_order() {
        // Items 1 and 2 agree with item 0 on users 0..3 and differ for user 3
        let matrix = RatingMatrix::from_rows(&[
            vec![Some(1.0), Some(2.0), Some(3.0), None],
            vec![Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
            vec![Some(2.0), Some(3.0), Some(4.0), Some(1.0)],
        ])
        .unwrap();
        let g = 30.0 / 11.0;
        let biases = compute_biases(&matrix, g);
        let predictor = NeighborhoodPredictor::new(&matrix, &biases, g);

        let similarities = item_similarities(&matrix, 0, 3);
        assert_eq!(similarities.len(), 2);
        assert_eq!(similarities[0].1, similarities[1].1);

        let prediction = predictor.predict(3, 0, 1);
        let expected = predictor.baseline(0, 3) + (5.0 - predictor.baseline(1, 3));
        assert!((prediction - expected).abs() < 1e-12);
        assert!((prediction - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_neighbours_returns_baseline() {
        let matrix = RatingMatrix::from_rows(&[
            vec![Some(4.0), None],
            vec![None, Some(2.0)],
        ])
        .unwrap();
        let biases = compute_biases(&matrix, 3.0);
        let predictor = NeighborhoodPredictor::new(&matrix, &biases, 3.0);

        assert_eq!(predictor.predict(1, 0, 5), predictor.baseline(0, 1));
    }

    #[test]
    fn test_request_from_record() {
        let matrix = scenario();
        let record = RatingRecord::new(2, 3, 4.0, 0);
        let request = PredictionRequest::from_record(&record, &matrix).unwrap();
        assert_eq!(request, PredictionRequest::new(2, 1));

        let outside = RatingRecord::new(4, 1, 4.0, 0);
        assert!(PredictionRequest::from_record(&outside, &matrix).is_err());
    }
}
