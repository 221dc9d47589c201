//! Prediction accuracy

use ratings_core::RatingsError;

/// Root-mean-squared error of `predictions` against `ground_truth`.
///
/// Both slices must be the same length; an empty pair scores 0.0.
pub fn rmse(predictions: &[f64], ground_truth: &[f64]) -> Result<f64, RatingsError> {
    if predictions.len() != ground_truth.len() {
        return Err(RatingsError::ShapeMismatch {
            predictions: predictions.len(),
            ground_truth: ground_truth.len(),
        });
    }
    if predictions.is_empty() {
        return Ok(0.0);
    }

    let squared: f64 = predictions
        .iter()
        .zip(ground_truth)
        .map(|(p, a)| (p - a).powi(2))
        .sum();

    Ok((squared / predictions.len() as f64).sqrt())
}
