//! Matrix Factorization using Stochastic Gradient Descent (SGD)
//!
//! Learns item factors Q (items x k) and user factors P (k x users) on top of
//! the bias-corrected baseline. Every observed cell is visited item-major,
//! user-minor, and its update is applied immediately, so later cells in the
//! same epoch see earlier updates.

use crate::bias::Biases;
use ndarray::Array2;
use rand::Rng;
use ratings_core::{FactorSettings, RatingMatrix, RatingRecord, RatingsError};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Epochs between debug loss reports
const LOSS_LOG_INTERVAL: usize = 50;

/// SGD configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorParams {
    /// Number of latent factors (embedding dimension)
    pub latent_factors: usize,
    /// Number of passes over the observed ratings
    pub epochs: usize,
    /// Learning rate
    pub alpha: f64,
    /// Regularization parameter (lambda)
    pub lambda: f64,
}

impl Default for FactorParams {
    fn default() -> Self {
        Self {
            latent_factors: 10,
            epochs: 200,
            alpha: 0.01,
            lambda: 0.1,
        }
    }
}

impl From<FactorSettings> for FactorParams {
    fn from(settings: FactorSettings) -> Self {
        Self {
            latent_factors: settings.latent_factors,
            epochs: settings.train_epoch,
            alpha: settings.alpha,
            lambda: settings.regularization_factor,
        }
    }
}

impl FactorParams {
    pub fn validate(&self) -> Result<(), RatingsError> {
        if self.latent_factors == 0 {
            return Err(RatingsError::InvalidInput(
                "latent_factors must be at least 1".to_string(),
            ));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(RatingsError::InvalidInput(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(RatingsError::InvalidInput(format!(
                "lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

/// A trained factor model
#[derive(Debug, Clone, PartialEq)]
pub struct FactorModel {
    /// Item latent factors: [num_items x latent_factors]
    pub q: Array2<f64>,
    /// User latent factors: [latent_factors x num_users]
    pub p: Array2<f64>,
    /// Biases refined during training
    pub biases: Biases,
    pub global_average: f64,
}

impl FactorModel {
    pub fn latent_factors(&self) -> usize {
        self.q.ncols()
    }

    /// Predict rating for item-user pair
    pub fn predict(&self, item: usize, user: usize) -> f64 {
        self.biases.baseline(self.global_average, item, user)
            + self.q.row(item).dot(&self.p.column(user))
    }

    /// Predict the cell of every record, in record order
    pub fn predict_records(&self, records: &[RatingRecord]) -> Result<Vec<f64>, RatingsError> {
        records
            .iter()
            .map(|record| {
                let item = record.item_index()?;
                let user = record.user_index()?;
                if item >= self.q.nrows() || user >= self.p.ncols() {
                    return Err(RatingsError::InvalidInput(format!(
                        "record (user {}, item {}) outside the trained model",
                        record.user_id, record.item_id
                    )));
                }
                Ok(self.predict(item, user))
            })
            .collect()
    }
}

/// SGD trainer over a read-only rating matrix
#[derive(Debug, Clone, Copy)]
pub struct FactorTrainer<'a> {
    matrix: &'a RatingMatrix,
    global_average: f64,
}

impl<'a> FactorTrainer<'a> {
    pub fn new(matrix: &'a RatingMatrix, global_average: f64) -> Self {
        Self {
            matrix,
            global_average,
        }
    }

    /// Train from factors drawn uniformly from [0, 1).
    ///
    /// The trainer takes ownership of `biases`; pass a clone to keep the
    /// initial tables. The refined biases are returned in the model.
    pub fn train<R: Rng + ?Sized>(
        &self,
        params: &FactorParams,
        biases: Biases,
        rng: &mut R,
    ) -> Result<FactorModel, RatingsError> {
        params.validate()?;

        let k = params.latent_factors;
        let q = Array2::from_shape_simple_fn((self.matrix.n_items(), k), || rng.gen::<f64>());
        let p = Array2::from_shape_simple_fn((k, self.matrix.n_users()), || rng.gen::<f64>());

        self.train_from(params, q, p, biases)
    }

    /// Train from explicit initial factors
    pub fn train_from(
        &self,
        params: &FactorParams,
        mut q: Array2<f64>,
        mut p: Array2<f64>,
        mut biases: Biases,
    ) -> Result<FactorModel, RatingsError> {
        params.validate()?;
        self.check_shapes(params, &q, &p, &biases)?;

        let alpha = params.alpha;
        let lambda = params.lambda;
        let k = params.latent_factors;
        let g = self.global_average;

        for epoch in 0..params.epochs {
            for (i, u, rating) in self.matrix.observed() {
                let prediction = g + biases.item[i] + biases.user[u] + q.row(i).dot(&p.column(u));
                let e = rating - prediction;

                biases.item[i] += alpha * (e - lambda * biases.item[i]);
                biases.user[u] += alpha * (e - lambda * biases.user[u]);
                for f in 0..k {
                    q[[i, f]] += alpha * (e * p[[f, u]] - lambda * q[[i, f]]);
                }
                // Uses the item row updated just above
                for f in 0..k {
                    p[[f, u]] += alpha * (e * q[[i, f]] - lambda * p[[f, u]]);
                }
            }

            if epoch % LOSS_LOG_INTERVAL == 0 && tracing::enabled!(Level::DEBUG) {
                let loss = self.compute_loss(&q, &p, &biases);
                tracing::debug!("SGD epoch {}: loss = {:.4}", epoch, loss);
            }
        }

        Ok(FactorModel {
            q,
            p,
            biases,
            global_average: g,
        })
    }

    fn check_shapes(
        &self,
        params: &FactorParams,
        q: &Array2<f64>,
        p: &Array2<f64>,
        biases: &Biases,
    ) -> Result<(), RatingsError> {
        let (n_items, n_users) = (self.matrix.n_items(), self.matrix.n_users());
        let k = params.latent_factors;

        if q.dim() != (n_items, k) || p.dim() != (k, n_users) {
            return Err(RatingsError::InvalidInput(format!(
                "factor shapes {:?} and {:?} do not fit a {}x{} matrix with {} factors",
                q.dim(),
                p.dim(),
                n_items,
                n_users,
                k
            )));
        }
        if !biases.matches(self.matrix) {
            return Err(RatingsError::InvalidInput(format!(
                "bias tables ({} items, {} users) do not fit a {}x{} matrix",
                biases.item.len(),
                biases.user.len(),
                n_items,
                n_users
            )));
        }
        Ok(())
    }

    /// Mean squared error over the observed training cells
    fn compute_loss(&self, q: &Array2<f64>, p: &Array2<f64>, biases: &Biases) -> f64 {
        let mut loss = 0.0;
        let mut count = 0;

        for (i, u, rating) in self.matrix.observed() {
            let prediction =
                biases.baseline(self.global_average, i, u) + q.row(i).dot(&p.column(u));
            loss += (rating - prediction).powi(2);
            count += 1;
        }

        if count > 0 {
            loss / count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::compute_biases;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario() -> RatingMatrix {
        RatingMatrix::from_rows(&[
            vec![Some(4.0), Some(3.0), Some(5.0)],
            vec![Some(2.0), None, Some(4.0)],
            vec![Some(3.0), Some(5.0), Some(1.0)],
        ])
        .unwrap()
    }

    #[test]
    fn test_single_cell_update() {
        let matrix = RatingMatrix::from_rows(&[vec![Some(4.0)]]).unwrap();
        let trainer = FactorTrainer::new(&matrix, 3.0);
        let params = FactorParams {
            latent_factors: 1,
            epochs: 1,
            alpha: 0.1,
            lambda: 0.1,
        };

        let model = trainer
            .train_from(
                &params,
                Array2::from_elem((1, 1), 0.5),
                Array2::from_elem((1, 1), 0.5),
                Biases::zeros(1, 1),
            )
            .unwrap();

        // e = 4 - (3 + 0.25) = 0.75
        assert!((model.biases.item[0] - 0.075).abs() < 1e-12);
        assert!((model.biases.user[0] - 0.075).abs() < 1e-12);
        assert!((model.q[[0, 0]] - 0.5325).abs() < 1e-12);
        assert!((model.p[[0, 0]] - 0.5349375).abs() < 1e-12);
    }

    #[test]
    fn test_random_init_in_unit_interval() {
        let matrix = scenario();
        let trainer = FactorTrainer::new(&matrix, 3.375);
        let params = FactorParams {
            latent_factors: 4,
            epochs: 0,
            ..FactorParams::default()
        };
        let mut rng = StdRng::seed_from_u64(42);

        let model = trainer
            .train(&params, compute_biases(&matrix, 3.375), &mut rng)
            .unwrap();

        assert_eq!(model.q.dim(), (3, 4));
        assert_eq!(model.p.dim(), (4, 3));
        assert!(model.q.iter().chain(model.p.iter()).all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_training_reduces_error() {
        let matrix = scenario();
        let trainer = FactorTrainer::new(&matrix, 3.375);
        let biases = compute_biases(&matrix, 3.375);
        let mut rng = StdRng::seed_from_u64(3);
        let params = FactorParams {
            latent_factors: 2,
            epochs: 300,
            alpha: 0.02,
            lambda: 0.02,
        };

        let untrained = trainer
            .train(
                &FactorParams { epochs: 0, ..params },
                biases.clone(),
                &mut StdRng::seed_from_u64(3),
            )
            .unwrap();
        let trained = trainer.train(&params, biases, &mut rng).unwrap();

        let before = trainer.compute_loss(&untrained.q, &untrained.p, &untrained.biases);
        let after = trainer.compute_loss(&trained.q, &trained.p, &trained.biases);
        assert!(after < before, "loss {} should drop below {}", after, before);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let matrix = scenario();
        let trainer = FactorTrainer::new(&matrix, 3.375);
        let params = FactorParams {
            latent_factors: 2,
            ..FactorParams::default()
        };

        let result = trainer.train_from(
            &params,
            Array2::zeros((3, 3)),
            Array2::zeros((2, 3)),
            Biases::zeros(3, 3),
        );
        assert!(matches!(result, Err(RatingsError::InvalidInput(_))));

        let result = trainer.train_from(
            &params,
            Array2::zeros((3, 2)),
            Array2::zeros((2, 3)),
            Biases::zeros(2, 3),
        );
        assert!(matches!(result, Err(RatingsError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_params() {
        let params = FactorParams {
            alpha: 0.0,
            ..FactorParams::default()
        };
        assert!(params.validate().is_err());

        let params = FactorParams {
            latent_factors: 0,
            ..FactorParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_predict_records() {
        let model = FactorModel {
            q: Array2::from_elem((3, 1), 1.0),
            p: Array2::from_elem((1, 3), 0.5),
            biases: Biases::zeros(3, 3),
            global_average: 3.0,
        };

        let records = vec![RatingRecord::new(1, 1, 4.0, 0), RatingRecord::new(3, 2, 2.0, 0)];
        assert_eq!(model.predict_records(&records).unwrap(), vec![3.5, 3.5]);

        let outside = vec![RatingRecord::new(1, 9, 4.0, 0)];
        assert!(model.predict_records(&outside).is_err());
    }
}
