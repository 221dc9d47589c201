//! Rating prediction engine
//!
//! This crate implements the predictive layer of the ratings workspace:
//! bias estimation, item similarity, neighborhood prediction with a parallel
//! dispatcher, SGD matrix factorization, RMSE evaluation and hyperparameter
//! search. Dataset loading, configuration and run logging live in
//! `ratings-core`.

pub mod bias;
pub mod dispatcher;
pub mod evaluation;
pub mod factorization;
pub mod hyperparameter;
pub mod neighborhood;
pub mod pipeline;
pub mod similarity;

// Re-export key types
pub use bias::{compute_biases, global_average, Biases};
pub use dispatcher::{partition_bounds, ParallelDispatcher};
pub use evaluation::rmse;
pub use factorization::{FactorModel, FactorParams, FactorTrainer};
pub use hyperparameter::{HyperparameterSearch, SearchOutcome, SearchSpace, Trial};
pub use neighborhood::{NeighborhoodPredictor, PredictionRequest};
pub use pipeline::{record_run, Operation, Pipeline, RunReport};
pub use similarity::{item_similarities, pearson};
