//! End-to-end runs of the two prediction strategies
//!
//! A [`Pipeline`] owns nothing: it borrows the run configuration and the
//! dataset splits, computes the global average and bias tables once, and
//! scores the chosen strategy on the test split.

use crate::bias::{compute_biases, global_average, Biases};
use crate::dispatcher::ParallelDispatcher;
use crate::evaluation::rmse;
use crate::factorization::{FactorParams, FactorTrainer};
use crate::hyperparameter::{HyperparameterSearch, SearchSpace, Trial};
use crate::neighborhood::{NeighborhoodPredictor, PredictionRequest};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratings_core::{ratings_of, MetricsLogger, RatingsError, RunConfig, RunRecord, Splits};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Neighborhood,
    Factorization,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Neighborhood => write!(f, "neighborhood"),
            Operation::Factorization => write!(f, "factorization"),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub operation: Operation,
    /// Test-split RMSE
    pub rmse: f64,
    pub elapsed_seconds: f64,
    /// Factor parameters the scored model was trained with
    pub best_params: Option<FactorParams>,
    /// Search trials, empty unless the hyperparameter search ran
    pub trials: Vec<Trial>,
}

impl RunReport {
    /// Metrics row for this report
    pub fn to_record(&self, config: &RunConfig) -> RunRecord {
        let record = RunRecord {
            elapsed_seconds: self.elapsed_seconds,
            ..RunRecord::new(self.operation.to_string(), self.rmse, Default::default(), config)
        };

        match self.best_params {
            Some(params) => record.with_hyperparameters(
                params.latent_factors,
                params.epochs,
                params.alpha,
                params.lambda,
            ),
            None => record,
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a RunConfig,
    splits: &'a Splits,
    global_average: f64,
    biases: Biases,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a RunConfig, splits: &'a Splits) -> Self {
        let global_average = global_average(&splits.train);
        let biases = compute_biases(&splits.matrix, global_average);

        info!(
            global_average,
            train = splits.train.len(),
            test = splits.test.len(),
            validation = splits.validation.len(),
            "Computed baseline"
        );

        Self {
            config,
            splits,
            global_average,
            biases,
        }
    }

    pub fn global_average(&self) -> f64 {
        self.global_average
    }

    pub fn biases(&self) -> &Biases {
        &self.biases
    }

    pub fn run(&self, operation: Operation) -> Result<RunReport, RatingsError> {
        match operation {
            Operation::Neighborhood => self.run_neighborhood(),
            Operation::Factorization => self.run_factorization(),
        }
    }

    /// Predict the test split with the neighborhood predictor
    pub fn run_neighborhood(&self) -> Result<RunReport, RatingsError> {
        let started = Instant::now();
        let matrix = &self.splits.matrix;
        let k = self.config.number_neighbours;

        let requests = PredictionRequest::from_records(&self.splits.test, matrix)?;
        let predictor = NeighborhoodPredictor::new(matrix, &self.biases, self.global_average);
        let dispatcher = ParallelDispatcher::new(self.config.number_processes)?;

        info!(
            requests = requests.len(),
            workers = dispatcher.num_workers(),
            neighbours = k,
            "Starting neighborhood prediction"
        );
        let predictions = dispatcher.predict_batch(&predictor, &requests, k)?;
        let rmse = rmse(&predictions, &ratings_of(&self.splits.test))?;

        Ok(RunReport {
            operation: Operation::Neighborhood,
            rmse,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            best_params: None,
            trials: Vec::new(),
        })
    }

    /// Train a factor model, searching its parameters when configured, and
    /// score it on the test split
    pub fn run_factorization(&self) -> Result<RunReport, RatingsError> {
        let started = Instant::now();
        let trainer = FactorTrainer::new(&self.splits.matrix, self.global_average);

        let (params, model, trials) = if self.config.hyper_optimization {
            let search = HyperparameterSearch::new(trainer, &self.biases, &self.splits.validation)
                .with_space(SearchSpace::default())
                .with_seed(self.config.seed.unwrap_or_else(rand::random))
                .with_workers(self.config.number_processes);
            let outcome = search.run(self.config.search_trials()?)?;

            // Same trial RNG, so this reproduces the winning model
            let (params, model) = search.train_trial(outcome.best.id)?;
            (params, model, outcome.trials)
        } else {
            let params = FactorParams::from(self.config.factor_settings()?);
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            info!(
                latent_factors = params.latent_factors,
                epochs = params.epochs,
                "Training factor model"
            );
            let model = trainer.train(&params, self.biases.clone(), &mut rng)?;
            (params, model, Vec::new())
        };

        let predictions = model.predict_records(&self.splits.test)?;
        let rmse = rmse(&predictions, &ratings_of(&self.splits.test))?;

        Ok(RunReport {
            operation: Operation::Factorization,
            rmse,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            best_params: Some(params),
            trials,
        })
    }
}

/// Persist a finished run through `logger`
pub fn record_run(logger: &dyn MetricsLogger, config: &RunConfig, report: &RunReport) {
    logger.record(&report.to_record(config));
}
