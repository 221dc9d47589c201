//! Random search over factor-model hyperparameters
//!
//! Each trial samples a parameter set, trains a fresh factor model from a
//! clone of the initial biases and scores it on the validation split. Trials
//! share nothing mutable, so they run in parallel; every trial draws from its
//! own RNG seeded from the search seed and the trial id, which keeps the
//! outcome independent of the worker count.

use crate::bias::Biases;
use crate::evaluation::rmse;
use crate::factorization::{FactorModel, FactorParams, FactorTrainer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use ratings_core::{ratings_of, RatingRecord, RatingsError};
use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Sampling ranges of the four tuned hyperparameters
#[derive(Debug, Clone)]
pub struct SearchSpace {
    pub latent_factors: RangeInclusive<usize>,
    pub epochs: Vec<usize>,
    pub alpha: RangeInclusive<f64>,
    pub lambda: RangeInclusive<f64>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            latent_factors: 7..=18,
            epochs: (200..=600).step_by(50).collect(),
            alpha: 0.01..=0.02,
            lambda: 0.045..=0.85,
        }
    }
}

impl SearchSpace {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> FactorParams {
        let epochs = self.epochs[rng.gen_range(0..self.epochs.len())];
        FactorParams {
            latent_factors: rng.gen_range(self.latent_factors.clone()),
            epochs,
            alpha: rng.gen_range(self.alpha.clone()),
            lambda: rng.gen_range(self.lambda.clone()),
        }
    }

    pub fn contains(&self, params: &FactorParams) -> bool {
        self.latent_factors.contains(&params.latent_factors)
            && self.epochs.contains(&params.epochs)
            && self.alpha.contains(&params.alpha)
            && self.lambda.contains(&params.lambda)
    }

    fn validate(&self) -> Result<(), RatingsError> {
        if self.epochs.is_empty() || self.latent_factors.is_empty() {
            return Err(RatingsError::InvalidInput(
                "search space has an empty dimension".to_string(),
            ));
        }
        if self.alpha.is_empty() || self.lambda.is_empty() {
            return Err(RatingsError::InvalidInput(
                "search space has an empty range".to_string(),
            ));
        }
        Ok(())
    }
}

/// One evaluated parameter set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub id: usize,
    pub params: FactorParams,
    pub validation_rmse: f64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Trial,
    /// All trials, in id order
    pub trials: Vec<Trial>,
}

pub struct HyperparameterSearch<'a> {
    trainer: FactorTrainer<'a>,
    initial_biases: &'a Biases,
    validation: &'a [RatingRecord],
    space: SearchSpace,
    seed: u64,
    num_workers: usize,
}

impl<'a> HyperparameterSearch<'a> {
    pub fn new(
        trainer: FactorTrainer<'a>,
        initial_biases: &'a Biases,
        validation: &'a [RatingRecord],
    ) -> Self {
        Self {
            trainer,
            initial_biases,
            validation,
            space: SearchSpace::default(),
            seed: 0,
            num_workers: 1,
        }
    }

    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    fn trial_rng(&self, trial: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(trial as u64))
    }

    /// Parameters trial `trial` evaluates
    pub fn trial_params(&self, trial: usize) -> FactorParams {
        self.space.sample(&mut self.trial_rng(trial))
    }

    /// Train the model trial `trial` evaluates; identical on every call
    pub fn train_trial(&self, trial: usize) -> Result<(FactorParams, FactorModel), RatingsError> {
        let mut rng = self.trial_rng(trial);
        let params = self.space.sample(&mut rng);
        let model = self
            .trainer
            .train(&params, self.initial_biases.clone(), &mut rng)?;
        Ok((params, model))
    }

    /// Validation RMSE of trial `trial`: the minimization objective
    pub fn objective(&self, trial: usize) -> Result<Trial, RatingsError> {
        let (params, model) = self.train_trial(trial)?;
        let predictions = model.predict_records(self.validation)?;
        let validation_rmse = rmse(&predictions, &ratings_of(self.validation))?;

        debug!(
            trial,
            latent_factors = params.latent_factors,
            epochs = params.epochs,
            alpha = params.alpha,
            lambda = params.lambda,
            validation_rmse,
            "Trial finished"
        );

        Ok(Trial {
            id: trial,
            params,
            validation_rmse,
        })
    }

    /// Evaluate `trials` trials and return the one with the lowest error
    pub fn run(&self, trials: usize) -> Result<SearchOutcome, RatingsError> {
        if trials == 0 {
            return Err(RatingsError::config(
                "hyper_epoch must be at least 1",
                "hyper_epoch",
            ));
        }
        self.space.validate()?;

        info!(
            trials,
            workers = self.num_workers,
            seed = self.seed,
            "Starting hyperparameter search"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_workers)
            .thread_name(|i| format!("search-worker-{}", i))
            .build()
            .map_err(|e| RatingsError::config(e.to_string(), "number_processes"))?;

        let trials: Vec<Trial> = pool.install(|| {
            (0..trials)
                .into_par_iter()
                .map(|trial| self.objective(trial))
                .collect::<Result<Vec<_>, _>>()
        })?;

        // First minimum wins, so ties go to the lowest trial id
        let best = trials
            .iter()
            .min_by(|a, b| a.validation_rmse.total_cmp(&b.validation_rmse))
            .cloned()
            .ok_or_else(|| RatingsError::InvalidInput("no trials evaluated".to_string()))?;

        info!(
            best_trial = best.id,
            validation_rmse = best.validation_rmse,
            "Hyperparameter search finished"
        );

        Ok(SearchOutcome { best, trials })
    }
}
