//! Error types shared by the ratings workspace.
//!
//! Configuration problems, shape mismatches during evaluation and worker
//! failures are fatal for a run. Numerical indeterminacy (zero variance,
//! empty means) is never reported here; callers substitute `0.0` locally.

/// Errors raised by the rating prediction workspace
#[derive(Debug, thiserror::Error)]
pub enum RatingsError {
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        key: Option<String>,
    },

    #[error("Shape mismatch: {predictions} predictions vs {ground_truth} ground-truth ratings")]
    ShapeMismatch {
        predictions: usize,
        ground_truth: usize,
    },

    #[error("Worker for partition {partition} failed: {reason}")]
    WorkerFailure { partition: usize, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Matrix cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl RatingsError {
    /// Build a configuration error pointing at a specific key
    pub fn config(message: impl Into<String>, key: &str) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Configuration key responsible for the error, if any
    pub fn config_key(&self) -> Option<&str> {
        match self {
            Self::ConfigurationError { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for RatingsError {
    fn from(err: config::ConfigError) -> Self {
        let key = match &err {
            config::ConfigError::NotFound(key) => Some(key.clone()),
            config::ConfigError::Type { key, .. } => key.clone(),
            _ => None,
        };

        Self::ConfigurationError {
            message: err.to_string(),
            key,
        }
    }
}

impl From<bincode::Error> for RatingsError {
    fn from(err: bincode::Error) -> Self {
        Self::Cache(err.to_string())
    }
}
