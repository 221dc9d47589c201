//! Configuration loader for rating prediction runs
//!
//! Settings are read once at startup from a flat JSON file and may be
//! overridden by environment variables with the `RATINGS_` prefix.
//! Missing or malformed settings are fatal: they surface as
//! [`RatingsError::ConfigurationError`] before any computation starts.
//!
//! # Example
//!
//! ```no_run
//! use ratings_core::config::{ConfigLoader, RunConfig};
//!
//! # fn example() -> Result<(), ratings_core::RatingsError> {
//! ratings_core::config::load_dotenv();
//!
//! let config = RunConfig::from_env()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `RATINGS_CONFIG` (optional): path of the JSON settings file (default: `config.json`)
//! - `RATINGS_<KEY>` (optional): overrides any key of the file, e.g. `RATINGS_NUMBER_PROCESSES=8`

use crate::error::RatingsError;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "RATINGS_CONFIG";
/// Settings file used when `RATINGS_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "RATINGS";

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration.
pub trait ConfigLoader: Sized {
    /// Load configuration from the settings file named by `RATINGS_CONFIG`
    /// layered with `RATINGS_`-prefixed environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the file is missing, a required key
    /// is absent, or a value cannot be parsed.
    fn from_env() -> Result<Self, RatingsError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any validation check fails.
    fn validate(&self) -> Result<(), RatingsError>;
}

/// Settings of a prediction run
///
/// `hyper_epoch` is the number of search trials and is only required when
/// `hyper_optimization` is set. The factor-model keys are only required for
/// factorization runs that do not search; see [`RunConfig::factor_settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of parallel prediction workers
    pub number_processes: usize,
    /// Neighbours used by the item-similarity predictor
    pub number_neighbours: usize,
    /// Run the hyperparameter search instead of a single factor model
    pub hyper_optimization: bool,
    /// Number of hyperparameter trials
    #[serde(default)]
    pub hyper_epoch: Option<usize>,
    #[serde(default)]
    pub latent_factors: Option<usize>,
    #[serde(default)]
    pub train_epoch: Option<usize>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub regularization_factor: Option<f64>,
    /// Seed for shuffling and factor initialization; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Factor-model settings of a non-search run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorSettings {
    pub latent_factors: usize,
    pub train_epoch: usize,
    pub alpha: f64,
    pub regularization_factor: f64,
}

impl RunConfig {
    /// Load from a specific JSON file plus environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RatingsError> {
        load(file_builder(path.as_ref()))
    }

    /// Load from an in-memory JSON document, without environment overrides
    pub fn from_json_str(json: &str) -> Result<Self, RatingsError> {
        load(Config::builder().add_source(File::from_str(json, FileFormat::Json)))
    }

    /// Number of search trials, required when `hyper_optimization` is set
    pub fn search_trials(&self) -> Result<usize, RatingsError> {
        let trials = self
            .hyper_epoch
            .ok_or_else(|| RatingsError::config("hyper_epoch is required", "hyper_epoch"))?;
        if trials == 0 {
            return Err(RatingsError::config(
                "hyper_epoch must be at least 1",
                "hyper_epoch",
            ));
        }
        Ok(trials)
    }

    /// Factor-model settings, each key reported individually when missing
    pub fn factor_settings(&self) -> Result<FactorSettings, RatingsError> {
        let settings = FactorSettings {
            latent_factors: required(self.latent_factors, "latent_factors")?,
            train_epoch: required(self.train_epoch, "train_epoch")?,
            alpha: required(self.alpha, "alpha")?,
            regularization_factor: required(self.regularization_factor, "regularization_factor")?,
        };

        if settings.latent_factors == 0 {
            return Err(RatingsError::config(
                "latent_factors must be at least 1",
                "latent_factors",
            ));
        }
        if settings.train_epoch == 0 {
            return Err(RatingsError::config(
                "train_epoch must be at least 1",
                "train_epoch",
            ));
        }
        if !(settings.alpha.is_finite() && settings.alpha > 0.0) {
            return Err(RatingsError::config(
                format!("alpha must be a positive number, got {}", settings.alpha),
                "alpha",
            ));
        }
        if !(settings.regularization_factor.is_finite() && settings.regularization_factor >= 0.0) {
            return Err(RatingsError::config(
                format!(
                    "regularization_factor must be non-negative, got {}",
                    settings.regularization_factor
                ),
                "regularization_factor",
            ));
        }

        Ok(settings)
    }
}

impl ConfigLoader for RunConfig {
    fn from_env() -> Result<Self, RatingsError> {
        Self::from_file(config_path())
    }

    fn validate(&self) -> Result<(), RatingsError> {
        if self.number_processes == 0 {
            return Err(RatingsError::config(
                "number_processes must be at least 1",
                "number_processes",
            ));
        }

        if self.number_neighbours == 0 {
            return Err(RatingsError::config(
                "number_neighbours must be at least 1",
                "number_neighbours",
            ));
        }

        if self.hyper_optimization {
            self.search_trials()?;
        }

        Ok(())
    }
}

/// Dataset locations used by the CSV matrix provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// CSV file with `userId,movieId,rating,timestamp` rows
    pub ratings_file_path: PathBuf,
    /// Directory holding the cached splits
    pub matrices_folder_path: PathBuf,
    pub train_set_file_name: String,
    pub test_set_file_name: String,
    pub validation_set_file_name: String,
    pub utility_matrix_file_name: String,
    /// CSV file run records are appended to
    #[serde(default = "default_metrics_log_path")]
    pub metrics_log_path: PathBuf,
}

fn default_metrics_log_path() -> PathBuf {
    PathBuf::from("logs.csv")
}

impl DatasetConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RatingsError> {
        load(file_builder(path.as_ref()))
    }

    pub fn from_json_str(json: &str) -> Result<Self, RatingsError> {
        load(Config::builder().add_source(File::from_str(json, FileFormat::Json)))
    }
}

impl ConfigLoader for DatasetConfig {
    fn from_env() -> Result<Self, RatingsError> {
        Self::from_file(config_path())
    }

    fn validate(&self) -> Result<(), RatingsError> {
        let names = [
            ("train_set_file_name", &self.train_set_file_name),
            ("test_set_file_name", &self.test_set_file_name),
            ("validation_set_file_name", &self.validation_set_file_name),
            ("utility_matrix_file_name", &self.utility_matrix_file_name),
        ];

        for (key, name) in names {
            if name.trim().is_empty() {
                return Err(RatingsError::config(
                    format!("{} must not be empty", key),
                    key,
                ));
            }
        }

        if self.ratings_file_path.as_os_str().is_empty() {
            return Err(RatingsError::config(
                "ratings_file_path must not be empty",
                "ratings_file_path",
            ));
        }

        Ok(())
    }
}

/// Settings file path from `RATINGS_CONFIG`, or the default
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn file_builder(path: &Path) -> ConfigBuilder<config::builder::DefaultState> {
    Config::builder()
        .add_source(File::from(path).format(FileFormat::Json).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
}

fn load<T>(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<T, RatingsError>
where
    T: serde::de::DeserializeOwned,
{
    let settings = builder.build()?;
    Ok(settings.try_deserialize()?)
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, RatingsError> {
    value.ok_or_else(|| RatingsError::config(format!("{} is required", key), key))
}

/// Load .env file if present
///
/// Does not return an error if the .env file is not found.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "Failed to load .env file");
        }
    }
}
