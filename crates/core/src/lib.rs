//! # Ratings Core
//!
//! Shared building blocks for the rating prediction engine.
//!
//! ## Modules
//!
//! - `models`: Rating records and the item-by-user rating matrix
//! - `error`: Error types and handling
//! - `config`: Configuration loading and validation
//! - `dataset`: Ratings CSV ingestion, train/test/validation splitting and caching
//! - `run_log`: Append-only run metadata logging
//! - `observability`: Structured logging setup

pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod observability;
pub mod run_log;

// Re-export commonly used types
pub use config::{load_dotenv, ConfigLoader, DatasetConfig, FactorSettings, RunConfig};
pub use dataset::{split_records, CsvMatrixProvider, MatrixProvider, Splits};
pub use error::RatingsError;
pub use models::{ratings_of, RatingMatrix, RatingRecord};
pub use observability::{init_logging, LogConfig, LogFormat, ObservabilityError};
pub use run_log::{CsvMetricsLogger, MemoryMetricsLogger, MetricsLogger, RunRecord};
