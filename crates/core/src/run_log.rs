//! Run metadata logging
//!
//! Each completed run appends one row to a CSV file with the accuracy, the
//! elapsed time and the settings it ran with. Logging is fire-and-forget: a
//! failed write is reported through `tracing` and never aborts the run.

use crate::config::RunConfig;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// One completed run or trial batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub operation: String,
    pub rmse: f64,
    pub elapsed_seconds: f64,
    pub number_processes: usize,
    pub number_neighbours: usize,
    pub alpha: Option<f64>,
    pub train_epoch: Option<usize>,
    pub latent_factors: Option<usize>,
    pub regularization_factor: Option<f64>,
    pub hyper_optimization: bool,
    pub hyper_epoch: Option<usize>,
}

impl RunRecord {
    pub fn new(
        operation: impl Into<String>,
        rmse: f64,
        elapsed: Duration,
        config: &RunConfig,
    ) -> Self {
        Self {
            operation: operation.into(),
            rmse,
            elapsed_seconds: elapsed.as_secs_f64(),
            number_processes: config.number_processes,
            number_neighbours: config.number_neighbours,
            alpha: config.alpha,
            train_epoch: config.train_epoch,
            latent_factors: config.latent_factors,
            regularization_factor: config.regularization_factor,
            hyper_optimization: config.hyper_optimization,
            hyper_epoch: config.hyper_epoch,
        }
    }

    /// Replace the configured factor settings with the ones actually used
    pub fn with_hyperparameters(
        mut self,
        latent_factors: usize,
        train_epoch: usize,
        alpha: f64,
        regularization_factor: f64,
    ) -> Self {
        self.latent_factors = Some(latent_factors);
        self.train_epoch = Some(train_epoch);
        self.alpha = Some(alpha);
        self.regularization_factor = Some(regularization_factor);
        self
    }
}

/// Sink for run records
pub trait MetricsLogger: Send + Sync {
    fn record(&self, record: &RunRecord);
}

/// Appends run records to a headerless CSV file
pub struct CsvMetricsLogger {
    path: PathBuf,
}

impl CsvMetricsLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &RunRecord) -> Result<(), csv::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}

impl MetricsLogger for CsvMetricsLogger {
    fn record(&self, record: &RunRecord) {
        info!(
            operation = %record.operation,
            rmse = record.rmse,
            elapsed_seconds = record.elapsed_seconds,
            "Run completed"
        );

        if let Err(e) = self.append(record) {
            warn!(path = %self.path.display(), error = %e, "Failed to append run record");
        }
    }
}

/// Keeps records in memory; useful for embedding and tests
#[derive(Default)]
pub struct MemoryMetricsLogger {
    records: Mutex<Vec<RunRecord>>,
}

impl MemoryMetricsLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl MetricsLogger for MemoryMetricsLogger {
    fn record(&self, record: &RunRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(_) => warn!("Run record buffer poisoned, dropping record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_config() -> RunConfig {
        RunConfig {
            number_processes: 4,
            number_neighbours: 10,
            hyper_optimization: false,
            hyper_epoch: None,
            latent_factors: Some(12),
            train_epoch: Some(300),
            alpha: Some(0.015),
            regularization_factor: Some(0.1),
            seed: None,
        }
    }

    #[test]
    fn test_csv_logger_appends_rows() {
        let dir = TempDir::new().unwrap();
        let logger = CsvMetricsLogger::new(dir.path().join("logs.csv"));
        let record = RunRecord::new(
            "neighborhood",
            0.91,
            Duration::from_millis(1500),
            &run_config(),
        );

        logger.record(&record);
        logger.record(&record);

        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "neighborhood,0.91,1.5,4,10,0.015,300,12,0.1,false,");
    }

    #[test]
    fn test_with_hyperparameters_overrides_settings() {
        let record = RunRecord::new(
            "hyper_optimization",
            0.88,
            Duration::from_secs(2),
            &run_config(),
        )
        .with_hyperparameters(9, 450, 0.012, 0.3);

        assert_eq!(record.latent_factors, Some(9));
        assert_eq!(record.train_epoch, Some(450));
        assert_eq!(record.alpha, Some(0.012));
        assert_eq!(record.regularization_factor, Some(0.3));
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let logger = CsvMetricsLogger::new("/nonexistent-dir/ratings/logs.csv");
        let record = RunRecord::new("factorization", 1.0, Duration::ZERO, &run_config());
        logger.record(&record);
    }

    #[test]
    fn test_memory_logger_collects() {
        let logger = MemoryMetricsLogger::new();
        logger.record(&RunRecord::new("factorization", 0.9, Duration::ZERO, &run_config()));
        assert_eq!(logger.records().len(), 1);
    }
}
