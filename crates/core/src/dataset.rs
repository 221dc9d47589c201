//! Rating dataset ingestion, splitting and on-disk caching
//!
//! The CSV provider reads `userId,movieId,rating,timestamp` rows, shuffles
//! them, splits 70 % / 15 % / 15 % into train, test and validation sets and
//! builds the item-by-user matrix from the training split only. The splits
//! and the matrix are cached with `bincode` so later runs skip parsing.

use crate::config::DatasetConfig;
use crate::error::RatingsError;
use crate::models::{RatingMatrix, RatingRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TRAIN_FRACTION: f64 = 0.7;
/// Cumulative fraction: records past this point form the validation set
const TEST_FRACTION_END: f64 = 0.85;
const CACHE_EXTENSION: &str = "bin";

/// Train/test/validation records plus the training rating matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Splits {
    pub train: Vec<RatingRecord>,
    pub test: Vec<RatingRecord>,
    pub validation: Vec<RatingRecord>,
    pub matrix: RatingMatrix,
}

impl Splits {
    /// Assemble splits, sizing the matrix from the largest ids over all records
    pub fn from_records(
        train: Vec<RatingRecord>,
        test: Vec<RatingRecord>,
        validation: Vec<RatingRecord>,
    ) -> Result<Self, RatingsError> {
        let all = train.iter().chain(&test).chain(&validation);
        let (max_user, max_item) = all.fold((0u32, 0u32), |(u, i), r| {
            (u.max(r.user_id), i.max(r.item_id))
        });

        let matrix = RatingMatrix::from_records(&train, max_item as usize, max_user as usize)?;

        Ok(Self {
            train,
            test,
            validation,
            matrix,
        })
    }
}

/// Source of the rating splits for a run
pub trait MatrixProvider {
    /// Return the splits, rebuilding any cached copy when `rebuild` is set
    fn get_splits(&self, rebuild: bool) -> Result<Splits, RatingsError>;
}

/// Matrix provider backed by a ratings CSV file and a bincode cache
pub struct CsvMatrixProvider {
    config: DatasetConfig,
    seed: Option<u64>,
}

struct CachePaths {
    train: PathBuf,
    test: PathBuf,
    validation: PathBuf,
    utility: PathBuf,
}

impl CachePaths {
    fn all(&self) -> [&Path; 4] {
        [&self.train, &self.test, &self.validation, &self.utility]
    }
}

impl CsvMatrixProvider {
    pub fn new(config: DatasetConfig) -> Self {
        Self { config, seed: None }
    }

    /// Make the shuffle reproducible
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Parse every record of the ratings file
    pub fn read_records(&self) -> Result<Vec<RatingRecord>, RatingsError> {
        let path = &self.config.ratings_file_path;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| {
                RatingsError::Dataset(format!("cannot open {}: {}", path.display(), e))
            })?;

        let mut records = Vec::new();
        for row in reader.deserialize::<(u32, u32, f64, i64)>() {
            let (user_id, item_id, rating, timestamp) = row?;
            records.push(RatingRecord::new(user_id, item_id, rating, timestamp));
        }

        if records.is_empty() {
            return Err(RatingsError::Dataset(format!(
                "{} contains no ratings",
                path.display()
            )));
        }

        Ok(records)
    }

    fn cache_paths(&self) -> CachePaths {
        let folder = &self.config.matrices_folder_path;
        let path = |name: &str| folder.join(format!("{}.{}", name, CACHE_EXTENSION));

        CachePaths {
            train: path(&self.config.train_set_file_name),
            test: path(&self.config.test_set_file_name),
            validation: path(&self.config.validation_set_file_name),
            utility: path(&self.config.utility_matrix_file_name),
        }
    }

    fn load_cache(&self, paths: &CachePaths) -> Result<Splits, RatingsError> {
        Ok(Splits {
            train: read_cached(&paths.train)?,
            test: read_cached(&paths.test)?,
            validation: read_cached(&paths.validation)?,
            matrix: read_cached(&paths.utility)?,
        })
    }

    fn write_cache(&self, paths: &CachePaths, splits: &Splits) -> Result<(), RatingsError> {
        fs::create_dir_all(&self.config.matrices_folder_path)?;
        write_cached(&paths.train, &splits.train)?;
        write_cached(&paths.test, &splits.test)?;
        write_cached(&paths.validation, &splits.validation)?;
        write_cached(&paths.utility, &splits.matrix)?;
        Ok(())
    }

    fn build(&self) -> Result<Splits, RatingsError> {
        let mut records = self.read_records()?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        records.shuffle(&mut rng);

        let (train, test, validation) = split_records(records);
        debug!(
            train = train.len(),
            test = test.len(),
            validation = validation.len(),
            "Split ratings"
        );

        Splits::from_records(train, test, validation)
    }
}

impl MatrixProvider for CsvMatrixProvider {
    fn get_splits(&self, rebuild: bool) -> Result<Splits, RatingsError> {
        let paths = self.cache_paths();

        if !rebuild && paths.all().iter().all(|p| p.is_file()) {
            info!(folder = %self.config.matrices_folder_path.display(), "Loading cached matrices");
            return self.load_cache(&paths);
        }

        info!(
            ratings = %self.config.ratings_file_path.display(),
            "Cached matrices not used, building from ratings file"
        );
        let splits = self.build()?;
        self.write_cache(&paths, &splits)?;
        info!(
            items = splits.matrix.n_items(),
            users = splits.matrix.n_users(),
            observed = splits.matrix.observed_count(),
            "Constructed the utility matrix"
        );

        Ok(splits)
    }
}

/// Split already-shuffled records into train, test and validation sets
pub fn split_records(
    mut records: Vec<RatingRecord>,
) -> (Vec<RatingRecord>, Vec<RatingRecord>, Vec<RatingRecord>) {
    let n = records.len();
    let train_end = (n as f64 * TRAIN_FRACTION) as usize;
    let test_end = (n as f64 * TEST_FRACTION_END) as usize;

    let validation = records.split_off(test_end);
    let test = records.split_off(train_end);
    (records, test, validation)
}

fn read_cached<T: DeserializeOwned>(path: &Path) -> Result<T, RatingsError> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

fn write_cached<T: Serialize>(path: &Path, value: &T) -> Result<(), RatingsError> {
    let writer = BufWriter::new(fs::File::create(path)?);
    bincode::serialize_into(writer, value)?;
    Ok(())
}
