//! Parallel batch prediction
//!
//! A batch of requests is cut into one contiguous chunk per worker. Workers
//! run on a dedicated thread pool, read the shared matrix and biases without
//! locking, and send their chunk's predictions back tagged with the
//! partition id. Results are merged by partition id once every worker has
//! finished, which reproduces the request order exactly.

use crate::neighborhood::{NeighborhoodPredictor, PredictionRequest};
use ratings_core::RatingsError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use tracing::{debug, error};

type PartitionResult = (usize, Result<Vec<f64>, String>);

pub struct ParallelDispatcher {
    num_workers: usize,
    pool: ThreadPool,
}

impl ParallelDispatcher {
    pub fn new(num_workers: usize) -> Result<Self, RatingsError> {
        if num_workers == 0 {
            return Err(RatingsError::config(
                "at least one worker is required",
                "number_processes",
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("predict-worker-{}", i))
            .build()
            .map_err(|e| RatingsError::config(e.to_string(), "number_processes"))?;

        Ok(Self { num_workers, pool })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Predict every request with the neighborhood predictor, in request order
    pub fn predict_batch(
        &self,
        predictor: &NeighborhoodPredictor<'_>,
        requests: &[PredictionRequest],
        k: usize,
    ) -> Result<Vec<f64>, RatingsError> {
        self.map_ordered(requests, |request| predictor.predict_request(request, k))
    }

    /// Apply `predict` to every item across the workers, in input order.
    ///
    /// A worker that panics fails the whole batch; no partial results are
    /// returned.
    pub fn map_ordered<T, F>(&self, items: &[T], predict: F) -> Result<Vec<f64>, RatingsError>
    where
        T: Sync,
        F: Fn(&T) -> f64 + Sync,
    {
        let partitions = partition_bounds(items.len(), self.num_workers);
        let (tx, rx) = mpsc::channel::<PartitionResult>();
        let predict = &predict;

        self.pool.scope(|scope| {
            for (partition, range) in partitions.iter().cloned().enumerate() {
                let tx = tx.clone();
                let chunk = &items[range];
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        chunk.iter().map(predict).collect::<Vec<f64>>()
                    }))
                    .map_err(panic_reason);

                    debug!(partition, size = chunk.len(), ok = outcome.is_ok(), "Partition done");
                    // The receiver outlives the scope
                    let _ = tx.send((partition, outcome));
                });
            }
        });
        drop(tx);

        let mut results: Vec<(usize, Vec<f64>)> = Vec::with_capacity(partitions.len());
        for (partition, outcome) in rx {
            match outcome {
                Ok(predictions) => results.push((partition, predictions)),
                Err(reason) => {
                    error!(partition, reason = %reason, "Prediction worker failed");
                    return Err(RatingsError::WorkerFailure { partition, reason });
                }
            }
        }

        if results.len() != partitions.len() {
            let missing = (0..partitions.len())
                .find(|p| !results.iter().any(|(id, _)| id == p))
                .unwrap_or(0);
            return Err(RatingsError::WorkerFailure {
                partition: missing,
                reason: "worker exited without reporting".to_string(),
            });
        }

        results.sort_by_key(|(partition, _)| *partition);
        Ok(results
            .into_iter()
            .flat_map(|(_, predictions)| predictions)
            .collect())
    }
}

/// Contiguous near-equal ranges covering `0..len`; the first `len % parts`
/// ranges are one element longer.
pub fn partition_bounds(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let base = len / parts;
    let extra = len % parts;

    let mut start = 0;
    (0..parts)
        .map(|p| {
            let size = base + usize::from(p < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
