//! Shared-memory model: several threads in one address space
//!
//! Both arrays are shared read-only through [`SharedArray`] handles, so no
//! locking is involved in the comparison itself. Array 1 is split with
//! [`SplitPolicy::AbsorbRemainder`]; the call returns only after every
//! thread has been joined.

use super::SharedArray;
use crate::error::{CommonError, ConfigError, Result};
use crate::partition::{SplitPolicy, plan};
use crate::report::SharedSink;
use crate::timing::{ElapsedTimeReport, TimingReducer, TimingSample};
use crate::worker::Worker;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the threads are provided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThreadBackend {
    /// One explicitly spawned scoped thread per partition
    #[default]
    Scoped,
    /// A dedicated rayon pool, one task per static partition
    Rayon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedMemoryModel {
    pub threads: usize,
    pub backend: ThreadBackend,
}

impl SharedMemoryModel {
    pub fn new(threads: usize, backend: ThreadBackend) -> Self {
        Self { threads, backend }
    }

    pub fn workers(&self, size1: usize) -> Result<Vec<Worker>> {
        Ok(plan(size1, self.threads, SplitPolicy::AbsorbRemainder)?
            .into_iter()
            .enumerate()
            .map(|(id, partition)| Worker::new(id, partition))
            .collect())
    }

    /// Run every worker, join them all, reduce their samples to the maximum
    pub fn execute(
        &self,
        array1: &SharedArray,
        array2: &SharedArray,
        sink: &SharedSink,
    ) -> Result<ElapsedTimeReport> {
        if self.threads == 0 {
            return Err(ConfigError::ZeroWorkers {
                what: "thread count",
            }
            .into());
        }

        let workers = self.workers(array1.len())?;
        tracing::debug!(
            "Spawning {} {:?} workers over {} elements",
            workers.len(),
            self.backend,
            array1.len()
        );

        let samples = match self.backend {
            ThreadBackend::Scoped => run_scoped(&workers, array1, array2, sink)?,
            ThreadBackend::Rayon => run_rayon(self.threads, &workers, array1, array2, sink)?,
        };

        TimingReducer::reduce(samples)
            .ok_or_else(|| CommonError::Protocol("no worker produced a sample".to_string()))
    }
}

fn run_scoped(
    workers: &[Worker],
    array1: &SharedArray,
    array2: &SharedArray,
    sink: &SharedSink,
) -> Result<Vec<TimingSample>> {
    crossbeam::thread::scope(|s| {
        let handles: Vec<_> = workers
            .iter()
            .map(|&worker| {
                let array1 = Arc::clone(array1);
                let array2 = Arc::clone(array2);
                let sink = Arc::clone(sink);
                s.spawn(move |_| worker.run(&array1, &array2, sink.as_ref()))
            })
            .collect();

        // join barrier: every thread finishes before any sample is read
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| CommonError::WorkerPanicked))
            .collect::<Result<Vec<_>>>()
    })
    .map_err(|_| CommonError::WorkerPanicked)?
}

fn run_rayon(
    threads: usize,
    workers: &[Worker],
    array1: &SharedArray,
    array2: &SharedArray,
    sink: &SharedSink,
) -> Result<Vec<TimingSample>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("parcommon-worker-{}", i))
        .build()
        .map_err(|e| CommonError::ThreadPool(e.to_string()))?;

    Ok(pool.install(|| {
        workers
            .par_iter()
            .map(|worker| worker.run(array1, array2, sink.as_ref()))
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingSink;

    fn arrays(a: &[i32], b: &[i32]) -> (SharedArray, SharedArray) {
        (Arc::from(a.to_vec()), Arc::from(b.to_vec()))
    }

    #[test]
    fn test_scoped_backend_finds_all_matches() {
        let collector = Arc::new(CollectingSink::new());
        let sink: SharedSink = collector.clone();
        let (a, b) = arrays(&[3, 7, 2, 9, 3], &[9, 4, 3]);

        let report = SharedMemoryModel::new(2, ThreadBackend::Scoped)
            .execute(&a, &b, &sink)
            .unwrap();

        assert_eq!(collector.sorted_matches(), vec![3, 3, 9]);
        assert_eq!(report.samples, 2);
        assert_eq!(report.matches, 3);
    }

    #[test]
    fn test_rayon_backend_finds_all_matches() {
        let collector = Arc::new(CollectingSink::new());
        let sink: SharedSink = collector.clone();
        let (a, b) = arrays(&[3, 7, 2, 9, 3], &[9, 4, 3]);

        let report = SharedMemoryModel::new(3, ThreadBackend::Rayon)
            .execute(&a, &b, &sink)
            .unwrap();

        assert_eq!(collector.sorted_matches(), vec![3, 3, 9]);
        assert_eq!(report.samples, 3);
    }

    #[test]
    fn test_uneven_split_is_tolerated() {
        let model = SharedMemoryModel::new(4, ThreadBackend::Scoped);
        let workers = model.workers(10).unwrap();
        let lens: Vec<_> = workers.iter().map(|w| w.partition.len()).collect();
        assert_eq!(lens, vec![2, 2, 2, 4]);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let sink: SharedSink = Arc::new(CollectingSink::new());
        let (a, b) = arrays(&[1], &[1]);
        let err = SharedMemoryModel::new(0, ThreadBackend::Scoped)
            .execute(&a, &b, &sink)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_reported_time_is_slowest_thread() {
        let sink: SharedSink = Arc::new(CollectingSink::new());
        let a: SharedArray = Arc::from((0..4_000).collect::<Vec<i32>>());
        let b: SharedArray = Arc::from((0..1_000).map(|v| -v - 1).collect::<Vec<i32>>());

        let report = SharedMemoryModel::new(4, ThreadBackend::Scoped)
            .execute(&a, &b, &sink)
            .unwrap();
        assert!(report.slowest_worker < 4);
        assert_eq!(report.matches, 0);
    }
}
