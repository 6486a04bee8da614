//! Execution models for the comparison kernel
//!
//! The same kernel runs under four models. They differ only in how array 1
//! is split, where array 2 lives, which synchronization points exist and how
//! the per-worker timings are reduced.
//!
//! # Models
//!
//! ```text
//! Sequential     one worker, [0, size1)
//! SharedMemory   t threads, one process; arrays shared read-only; join barrier
//! Distributed    p ranks; broadcast(array2), scatter(array1), barrier, reduce(max)
//! Hybrid         Distributed, and each rank runs SharedMemory over its slice
//! ```
//!
//! # What This Module Does NOT Do
//! - **Generation policy**: arrays come from a [`DataSource`](crate::source::DataSource)
//! - **Output**: matches and summaries go to a [`ReportSink`](crate::report::ReportSink)
//! - **Launching processes**: the multi-process transport lives in [`crate::comm::process`]
//!
//! # Example Usage
//!
//! ```rust
//! use parcommon::parallel::{ExecutionModel, ThreadBackend};
//! use parcommon::report::{CollectingSink, SharedSink};
//! use std::sync::Arc;
//!
//! let collector = Arc::new(CollectingSink::new());
//! let sink: SharedSink = collector.clone();
//!
//! let model = ExecutionModel::SharedMemory { threads: 2, backend: ThreadBackend::Scoped };
//! let report = model
//!     .execute(Arc::from(vec![3, 7, 2, 9, 3]), Arc::from(vec![9, 4, 3]), &sink)
//!     .unwrap();
//!
//! assert_eq!(report.matches, 3);
//! assert_eq!(collector.sorted_matches(), vec![3, 3, 9]);
//! ```

pub mod distributed;
pub mod sequential;
pub mod shared;

pub use distributed::{DistributedModel, RankCompute, Session, run_rank};
pub use sequential::SequentialModel;
pub use shared::{SharedMemoryModel, ThreadBackend};

use crate::error::{ConfigError, Result};
use crate::report::{Layout, RunSummary, SharedSink};
use crate::source::DataSource;
use crate::timing::ElapsedTimeReport;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Read-only handle on an array; every worker holds a clone, none can mutate it
pub type SharedArray = Arc<[i32]>;

/// Sizes of the two arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemShape {
    pub size1: usize,
    pub size2: usize,
}

impl ProblemShape {
    pub fn new(size1: usize, size2: usize) -> Result<Self> {
        if size1 == 0 || size2 == 0 {
            return Err(ConfigError::NonPositiveSize { size1, size2 }.into());
        }
        Ok(Self { size1, size2 })
    }

    /// Both sizes must split evenly across `processes`
    pub fn check_divisible(&self, processes: usize) -> Result<()> {
        if processes == 0 {
            return Err(ConfigError::ZeroWorkers {
                what: "process count",
            }
            .into());
        }
        if self.size1 % processes != 0 || self.size2 % processes != 0 {
            return Err(ConfigError::NotDivisible {
                size1: self.size1,
                size2: self.size2,
                processes,
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionModel {
    Sequential,
    SharedMemory {
        threads: usize,
        backend: ThreadBackend,
    },
    Distributed {
        processes: usize,
    },
    Hybrid {
        processes: usize,
        threads: usize,
        backend: ThreadBackend,
    },
}

impl ExecutionModel {
    /// Reject a shape this model cannot run. Called before any data exists.
    pub fn validate(&self, shape: &ProblemShape) -> Result<()> {
        ProblemShape::new(shape.size1, shape.size2)?;
        match *self {
            ExecutionModel::Sequential => Ok(()),
            ExecutionModel::SharedMemory { threads, .. } => positive(threads, "thread count"),
            ExecutionModel::Distributed { processes } => shape.check_divisible(processes),
            ExecutionModel::Hybrid {
                processes, threads, ..
            } => {
                positive(threads, "thread count")?;
                shape.check_divisible(processes)
            }
        }
    }

    pub fn layout(&self) -> Layout {
        match *self {
            ExecutionModel::Sequential => Layout::Serial,
            ExecutionModel::SharedMemory { threads, .. } => Layout::Threads { threads },
            ExecutionModel::Distributed { processes } => Layout::Processes {
                processes,
                threads: 1,
            },
            ExecutionModel::Hybrid {
                processes, threads, ..
            } => Layout::Processes { processes, threads },
        }
    }

    /// The process-level part of a distributed model
    pub fn distributed(&self) -> Option<DistributedModel> {
        match *self {
            ExecutionModel::Distributed { processes } => Some(DistributedModel {
                processes,
                compute: RankCompute::Single,
            }),
            ExecutionModel::Hybrid {
                processes,
                threads,
                backend,
            } => Some(DistributedModel {
                processes,
                compute: RankCompute::Threads(SharedMemoryModel { threads, backend }),
            }),
            _ => None,
        }
    }

    /// Run the kernel over existing arrays and return the critical-path time.
    ///
    /// Distributed models run their ranks as threads of this process with the
    /// full collective protocol; rank 0 owns the arrays before distribution.
    pub fn execute(
        &self,
        array1: SharedArray,
        array2: SharedArray,
        sink: &SharedSink,
    ) -> Result<ElapsedTimeReport> {
        let shape = ProblemShape::new(array1.len(), array2.len())?;
        self.validate(&shape)?;

        match *self {
            ExecutionModel::Sequential => SequentialModel.execute(&array1, &array2, sink.as_ref()),
            ExecutionModel::SharedMemory { threads, backend } => {
                SharedMemoryModel { threads, backend }.execute(&array1, &array2, sink)
            }
            ExecutionModel::Distributed { .. } | ExecutionModel::Hybrid { .. } => {
                let model = self.distributed().ok_or_else(|| {
                    crate::error::CommonError::Protocol("not a distributed model".to_string())
                })?;
                let arrays = Mutex::new(Some((array1.to_vec(), array2.to_vec())));
                model.execute_in_process(shape, sink, || {
                    arrays
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .take()
                        .ok_or_else(|| {
                            crate::error::CommonError::Protocol(
                                "arrays handed out twice".to_string(),
                            )
                        })
                })
            }
        }
    }

    /// Validate, generate with `source` (once, by the generation authority),
    /// execute in this process and emit the summary.
    pub fn run(
        &self,
        shape: ProblemShape,
        source: &mut dyn DataSource,
        sink: &SharedSink,
    ) -> Result<RunSummary> {
        self.validate(&shape)?;
        tracing::info!("Running {:?} over {} x {} elements", self, shape.size1, shape.size2);

        let report = match self.distributed() {
            None => {
                let (array1, array2) = generate_pair(source, shape, sink)?;
                self.execute(Arc::from(array1), Arc::from(array2), sink)?
            }
            Some(model) => {
                let source = Mutex::new(source);
                model.execute_in_process(shape, sink, || {
                    let mut source = source.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    generate_pair(&mut **source, shape, sink)
                })?
            }
        };

        let summary = RunSummary::new(self.layout(), report);
        sink.emit_summary(&summary);
        Ok(summary)
    }

    /// Calculate optimal workers based on available system resources and configuration limits
    ///
    /// # Algorithm
    /// ```text
    /// 1. Detect available CPU cores: num_cpus::get()
    /// 2. Apply percentage: cores * thread_percentage / 100
    /// 3. Apply config limit: min(max_threads_config, percentage_result) if max_threads_config > 0
    /// 4. Ensure minimum: max(1, final_result)
    /// ```
    ///
    /// # Examples
    /// ```rust
    /// use parcommon::parallel::ExecutionModel;
    ///
    /// let workers = ExecutionModel::calculate_optimal_workers(0, 75);
    /// assert!(workers >= 1);
    ///
    /// let workers = ExecutionModel::calculate_optimal_workers(8, 75);
    /// assert!(workers <= 8);
    /// ```
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();

        let workers_by_percentage =
            std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        if max_threads_config > 0 {
            std::cmp::min(max_threads_config, workers_by_percentage)
        } else {
            workers_by_percentage
        }
    }
}

fn positive(count: usize, what: &'static str) -> Result<()> {
    if count == 0 {
        return Err(ConfigError::ZeroWorkers { what }.into());
    }
    Ok(())
}

/// Draw array 1 then array 2 from one source, dumping them in debug mode
pub fn generate_pair(
    source: &mut dyn DataSource,
    shape: ProblemShape,
    sink: &SharedSink,
) -> Result<(Vec<i32>, Vec<i32>)> {
    tracing::debug!("Generating arrays of {} and {} elements", shape.size1, shape.size2);
    let array1 = source.generate(shape.size1)?;
    sink.emit_array("Array 1", &array1);
    let array2 = source.generate(shape.size2)?;
    sink.emit_array("Array 2", &array2);
    Ok((array1, array2))
}
