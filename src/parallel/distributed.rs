//! Distributed and hybrid models
//!
//! Every rank walks the same sequence of phases:
//!
//! ```text
//! Init → Generated (root) → agree → Broadcast(array2) → Scattered(array1)
//!      → Barrier → Compute → GlobalReduce(max) → Finalize
//! ```
//!
//! The phases are typestates of [`Session`]. Each transition consumes the
//! session and issues its collective unconditionally, so a rank cannot
//! reach the compute or reduce step without having taken part in every
//! collective before it, in the same order as its peers.
//!
//! Any local failure during allocation or generation is turned into a
//! run-wide abort by the `agree` collective: all ranks leave together
//! before broadcast, none is left waiting.

use super::{ProblemShape, SharedArray, SharedMemoryModel};
use crate::comm::Communicator;
use crate::comm::local::LocalCluster;
use crate::error::{CommonError, Result, try_alloc};
use crate::partition::{Partition, SplitPolicy, plan};
use crate::report::SharedSink;
use crate::timing::{ElapsedTimeReport, Stopwatch, TimingSample};
use crate::worker::Worker;
use std::sync::Arc;
use std::time::Duration;

/// What each rank does with its slice of array 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankCompute {
    /// The rank is a single worker
    Single,
    /// The rank splits its slice across threads (hybrid)
    Threads(SharedMemoryModel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedModel {
    pub processes: usize,
    pub compute: RankCompute,
}

impl DistributedModel {
    /// Run all ranks as threads of this process. `generate` is called once,
    /// on rank 0 only.
    pub fn execute_in_process<G>(
        &self,
        shape: ProblemShape,
        sink: &SharedSink,
        generate: G,
    ) -> Result<ElapsedTimeReport>
    where
        G: Fn() -> Result<(Vec<i32>, Vec<i32>)> + Sync,
    {
        let reports = LocalCluster::run(self.processes, |mut comm| {
            run_rank(&mut comm, self.compute, shape, sink, &generate)
        })?;

        reports
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| CommonError::Protocol("root produced no report".to_string()))
    }
}

/// Drive one rank through every phase. Returns the global report on rank 0
/// and `None` elsewhere.
pub fn run_rank<C, G>(
    comm: &mut C,
    compute: RankCompute,
    shape: ProblemShape,
    sink: &SharedSink,
    generate: G,
) -> Result<Option<ElapsedTimeReport>>
where
    C: Communicator,
    G: FnOnce() -> Result<(Vec<i32>, Vec<i32>)>,
{
    Session::start(comm, shape)?
        .prepare(generate)?
        .broadcast()?
        .scatter()?
        .barrier()?
        .compute(compute, sink)?
        .reduce()
}

pub struct Session<'c, C: Communicator, P> {
    comm: &'c mut C,
    shape: ProblemShape,
    partitions: Vec<Partition>,
    phase: P,
}

/// Sizes validated, nothing allocated yet
pub struct Init;

/// Root holds both arrays, members hold storage for array 2
pub struct Generated {
    array1: Option<Vec<i32>>,
    array2: Vec<i32>,
}

/// Every rank holds an identical array 2
pub struct Broadcast {
    array1: Option<Vec<i32>>,
    array2: SharedArray,
}

/// Every rank holds its slice of array 1
pub struct Scattered {
    local1: SharedArray,
    array2: SharedArray,
}

/// All ranks passed the barrier; timing may start
pub struct Synchronized {
    local1: SharedArray,
    array2: SharedArray,
}

pub struct Computed {
    sample: TimingSample,
}

impl<'c, C: Communicator, P> Session<'c, C, P> {
    fn advance<N>(self, phase: N) -> Session<'c, C, N> {
        Session {
            comm: self.comm,
            shape: self.shape,
            partitions: self.partitions,
            phase,
        }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }
}

impl<'c, C: Communicator> Session<'c, C, Init> {
    /// Validate sizes against the number of ranks. Every rank reaches the
    /// same verdict, and no collective has been issued yet.
    pub fn start(comm: &'c mut C, shape: ProblemShape) -> Result<Self> {
        let shape = ProblemShape::new(shape.size1, shape.size2)?;
        shape.check_divisible(comm.size())?;
        let partitions = plan(shape.size1, comm.size(), SplitPolicy::Strict)?;

        Ok(Session {
            comm,
            shape,
            partitions,
            phase: Init,
        })
    }

    /// Root generates both arrays, members allocate array 2. The outcome is
    /// agreed on by all ranks before anyone proceeds.
    pub fn prepare<G>(self, generate: G) -> Result<Session<'c, C, Generated>>
    where
        G: FnOnce() -> Result<(Vec<i32>, Vec<i32>)>,
    {
        let local = if self.comm.is_root() {
            generate().and_then(|(array1, array2)| {
                if array1.len() != self.shape.size1 || array2.len() != self.shape.size2 {
                    return Err(CommonError::Protocol(format!(
                        "generated {} and {} elements, expected {} and {}",
                        array1.len(),
                        array2.len(),
                        self.shape.size1,
                        self.shape.size2
                    )));
                }
                Ok(Generated {
                    array1: Some(array1),
                    array2,
                })
            })
        } else {
            try_alloc(self.shape.size2).map(|array2| Generated {
                array1: None,
                array2,
            })
        };

        let all_ok = self.comm.agree(local.is_ok())?;
        match local {
            Err(e) => {
                tracing::debug!("Rank {} failed to prepare: {}", self.comm.rank(), e);
                Err(e)
            }
            Ok(_) if !all_ok => Err(CommonError::Aborted {
                reason: "another rank failed during allocation or generation".to_string(),
            }),
            Ok(generated) => Ok(self.advance(generated)),
        }
    }
}

impl<'c, C: Communicator> Session<'c, C, Generated> {
    pub fn broadcast(self) -> Result<Session<'c, C, Broadcast>> {
        let Generated { array1, mut array2 } = self.phase;
        self.comm.broadcast(&mut array2)?;

        if array2.len() != self.shape.size2 {
            return Err(CommonError::Protocol(format!(
                "rank {} holds {} elements of array 2, expected {}",
                self.comm.rank(),
                array2.len(),
                self.shape.size2
            )));
        }
        tracing::trace!("Rank {} holds array 2", self.comm.rank());

        let phase = Broadcast {
            array1,
            array2: Arc::from(array2),
        };
        Ok(Session {
            comm: self.comm,
            shape: self.shape,
            partitions: self.partitions,
            phase,
        })
    }
}

impl<'c, C: Communicator> Session<'c, C, Broadcast> {
    pub fn scatter(self) -> Result<Session<'c, C, Scattered>> {
        let Broadcast { array1, array2 } = self.phase;
        let local1 = self.comm.scatter(array1.as_deref(), &self.partitions)?;
        tracing::trace!(
            "Rank {} received {} elements of array 1",
            self.comm.rank(),
            local1.len()
        );

        let phase = Scattered {
            local1: Arc::from(local1),
            array2,
        };
        Ok(Session {
            comm: self.comm,
            shape: self.shape,
            partitions: self.partitions,
            phase,
        })
    }
}

impl<'c, C: Communicator> Session<'c, C, Scattered> {
    pub fn barrier(self) -> Result<Session<'c, C, Synchronized>> {
        self.comm.barrier()?;
        let Scattered { local1, array2 } = self.phase;
        let phase = Synchronized { local1, array2 };
        Ok(Session {
            comm: self.comm,
            shape: self.shape,
            partitions: self.partitions,
            phase,
        })
    }
}

impl<'c, C: Communicator> Session<'c, C, Synchronized> {
    /// Local comparison phase; no communication happens here.
    ///
    /// A hybrid rank is timed from before its threads are spawned until
    /// after they are joined, so its sample includes the fork/join cost.
    pub fn compute(self, compute: RankCompute, sink: &SharedSink) -> Result<Session<'c, C, Computed>> {
        let rank = self.comm.rank();
        let Synchronized { local1, array2 } = &self.phase;

        let sample = match compute {
            RankCompute::Single => {
                Worker::new(rank, Partition::new(0, local1.len())).run(local1, array2, sink.as_ref())
            }
            RankCompute::Threads(model) => {
                let stopwatch = Stopwatch::start(rank);
                let inner = model.execute(local1, array2, sink)?;
                stopwatch.finish(inner.matches)
            }
        };
        tracing::debug!("Rank {} computed in {:.6}s", rank, sample.seconds());

        Ok(self.advance(Computed { sample }))
    }
}

impl<'c, C: Communicator> Session<'c, C, Computed> {
    /// Global max of elapsed time and sum of matches, then finalize
    pub fn reduce(self) -> Result<Option<ElapsedTimeReport>> {
        let sample = self.phase.sample;
        let slowest = self.comm.reduce_max(sample.seconds())?;
        let matches = self.comm.reduce_sum(sample.matches)?;
        self.comm.finalize()?;

        Ok(match (slowest, matches) {
            (Some((seconds, rank)), Some(matches)) => Some(ElapsedTimeReport {
                elapsed: Duration::from_secs_f64(seconds),
                slowest_worker: rank,
                samples: self.comm.size(),
                matches,
            }),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadBackend;
    use crate::report::CollectingSink;
    use crate::comm::local::LocalCluster;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn collecting() -> (Arc<CollectingSink>, SharedSink) {
        let collector = Arc::new(CollectingSink::new());
        let sink: SharedSink = collector.clone();
        (collector, sink)
    }

    fn fixed(
        array1: Vec<i32>,
        array2: Vec<i32>,
    ) -> impl Fn() -> Result<(Vec<i32>, Vec<i32>)> + Sync {
        move || Ok((array1.clone(), array2.clone()))
    }

    #[test]
    fn test_distributed_reports_all_matches_once() {
        let (collector, sink) = collecting();
        let model = DistributedModel {
            processes: 2,
            compute: RankCompute::Single,
        };
        let shape = ProblemShape::new(6, 4).unwrap();
        let report = model
            .execute_in_process(shape, &sink, fixed(vec![3, 7, 2, 9, 3, 1], vec![9, 4, 3, 8]))
            .unwrap();

        assert_eq!(collector.sorted_matches(), vec![3, 3, 9]);
        assert_eq!(report.matches, 3);
        assert_eq!(report.samples, 2);
    }

    #[test]
    fn test_hybrid_splits_each_rank_across_threads() {
        let (collector, sink) = collecting();
        let model = DistributedModel {
            processes: 2,
            compute: RankCompute::Threads(SharedMemoryModel::new(3, ThreadBackend::Scoped)),
        };
        let shape = ProblemShape::new(8, 2).unwrap();
        let report = model
            .execute_in_process(shape, &sink, fixed(vec![1, 2, 1, 2, 5, 5, 1, 9], vec![1, 9]))
            .unwrap();

        assert_eq!(collector.sorted_matches(), vec![1, 1, 1, 9]);
        assert_eq!(report.matches, 4);
    }

    #[test]
    fn test_generation_only_on_root() {
        let (_, sink) = collecting();
        let calls = AtomicUsize::new(0);
        let model = DistributedModel {
            processes: 4,
            compute: RankCompute::Single,
        };
        model
            .execute_in_process(ProblemShape::new(4, 4).unwrap(), &sink, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((vec![1, 2, 3, 4], vec![4, 3, 2, 1]))
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_divisible_fails_before_generation() {
        let (_, sink) = collecting();
        let calls = AtomicUsize::new(0);
        let model = DistributedModel {
            processes: 3,
            compute: RankCompute::Single,
        };
        let err = model
            .execute_in_process(ProblemShape::new(10, 3).unwrap(), &sink, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((vec![0; 10], vec![0; 3]))
            })
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_root_generation_failure_aborts_every_rank() {
        let (collector, sink) = collecting();
        let model = DistributedModel {
            processes: 3,
            compute: RankCompute::Single,
        };
        let err = model
            .execute_in_process(ProblemShape::new(3, 3).unwrap(), &sink, || {
                Err(CommonError::Allocation { elements: 3 })
            })
            .unwrap_err();

        assert!(matches!(err, CommonError::Allocation { elements: 3 }));
        assert!(collector.matches().is_empty());
    }

    #[test]
    fn test_wrongly_sized_generation_is_rejected() {
        let (_, sink) = collecting();
        let model = DistributedModel {
            processes: 1,
            compute: RankCompute::Single,
        };
        let err = model
            .execute_in_process(ProblemShape::new(2, 2).unwrap(), &sink, fixed(vec![1], vec![1, 2]))
            .unwrap_err();
        assert!(matches!(err, CommonError::Protocol(_)));
    }

    #[test]
    fn test_hybrid_rank_sample_covers_thread_fork_and_join() {
        let (_, sink) = collecting();
        let model = SharedMemoryModel::new(32, ThreadBackend::Scoped);
        let shape = ProblemShape::new(64, 2).unwrap();

        let outcomes = LocalCluster::run(1, |mut comm| {
            let session = Session::start(&mut comm, shape)?
                .prepare(|| Ok(((1..=64).collect(), vec![1, 64])))?
                .broadcast()?
                .scatter()?
                .barrier()?;

            let started = Instant::now();
            let computed = session.compute(RankCompute::Threads(model), &sink)?;
            let wall = started.elapsed();
            Ok((computed.phase.sample, wall))
        })
        .unwrap();

        let (sample, wall) = outcomes[0];
        assert_eq!(sample.worker_id, 0);
        assert_eq!(sample.matches, 2);
        // only the tracing call outside the stopwatch separates the two
        assert!(sample.elapsed <= wall);
        assert!(sample.elapsed * 2 >= wall, "{:?} vs {:?}", sample.elapsed, wall);
    }
}
