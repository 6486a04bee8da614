//! Per-worker timing samples and their reduction
//!
//! The parallel wall-clock time is bounded below by the slowest participant,
//! so samples are always reduced with `max`. Matched-element counts ride
//! along with each sample and are summed.

use std::time::{Duration, Instant};

/// Elapsed wall-clock time of one worker's (or one process's) compute phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    pub worker_id: usize,
    pub elapsed: Duration,
    pub matches: u64,
}

impl TimingSample {
    pub fn new(worker_id: usize, elapsed: Duration, matches: u64) -> Self {
        Self {
            worker_id,
            elapsed,
            matches,
        }
    }

    pub fn from_secs(worker_id: usize, seconds: f64) -> Self {
        Self::new(worker_id, Duration::from_secs_f64(seconds), 0)
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// A running measurement; sampled from a monotonic clock
pub struct Stopwatch {
    worker_id: usize,
    started: Instant,
}

impl Stopwatch {
    pub fn start(worker_id: usize) -> Self {
        Self {
            worker_id,
            started: Instant::now(),
        }
    }

    pub fn finish(self, matches: u64) -> TimingSample {
        TimingSample::new(self.worker_id, self.started.elapsed(), matches)
    }
}

/// Critical-path latency of a parallel computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElapsedTimeReport {
    /// Maximum elapsed time over all samples
    pub elapsed: Duration,
    /// Worker (or rank) that produced the maximum
    pub slowest_worker: usize,
    /// Number of samples reduced
    pub samples: usize,
    /// Sum of matched elements over all samples
    pub matches: u64,
}

impl ElapsedTimeReport {
    pub fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

pub struct TimingReducer;

impl TimingReducer {
    /// Reduce samples to their maximum; `None` when there is nothing to reduce
    ///
    /// ```rust
    /// use parcommon::timing::{TimingReducer, TimingSample};
    ///
    /// let samples = [0.4, 0.9, 0.2]
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(id, s)| TimingSample::from_secs(id, *s));
    /// let report = TimingReducer::reduce(samples).unwrap();
    /// assert_eq!(report.slowest_worker, 1);
    /// ```
    pub fn reduce<I>(samples: I) -> Option<ElapsedTimeReport>
    where
        I: IntoIterator<Item = TimingSample>,
    {
        samples.into_iter().fold(None, |acc, sample| {
            Some(match acc {
                None => ElapsedTimeReport {
                    elapsed: sample.elapsed,
                    slowest_worker: sample.worker_id,
                    samples: 1,
                    matches: sample.matches,
                },
                Some(mut report) => {
                    if sample.elapsed > report.elapsed {
                        report.elapsed = sample.elapsed;
                        report.slowest_worker = sample.worker_id;
                    }
                    report.samples += 1;
                    report.matches += sample.matches;
                    report
                }
            })
        })
    }
}
