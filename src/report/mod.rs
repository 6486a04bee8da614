//! Result and debug output
//!
//! Workers forward matches to a [`ReportSink`]; the coordinating participant
//! forwards the final [`RunSummary`]. Verbosity is chosen when the sink is
//! built, so production runs simply plug in a sink that drops matches.
//! Implementations must accept concurrent, unordered calls from many threads.

mod console;

pub use console::{ConsoleSink, Stream};

use crate::timing::ElapsedTimeReport;
use std::sync::{Arc, Mutex, MutexGuard};

/// How the workers of a run were laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Serial,
    Threads { threads: usize },
    Processes { processes: usize, threads: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub layout: Layout,
    pub report: ElapsedTimeReport,
}

impl RunSummary {
    pub fn new(layout: Layout, report: ElapsedTimeReport) -> Self {
        Self { layout, report }
    }

    /// One-line summary in the format shared by every execution model
    pub fn headline(&self) -> String {
        let elapsed = format!("Elapsed time = {:.6} seconds", self.report.seconds());
        match self.layout {
            Layout::Serial => format!("RUNNING SERIAL\t{}", elapsed),
            Layout::Threads { threads } => format!("RUNNING {} threads\t{}", threads, elapsed),
            Layout::Processes { processes, threads } => format!(
                "RUNNING: {} PROCESSES\tEACH {} THREADS\t{}",
                processes, threads, elapsed
            ),
        }
    }
}

pub trait ReportSink: Send + Sync {
    /// A value of array 1 that occurs somewhere in array 2
    fn emit_match(&self, value: i32);

    /// Dump of a generated array (generation authority only)
    fn emit_array(&self, label: &str, values: &[i32]);

    fn emit_summary(&self, summary: &RunSummary);
}

pub type SharedSink = Arc<dyn ReportSink>;

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn emit_match(&self, _value: i32) {}

    fn emit_array(&self, _label: &str, _values: &[i32]) {}

    fn emit_summary(&self, _summary: &RunSummary) {}
}

/// Keeps every event in memory; append-only behind a mutex
#[derive(Debug, Default)]
pub struct CollectingSink {
    matches: Mutex<Vec<i32>>,
    summaries: Mutex<Vec<RunSummary>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported matches in arrival order
    pub fn matches(&self) -> Vec<i32> {
        lock(&self.matches).clone()
    }

    /// Reported matches sorted, for order-insensitive comparison
    pub fn sorted_matches(&self) -> Vec<i32> {
        let mut values = self.matches();
        values.sort_unstable();
        values
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        lock(&self.summaries).clone()
    }
}

impl ReportSink for CollectingSink {
    fn emit_match(&self, value: i32) {
        lock(&self.matches).push(value);
    }

    fn emit_array(&self, _label: &str, _values: &[i32]) {}

    fn emit_summary(&self, summary: &RunSummary) {
        lock(&self.summaries).push(*summary);
    }
}

// A panicking worker must not hide the matches already collected.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report(seconds: f64) -> ElapsedTimeReport {
        ElapsedTimeReport {
            elapsed: Duration::from_secs_f64(seconds),
            slowest_worker: 0,
            samples: 1,
            matches: 0,
        }
    }

    #[test]
    fn test_headline_formats() {
        let serial = RunSummary::new(Layout::Serial, report(0.5));
        assert_eq!(serial.headline(), "RUNNING SERIAL\tElapsed time = 0.500000 seconds");

        let threads = RunSummary::new(Layout::Threads { threads: 4 }, report(0.25));
        assert!(threads.headline().starts_with("RUNNING 4 threads\t"));

        let hybrid = RunSummary::new(
            Layout::Processes {
                processes: 2,
                threads: 8,
            },
            report(1.0),
        );
        assert!(hybrid.headline().starts_with("RUNNING: 2 PROCESSES\tEACH 8 THREADS\t"));
    }

    #[test]
    fn test_collecting_sink_tolerates_concurrent_writers() {
        let sink = Arc::new(CollectingSink::new());
        crossbeam::thread::scope(|s| {
            for worker in 0..4 {
                let sink = sink.clone();
                s.spawn(move |_| {
                    for i in 0..250 {
                        sink.emit_match(worker * 1000 + i);
                    }
                });
            }
        })
        .unwrap();
        assert_eq!(sink.matches().len(), 1000);
    }

    #[test]
    fn test_null_sink_is_silent() {
        let sink: SharedSink = Arc::new(NullSink);
        sink.emit_match(1);
        sink.emit_summary(&RunSummary::new(Layout::Serial, report(0.1)));
    }
}
