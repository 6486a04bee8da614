//! The comparison kernel and the worker that runs it over one partition
//!
//! The kernel is the same for every execution model: for each element of the
//! worker's slice of array 1, search array 2 for the first equal value and
//! stop there. A value is reported at most once per index, however many
//! times it occurs in array 2; repeated values in array 1 are reported once
//! per occurrence.

use crate::partition::Partition;
use crate::report::ReportSink;
use crate::timing::{Stopwatch, TimingSample};

/// Scan `slice` against `array2`, calling `on_match` for every hit.
/// Returns the number of hits.
#[inline]
pub fn scan<F>(slice: &[i32], array2: &[i32], mut on_match: F) -> u64
where
    F: FnMut(i32),
{
    let mut matches = 0;
    for &value in slice {
        if array2.iter().any(|&candidate| candidate == value) {
            on_match(value);
            matches += 1;
        }
    }
    matches
}

/// One unit of execution: owns a partition of array 1
#[derive(Debug, Clone, Copy)]
pub struct Worker {
    pub id: usize,
    pub partition: Partition,
}

impl Worker {
    pub fn new(id: usize, partition: Partition) -> Self {
        Self { id, partition }
    }

    /// Run the kernel over `array1[partition]`, timing only the scan itself
    pub fn run(&self, array1: &[i32], array2: &[i32], sink: &dyn ReportSink) -> TimingSample {
        let slice = &array1[self.partition.range()];
        tracing::trace!(
            "worker-{} scanning [{}, {})",
            self.id,
            self.partition.start,
            self.partition.end
        );

        let watch = Stopwatch::start(self.id);
        let matches = scan(slice, array2, |value| sink.emit_match(value));
        let sample = watch.finish(matches);

        tracing::trace!(
            "worker-{} finished in {:.6}s ({} matches)",
            self.id,
            sample.seconds(),
            matches
        );
        sample
    }
}
