use crate::error::{CommonError, Result};
use crate::partition::Partition;
use crate::report::ReportSink;
use crate::timing::{ElapsedTimeReport, TimingReducer};
use crate::worker::Worker;

/// Baseline: one worker over the whole of array 1, matches in index order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialModel;

impl SequentialModel {
    pub fn execute(
        &self,
        array1: &[i32],
        array2: &[i32],
        sink: &dyn ReportSink,
    ) -> Result<ElapsedTimeReport> {
        let worker = Worker::new(0, Partition::new(0, array1.len()));
        let sample = worker.run(array1, array2, sink);
        TimingReducer::reduce([sample])
            .ok_or_else(|| CommonError::Protocol("sequential run produced no sample".to_string()))
    }
}
