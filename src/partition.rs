//! Static contiguous partitioning of an index range across workers
//!
//! Two policies exist on purpose. Process-level splits are strict: the range
//! must divide evenly, otherwise the input is rejected. Thread-level splits
//! let the last worker absorb the remainder, the way a `schedule(static)`
//! loop tolerates an uneven final chunk.

use crate::error::{ConfigError, Result};
use std::ops::Range;

/// A half-open index range `[start, end)` owned by exactly one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// How a non-divisible range is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Reject `total % workers != 0` (distributed scatter)
    Strict,
    /// Last worker takes `total % workers` extra elements (threads)
    AbsorbRemainder,
}

/// Split `[0, total_size)` into `worker_count` contiguous partitions
///
/// Every index lands in exactly one partition, and the result depends only
/// on the arguments.
///
/// # Examples
/// ```rust
/// use parcommon::partition::{plan, SplitPolicy};
///
/// let parts = plan(10, 3, SplitPolicy::AbsorbRemainder).unwrap();
/// let lens: Vec<_> = parts.iter().map(|p| p.len()).collect();
/// assert_eq!(lens, vec![3, 3, 4]);
///
/// assert!(plan(10, 3, SplitPolicy::Strict).is_err());
/// ```
pub fn plan(total_size: usize, worker_count: usize, policy: SplitPolicy) -> Result<Vec<Partition>> {
    if worker_count == 0 {
        return Err(ConfigError::ZeroWorkers { what: "worker count" }.into());
    }

    let base = total_size / worker_count;
    let remainder = total_size % worker_count;

    if remainder != 0 && policy == SplitPolicy::Strict {
        return Err(ConfigError::UnevenSplit {
            total: total_size,
            workers: worker_count,
        }
        .into());
    }

    let partitions = (0..worker_count)
        .map(|worker| {
            let start = worker * base;
            let end = if worker + 1 == worker_count {
                total_size
            } else {
                start + base
            };
            Partition::new(start, end)
        })
        .collect();

    Ok(partitions)
}
