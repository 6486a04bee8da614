//! Error taxonomy for parcommon
//!
//! Configuration problems are detected before any data is generated or any
//! collective is entered. Allocation failures and protocol violations are
//! fatal for the whole run; nothing is retried.

use crate::comm::frame::FrameError;
use thiserror::Error;

/// Invalid run parameters, rejected before computation starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("array sizes must be positive (got size1={size1}, size2={size2})")]
    NonPositiveSize { size1: usize, size2: usize },

    #[error("{what} must be a positive integer")]
    ZeroWorkers { what: &'static str },

    #[error(
        "array sizes must be divisible by the number of processes ({processes}); got size1={size1}, size2={size2}"
    )]
    NotDivisible {
        size1: usize,
        size2: usize,
        processes: usize,
    },

    #[error("{total} elements cannot be split evenly across {workers} workers")]
    UnevenSplit { total: usize, workers: usize },
}

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("memory allocation failed for {elements} integers")]
    Allocation { elements: usize },

    #[error("run aborted: {reason}")]
    Aborted { reason: String },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Frame(#[from] FrameError),

    #[error("cannot locate the parcommon executable to launch ranks: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("failed to launch rank {rank}: {source}")]
    Launch {
        rank: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("a worker thread panicked during the comparison phase")]
    WorkerPanicked,
}

impl CommonError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, CommonError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, CommonError>;

/// Allocate an empty vector able to hold `elements` integers without reallocating
pub fn try_alloc(elements: usize) -> Result<Vec<i32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(elements)
        .map_err(|_| CommonError::Allocation { elements })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc_reserves_capacity() {
        let buf = try_alloc(128).unwrap();
        assert!(buf.capacity() >= 128);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_try_alloc_reports_impossible_request() {
        let err = try_alloc(usize::MAX).unwrap_err();
        assert!(matches!(err, CommonError::Allocation { elements } if elements == usize::MAX));
    }

    #[test]
    fn test_not_divisible_message_names_process_count() {
        let err = CommonError::from(ConfigError::NotDivisible {
            size1: 10,
            size2: 6,
            processes: 3,
        });
        assert!(err.is_configuration());
        assert!(err.to_string().contains("(3)"));
    }

    #[test]
    fn test_missing_executable_blames_no_rank() {
        let err = CommonError::CurrentExe(std::io::Error::from(std::io::ErrorKind::NotFound));
        let message = err.to_string();
        assert!(message.contains("executable"));
        assert!(!message.contains("rank 1"));
    }
}
