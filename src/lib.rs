//! # parcommon - common elements of two integer arrays, four ways
//!
//! Generates two pseudo-random integer arrays and reports every element of
//! the first that occurs in the second. The comparison kernel is identical
//! under every execution model; only the split of array 1, the placement of
//! array 2 and the synchronization around the timed region differ.
//!
//! ## Execution models
//!
//! - **Sequential**: one worker over the whole of array 1
//! - **Shared memory**: a pool of threads over read-only shared arrays
//! - **Distributed**: ranks connected in a star around rank 0, which
//!   broadcasts array 2 and scatters array 1
//! - **Hybrid**: distributed, with a thread pool inside every rank
//!
//! The reported time is always the slowest worker's, never a sum.
//!
//! ## Quick Start
//!
//! ```bash
//! parcommon serial 100000 100000
//! parcommon threads 8 100000 100000 --backend rayon
//! parcommon distributed -n 4 100000 100000
//! parcommon hybrid -n 2 -t 4 100000 100000
//! ```

pub mod cli;
pub mod comm;
pub mod config;
pub mod error;
pub mod parallel;
pub mod partition;
pub mod report;
pub mod source;
pub mod timing;
pub mod worker;

pub use cli::{Cli, Output};
pub use config::RunConfig;
pub use error::{CommonError, ConfigError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
