//! Layered run configuration
//!
//! Values are merged with figment, lowest priority first:
//!
//! ```text
//! 1. default-config.toml            embedded at compile time
//! 2. ~/.config/parcommon/config.toml
//! 3. ./parcommon.toml
//! 4. --config FILE
//! 5. PARCOMMON_* environment         PARCOMMON_DATA__SEED=7 -> data.seed
//! 6. command-line flags
//! ```
//!
//! Only run-wide settings live here. Array sizes and worker counts are
//! positional arguments of each command and are validated by the models.

pub mod core;

pub use self::core::{
    CliOverrides, ConfigFormat, DataConfig, DataOverrides, ENV_PREFIX, ParallelConfig,
    ParallelOverrides, ReportConfig, ReportOverrides, RunConfig,
};
