//! Command-line interface
//!
//! Every command loads the layered configuration, builds one execution model
//! and prints its summary. The hidden `rank` command is how launched child
//! processes enter a distributed run.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
