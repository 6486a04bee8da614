//! Entry point of a launched child rank
//!
//! The root describes the run in a JSON job passed on the command line.
//! The child connects to the root through its own stdin/stdout and walks
//! the same session as every other rank. It never generates data.

use crate::comm::process::{RANK_SUBCOMMAND, connect_to_root};
use crate::parallel::{ProblemShape, RankCompute, SharedMemoryModel, ThreadBackend, run_rank};
use crate::report::{ConsoleSink, SharedSink, Stream};
use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const RANK_COMMAND: &str = RANK_SUBCOMMAND;

#[derive(Args)]
pub struct RankArgs {
    #[arg(long)]
    pub rank: usize,

    #[arg(long)]
    pub size: usize,

    /// Run description as JSON
    #[arg(long)]
    pub job: String,
}

/// What every child needs to know about the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankJob {
    pub shape: ProblemShape,
    /// Threads per rank; absent for plain distributed runs
    pub threads: Option<usize>,
    pub backend: ThreadBackend,
    pub debug: bool,
}

impl RankJob {
    pub fn new(shape: ProblemShape, compute: RankCompute, debug: bool) -> Self {
        match compute {
            RankCompute::Single => Self {
                shape,
                threads: None,
                backend: ThreadBackend::default(),
                debug,
            },
            RankCompute::Threads(model) => Self {
                shape,
                threads: Some(model.threads),
                backend: model.backend,
                debug,
            },
        }
    }

    pub fn compute(&self) -> RankCompute {
        match self.threads {
            None => RankCompute::Single,
            Some(threads) => RankCompute::Threads(SharedMemoryModel::new(threads, self.backend)),
        }
    }

    pub fn to_args(&self) -> Result<Vec<String>> {
        Ok(vec!["--job".to_string(), serde_json::to_string(self)?])
    }
}

pub fn execute(args: RankArgs) -> Result<()> {
    let job: RankJob = serde_json::from_str(&args.job).context("Invalid rank job")?;
    if args.rank == 0 || args.rank >= args.size {
        anyhow::bail!("Invalid rank {} for a run of {} ranks", args.rank, args.size);
    }
    tracing::debug!("Rank {} of {} starting: {:?}", args.rank, args.size, job);

    // stdout is the link to the root
    let sink: SharedSink = Arc::new(ConsoleSink::new(job.debug, false).with_stream(Stream::Stderr));
    let mut comm = connect_to_root(args.rank, args.size);

    run_rank(&mut comm, job.compute(), job.shape, &sink, || {
        Err(crate::error::CommonError::Protocol(
            "only the root generates data".to_string(),
        ))
    })?;

    tracing::debug!("Rank {} finished", args.rank);
    Ok(())
}
