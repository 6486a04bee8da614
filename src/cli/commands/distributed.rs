use super::rank::RankJob;
use super::{RankFlags, console_sink, seeded_source};
use crate::cli::output::Output;
use crate::comm::process::ProcessCluster;
use crate::config::RunConfig;
use crate::error::CommonError;
use crate::parallel::{ExecutionModel, ProblemShape, ThreadBackend, generate_pair, run_rank};
use crate::report::RunSummary;
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct DistributedArgs {
    /// Number of processes
    #[arg(short = 'n', long = "processes")]
    pub processes: usize,
    /// Number of elements in array 1
    pub size1: usize,
    /// Number of elements in array 2
    pub size2: usize,

    /// Run the ranks as threads of this process instead of child processes
    #[arg(long)]
    pub in_process: bool,
}

#[derive(Args)]
pub struct HybridArgs {
    /// Number of processes
    #[arg(short = 'n', long = "processes")]
    pub processes: usize,

    /// Threads per process (defaults to the configured share of the cores)
    #[arg(short, long, env = "OMP_NUM_THREADS")]
    pub threads: Option<usize>,

    /// Number of elements in array 1
    pub size1: usize,
    /// Number of elements in array 2
    pub size2: usize,

    /// Thread backend (overrides parallel.backend)
    #[arg(long, value_enum)]
    pub backend: Option<ThreadBackend>,

    /// Run the ranks as threads of this process instead of child processes
    #[arg(long)]
    pub in_process: bool,
}

pub fn execute_distributed(
    args: DistributedArgs,
    config: &RunConfig,
    output: &Output,
    flags: RankFlags,
) -> Result<()> {
    let shape = ProblemShape::new(args.size1, args.size2)?;
    let model = ExecutionModel::Distributed {
        processes: args.processes,
    };
    launch(model, shape, args.in_process, config, output, flags)
}

pub fn execute_hybrid(
    args: HybridArgs,
    config: &RunConfig,
    output: &Output,
    flags: RankFlags,
) -> Result<()> {
    let shape = ProblemShape::new(args.size1, args.size2)?;
    let threads = match args.threads {
        Some(threads) => threads,
        None => {
            let threads = ExecutionModel::calculate_optimal_workers(
                config.parallel.max_threads,
                config.parallel.thread_percentage,
            );
            output.verbose(&format!("Using {} threads per process", threads));
            threads
        }
    };
    let model = ExecutionModel::Hybrid {
        processes: args.processes,
        threads,
        backend: config.parallel.backend,
    };
    launch(model, shape, args.in_process, config, output, flags)
}

fn launch(
    model: ExecutionModel,
    shape: ProblemShape,
    in_process: bool,
    config: &RunConfig,
    output: &Output,
    flags: RankFlags,
) -> Result<()> {
    // Nothing is launched or generated for a run that cannot be split
    model.validate(&shape)?;

    let sink = console_sink(config);
    let mut source = seeded_source(config);

    if in_process {
        output.verbose("Running ranks as threads of this process");
        model.run(shape, &mut source, &sink)?;
        return Ok(());
    }

    let distributed = model
        .distributed()
        .ok_or_else(|| CommonError::Protocol("not a distributed model".to_string()))?;

    let mut rank_args = RankJob::new(shape, distributed.compute, config.report.debug).to_args()?;
    rank_args.extend(flags.to_args());

    output.verbose(&format!("Launching {} processes", distributed.processes));
    let (cluster, mut comm) = ProcessCluster::launch(distributed.processes, &rank_args)?;
    tracing::info!("Running {:?} over {} x {} elements", model, shape.size1, shape.size2);

    let report = run_rank(&mut comm, distributed.compute, shape, &sink, || {
        generate_pair(&mut source, shape, &sink)
    })?
    .ok_or_else(|| CommonError::Protocol("root produced no report".to_string()))?;

    cluster.finalize()?;

    sink.emit_summary(&RunSummary::new(model.layout(), report));
    Ok(())
}
