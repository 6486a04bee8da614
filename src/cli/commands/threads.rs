use super::{console_sink, seeded_source};
use crate::cli::output::Output;
use crate::config::RunConfig;
use crate::parallel::{ExecutionModel, ProblemShape, ThreadBackend};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct ThreadsArgs {
    /// Number of worker threads
    pub thread_count: usize,
    /// Number of elements in array 1
    pub size1: usize,
    /// Number of elements in array 2
    pub size2: usize,

    /// Thread backend (overrides parallel.backend)
    #[arg(long, value_enum)]
    pub backend: Option<ThreadBackend>,
}

pub fn execute(args: ThreadsArgs, config: &RunConfig, output: &Output) -> Result<()> {
    let shape = ProblemShape::new(args.size1, args.size2)?;
    let model = ExecutionModel::SharedMemory {
        threads: args.thread_count,
        backend: config.parallel.backend,
    };
    model.validate(&shape)?;

    if args.thread_count > shape.size1 {
        output.warning(&format!(
            "{} threads for {} elements: some threads will have nothing to compare",
            args.thread_count, shape.size1
        ));
    }

    let sink = console_sink(config);
    let mut source = seeded_source(config);
    model.run(shape, &mut source, &sink)?;
    Ok(())
}
