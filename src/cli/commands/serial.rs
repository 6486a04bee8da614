use super::{console_sink, seeded_source};
use crate::config::RunConfig;
use crate::parallel::{ExecutionModel, ProblemShape};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct SerialArgs {
    /// Number of elements in array 1
    pub size1: usize,
    /// Number of elements in array 2
    pub size2: usize,
}

pub fn execute(args: SerialArgs, config: &RunConfig) -> Result<()> {
    let shape = ProblemShape::new(args.size1, args.size2)?;
    let sink = console_sink(config);
    let mut source = seeded_source(config);

    ExecutionModel::Sequential.run(shape, &mut source, &sink)?;
    Ok(())
}
