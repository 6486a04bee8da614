use crate::config::{ConfigFormat, RunConfig};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: ConfigFormat,
}

pub fn execute(args: ConfigArgs, config: &RunConfig) -> Result<()> {
    println!("{}", config.export(args.format)?.trim_end());
    Ok(())
}
