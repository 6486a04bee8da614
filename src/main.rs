use anyhow::Result;
use clap::Parser;
use parcommon::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
