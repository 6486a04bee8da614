use crate::cli::output::Output;
use crate::config::{CliOverrides, DataOverrides, ParallelOverrides, ReportOverrides, RunConfig};
use crate::error::CommonError;
use crate::parallel::ThreadBackend;
use crate::report::{ConsoleSink, SharedSink};
use crate::source::SeededSource;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

pub mod config;
pub mod distributed;
pub mod rank;
pub mod serial;
pub mod threads;

#[derive(Parser)]
#[command(
    name = "parcommon",
    version = env!("CARGO_PKG_VERSION"),
    about = "Find the common elements of two random integer arrays",
    long_about = "parcommon generates two pseudo-random integer arrays and reports every element \
                  of the first that occurs in the second, timing the comparison under a serial, \
                  threaded, multi-process or hybrid execution model."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print every matched element
    #[arg(long, global = true)]
    pub debug: bool,

    /// Seed of the generated arrays
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Largest value that may be generated
    #[arg(long, global = true)]
    pub max_value: Option<i32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare the arrays with a single worker
    Serial(serial::SerialArgs),
    /// Compare the arrays with a pool of threads in this process
    Threads(threads::ThreadsArgs),
    /// Compare the arrays across several processes
    Distributed(distributed::DistributedArgs),
    /// Several processes, each running several threads
    Hybrid(distributed::HybridArgs),
    /// Display the merged configuration
    Config(config::ConfigArgs),
    #[command(hide = true)]
    Rank(rank::RankArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Serial(_) => "serial",
            Commands::Threads(_) => "threads",
            Commands::Distributed(_) => "distributed",
            Commands::Hybrid(_) => "hybrid",
            Commands::Config(_) => "config",
            Commands::Rank(_) => rank::RANK_COMMAND,
        }
    }

    /// Backend chosen on the command line, if this command takes one
    fn backend(&self) -> Option<ThreadBackend> {
        match self {
            Commands::Threads(args) => args.backend,
            Commands::Hybrid(args) => args.backend,
            _ => None,
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // Set up logging based on verbosity
        setup_logging(self.verbose, self.quiet);

        let output = Output::new(self.verbose > 0, self.quiet);
        let command_name = self.command.name();

        let config = RunConfig::load(self.config.as_deref(), &self.overrides())?;
        let flags = RankFlags {
            verbose: self.verbose,
            quiet: self.quiet,
        };

        let result = match self.command {
            Commands::Serial(args) => serial::execute(args, &config),
            Commands::Threads(args) => threads::execute(args, &config, &output),
            Commands::Distributed(args) => {
                distributed::execute_distributed(args, &config, &output, flags)
            }
            Commands::Hybrid(args) => distributed::execute_hybrid(args, &config, &output, flags),
            Commands::Config(args) => config::execute(args, &config),
            // Child ranks take the run parameters from the job description
            Commands::Rank(args) => rank::execute(args),
        };

        if let Err(e) = &result {
            if e.downcast_ref::<CommonError>()
                .is_some_and(CommonError::is_configuration)
            {
                if let Some(usage) = usage_of(command_name) {
                    output.hint(&usage);
                }
            }
        }
        result
    }

    /// Flags that take precedence over every configuration layer
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            data: DataOverrides {
                seed: self.seed,
                max_value: self.max_value,
            },
            parallel: ParallelOverrides {
                backend: self.command.backend(),
            },
            report: ReportOverrides {
                debug: self.debug.then_some(true),
            },
        }
    }
}

/// Logging flags forwarded to child ranks
#[derive(Debug, Clone, Copy)]
pub struct RankFlags {
    pub verbose: u8,
    pub quiet: bool,
}

impl RankFlags {
    pub fn to_args(self) -> Vec<String> {
        let mut args = Vec::new();
        if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(self.verbose as usize)));
        }
        if self.quiet {
            args.push("--quiet".to_string());
        }
        args
    }
}

fn console_sink(config: &RunConfig) -> SharedSink {
    Arc::new(ConsoleSink::new(config.report.debug, config.report.show_arrays))
}

fn seeded_source(config: &RunConfig) -> SeededSource {
    SeededSource::new(config.data.seed, config.data.max_value)
}

fn usage_of(command: &str) -> Option<String> {
    let mut cli = Cli::command();
    cli.build();
    cli.find_subcommand_mut(command)
        .map(|sub| sub.render_usage().to_string())
}

// Always stderr: a child rank's stdout carries collective traffic.
fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rank_flags_forward_verbosity() {
        let flags = RankFlags {
            verbose: 2,
            quiet: false,
        };
        assert_eq!(flags.to_args(), vec!["-vv".to_string()]);

        let flags = RankFlags {
            verbose: 0,
            quiet: true,
        };
        assert_eq!(flags.to_args(), vec!["--quiet".to_string()]);
    }

    #[test]
    fn test_backend_flag_feeds_the_override_layer() {
        let cli = Cli::parse_from([
            "parcommon", "--seed", "7", "threads", "2", "8", "8", "--backend", "rayon",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.parallel.backend, Some(ThreadBackend::Rayon));
        assert_eq!(overrides.data.seed, Some(7));

        let cli = Cli::parse_from(["parcommon", "serial", "8", "8"]);
        assert_eq!(cli.overrides().parallel.backend, None);
        assert_eq!(cli.overrides().report.debug, None);
    }

    #[test]
    fn test_usage_of_known_command() {
        let usage = usage_of("distributed").unwrap();
        assert!(usage.contains("distributed"));
        assert!(usage_of("nonexistent").is_none());
    }
}
