use crate::parallel::ThreadBackend;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub const ENV_PREFIX: &str = "PARCOMMON_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    pub parallel: ParallelConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub seed: u64,
    /// Inclusive upper bound of generated values
    pub max_value: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub thread_percentage: u8,
    /// 0 means no limit
    pub max_threads: usize,
    pub backend: ThreadBackend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub debug: bool,
    pub show_arrays: bool,
}

/// Command-line values; `None` leaves the lower layers untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    pub data: DataOverrides,
    pub parallel: ParallelOverrides,
    pub report: ReportOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParallelOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<ThreadBackend>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl RunConfig {
    /// Build the layered figment without extracting it
    pub fn figment(custom_config: Option<&Path>, cli_overrides: &CliOverrides) -> Figment {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG)) // 1. Defaults (lowest)
            .merge(Toml::file(Self::user_config_path())) // 2. User config
            .merge(Toml::file("parcommon.toml")); // 3. Repo config

        if let Some(path) = custom_config {
            figment = figment.merge(Toml::file(path)); // 4. Custom config
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__")) // 5. Environment variables
            .merge(Serialized::defaults(cli_overrides)) // 6. CLI (highest priority)
    }

    pub fn load(custom_config: Option<&Path>, cli_overrides: &CliOverrides) -> Result<Self> {
        if let Some(path) = custom_config {
            if !path.is_file() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
        }

        let config: RunConfig = Self::figment(custom_config, cli_overrides)
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;

        tracing::trace!("CONFIG LOAD: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.max_value < 1 {
            anyhow::bail!("data.max_value must be at least 1 (got {})", self.data.max_value);
        }
        if self.parallel.thread_percentage == 0 || self.parallel.thread_percentage > 100 {
            anyhow::bail!(
                "parallel.thread_percentage must be between 1 and 100 (got {})",
                self.parallel.thread_percentage
            );
        }
        Ok(())
    }

    pub fn export(&self, format: ConfigFormat) -> Result<String> {
        Ok(match format {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
        })
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/parcommon/config.toml", home),
            Err(_) => "~/.config/parcommon/config.toml".to_string(),
        }
    }
}
