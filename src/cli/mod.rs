//! CLI entry point for Omni.

pub mod chat;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{default_config_path, ConfigOverrides, OmniConfig, ProviderKind};
use crate::error::OmniError;

/// Omni assistant CLI
#[derive(Parser, Debug)]
#[command(name = "omni", version, about = "Omni: tool-calling assistant CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the assistant (reads lines from stdin)
    Chat(ConfigArgs),
    /// List the capabilities the registry loads
    Tools(ConfigArgs),
}

/// Settings shared by every subcommand. Flags win over file and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Backend provider (cborg, openai, ollama)
    #[arg(short, long)]
    pub provider: Option<ProviderKind>,

    /// Model name for the provider
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Config file (defaults to $OMNI_CONFIG or the platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Resolve defaults, file, environment and these flags.
    pub fn load(&self) -> Result<OmniConfig, OmniError> {
        let _ = dotenvy::dotenv();
        let path = self.config.clone().or_else(default_config_path);
        if let Some(explicit) = &self.config {
            if !explicit.exists() {
                return Err(OmniError::Configuration(format!(
                    "config file not found: {}",
                    explicit.display()
                )));
            }
        }
        Ok(OmniConfig::load_from(path.as_deref())?.with_overrides(self.overrides()))
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider,
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
