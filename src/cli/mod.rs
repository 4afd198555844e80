//! Command-line interface for release-mirror
//!
//! # Commands
//!
//! - `sync` - Mirror the latest upstream build if the bucket is behind
//! - `status` - Compare upstream and mirrored versions without transferring
//! - `config` - Show, initialize or locate the configuration file
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Errors only
//! - `--config` / `-c` - Explicit config file (also `RELEASE_MIRROR_CONFIG`)
//! - `--no-progress` - No progress bars; sampled progress is logged instead
//!
//! # Examples
//!
//! ```bash
//! # Run from cron; a .env file next to the binary supplies QINIU_* credentials
//! release-mirror --no-progress sync
//!
//! # Check without transferring
//! release-mirror status
//!
//! # Re-upload even if the marker already matches
//! release-mirror sync --force --deadline 1800
//! ```
//!
//! Logging goes to stderr through `tracing`. `RUST_LOG` overrides the level
//! chosen by `--verbose`/`--quiet`.

mod config;
mod status;
mod sync;

pub use config::{ConfigCommand, ConfigSubcommands};
pub use status::StatusCommand;
pub use sync::SyncCommand;

use crate::config::MirrorConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Settings derived from global flags and handed to every command.
///
/// Commands receive this instead of reading process-wide state, which keeps
/// them testable without touching the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log level for this crate's targets; `None` keeps only errors.
    pub log_level: Option<String>,

    /// Disable progress bars.
    pub no_progress: bool,

    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global `tracing` subscriber.
    ///
    /// `RUST_LOG` wins when set. Dependencies are capped at `warn` so HTTP
    /// internals stay out of normal output.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = self.log_level.as_deref().unwrap_or("error");
            EnvFilter::new(format!("warn,release_mirror={level}"))
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Load the mirror configuration and apply environment overrides.
    pub async fn load_mirror_config(&self) -> Result<MirrorConfig> {
        let mut config = MirrorConfig::load_with_optional(self.config_path.clone()).await?;
        config.apply_process_env();
        Ok(config)
    }

    /// Path `config init` and `config path` operate on.
    pub fn resolved_config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(MirrorConfig::default_path)
    }
}

/// Mirror upstream release builds into an object-storage bucket.
#[derive(Parser, Debug)]
#[command(
    name = "release-mirror",
    about = "Mirror the latest upstream release build into an object-storage bucket",
    version,
    long_about = "Checks the upstream release API for the latest version, compares it with the \
                  version marker stored in the bucket and, when they differ, downloads the build, \
                  uploads it and updates the marker."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "RELEASE_MIRROR_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable progress bars (sampled progress is logged instead)
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror the latest upstream build if the bucket is behind
    Sync(SyncCommand),

    /// Show upstream and mirrored versions without transferring anything
    Status(StatusCommand),

    /// Manage the configuration file
    Config(ConfigCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Sync(cmd) => cmd.execute(&config).await,
            Commands::Status(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(&config).await,
        }
    }
}
