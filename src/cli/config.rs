//! `release-mirror config`
//!
//! ```bash
//! release-mirror config init          # Write a commented starter file
//! release-mirror config init --force  # Overwrite it
//! release-mirror config show          # Effective settings, secret key masked
//! release-mirror config path          # Which file is used
//! ```

use super::CliConfig;
use crate::config::MirrorConfig;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

/// Manage the configuration file.
///
/// Without a subcommand the effective configuration is shown.
#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

/// Configuration operations.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigSubcommands {
    /// Write a commented example configuration.
    ///
    /// Refuses to overwrite an existing file without `--force`.
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration, including environment overrides.
    ///
    /// The secret key is masked.
    Show,

    /// Print the path of the configuration file in use.
    Path,
}

impl ConfigCommand {
    pub fn new(command: Option<ConfigSubcommands>) -> Self {
        Self {
            command,
        }
    }

    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        match self.command {
            Some(ConfigSubcommands::Init {
                force,
            }) => Self::init(cli, force).await,
            Some(ConfigSubcommands::Show) | None => Self::show(cli).await,
            Some(ConfigSubcommands::Path) => {
                Self::show_path(cli);
                Ok(())
            }
        }
    }

    async fn init(cli: &CliConfig, force: bool) -> Result<()> {
        let path = cli.resolved_config_path();
        MirrorConfig::init_example(&path, force).await?;

        println!("{} Created config at: {}", "✓".green(), path.display());
        println!("\n{}", "Next steps:".yellow());
        println!("  1. Set mirror.bucket and mirror.domain");
        println!(
            "  2. Export QINIU_ACCESS_KEY and QINIU_SECRET_KEY (or add them to a .env file)"
        );
        println!("  3. Run 'release-mirror status' to check connectivity");
        Ok(())
    }

    async fn show(cli: &CliConfig) -> Result<()> {
        let config = cli.load_mirror_config().await?;
        let path = cli.resolved_config_path();

        println!("{}", "Mirror Configuration".bold());
        if path.exists() {
            println!("Location: {}\n", path.display());
        } else {
            println!("Location: {} {}\n", path.display(), "(not found, using defaults)".dimmed());
        }
        println!("{}", toml::to_string_pretty(&config.redacted())?);

        if let Err(e) = config.validate() {
            println!("{} {e}", "Warning:".yellow());
        }
        Ok(())
    }

    fn show_path(cli: &CliConfig) {
        let path = cli.resolved_config_path();
        println!("{}", path.display());
        if !path.exists() {
            eprintln!("{}", "(file does not exist; defaults are used)".dimmed());
        }
    }
}
