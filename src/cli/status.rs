//! `release-mirror status`

use super::CliConfig;
use crate::sync::{SyncStatus, qiniu_orchestrator};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Compare upstream and mirrored versions; nothing is downloaded or written.
#[derive(Args, Debug, Default)]
pub struct StatusCommand {
    /// Exit with an error when a sync is pending
    #[arg(long)]
    pub check: bool,
}

impl StatusCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_mirror_config().await?;
        config.validate()?;

        let status = qiniu_orchestrator(config)?.status().await?;
        println!("{}", render_status(&status));

        if self.check && status.is_pending() {
            anyhow::bail!("mirror is behind upstream ({} < {})", status.mirrored, status.upstream);
        }
        Ok(())
    }
}

/// Human-readable status block.
pub fn render_status(status: &SyncStatus) -> String {
    let state = if status.is_pending() {
        "sync pending".yellow().to_string()
    } else {
        "up to date".green().to_string()
    };
    format!(
        "{:<10} {}\n{:<10} {}\n{:<10} {state}",
        "Upstream:", status.upstream, "Mirrored:", status.mirrored, "Status:"
    )
}
