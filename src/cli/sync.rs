//! `release-mirror sync`

use super::CliConfig;
use crate::sync::{SyncOptions, SyncOutcome, qiniu_orchestrator};
use crate::utils::progress::{ConsoleProgress, is_progress_disabled};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Run one sync attempt.
///
/// Exits 0 when the mirror is up to date or was updated, 1 otherwise. Local
/// files are removed in both cases.
#[derive(Args, Debug, Default)]
pub struct SyncCommand {
    /// Mirror even when the bucket already has the latest version
    #[arg(short, long)]
    pub force: bool,

    /// Directory for the downloaded build and staged marker
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,
}

impl SyncCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let mut config = cli.load_mirror_config().await?;
        if let Some(dir) = &self.work_dir {
            config.sync.work_dir = dir.clone();
        }
        config.validate()?;

        let draw = !cli.no_progress && !is_progress_disabled();
        let mut orchestrator =
            qiniu_orchestrator(config)?.with_progress(Arc::new(ConsoleProgress::with_bars(draw)));

        let outcome = orchestrator.run(&self.options()).await?;
        println!("{}", describe_outcome(&outcome));
        Ok(())
    }

    /// Per-run options from the command line.
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            force: self.force,
            deadline: self.deadline.map(Duration::from_secs),
        }
    }
}

/// One-line summary printed after a successful run.
pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::UpToDate {
            version,
        } => format!("{} Mirror already at {version}", "✓".green()),
        SyncOutcome::Synced {
            previous,
            version,
        } => format!("{} Mirrored {version} (was {previous})", "✓".green().bold()),
    }
}
