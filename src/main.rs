//! release-mirror command-line entry point.

use anyhow::Result;
use clap::Parser;
use release_mirror::cli;
use release_mirror::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials usually live in .env next to the cron job
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
