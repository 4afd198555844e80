//! The version sync workflow
//!
//! A run asks the [`VersionOracle`] for the latest upstream version, reads
//! the mirrored version from the [`MarkerStore`], and when they differ moves
//! the artifact through [`ArtifactTransfer`] before updating the marker.
//! [`SyncOrchestrator`] sequences the steps and owns cleanup.
//!
//! # Example
//!
//! ```rust,no_run
//! use release_mirror::config::MirrorConfig;
//! use release_mirror::sync::{SyncOptions, SyncOutcome, qiniu_orchestrator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = MirrorConfig::load_with_optional(None).await?;
//! config.apply_process_env();
//! config.validate()?;
//!
//! let mut orchestrator = qiniu_orchestrator(config)?;
//! match orchestrator.run(&SyncOptions::default()).await? {
//!     SyncOutcome::UpToDate { version } => println!("already at {version}"),
//!     SyncOutcome::Synced { version, .. } => println!("mirrored {version}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod marker;
pub mod oracle;
pub mod orchestrator;
pub mod transfer;

pub use marker::{MarkerStore, temp_marker_path};
pub use oracle::{ReleaseApiOracle, VersionOracle, extract_version};
pub use orchestrator::{SyncOptions, SyncOrchestrator, SyncOutcome, SyncState, SyncStatus};
pub use transfer::ArtifactTransfer;

use crate::config::MirrorConfig;
use crate::core::MirrorError;
use crate::storage::QiniuBackend;

/// Orchestrator wired to the upstream release API and a Qiniu bucket.
pub fn qiniu_orchestrator(
    config: MirrorConfig,
) -> Result<SyncOrchestrator<ReleaseApiOracle, QiniuBackend>, MirrorError> {
    let client = config.http_client()?;
    let oracle = ReleaseApiOracle::new(client.clone(), &config.upstream);
    let backend =
        QiniuBackend::new(&config, client.clone()).map_err(|e| MirrorError::ConfigError {
            message: e.to_string(),
        })?;
    Ok(SyncOrchestrator::new(config, client, oracle, backend))
}
