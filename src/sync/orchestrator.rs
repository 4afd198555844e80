//! One sync run from version check to cleanup.
//!
//! ```text
//! Idle -> CheckingVersions -> UpToDate
//! Idle -> CheckingVersions -> Downloading -> Uploading -> UpdatingMarker -> Cleanup
//! any non-terminal state -> Failed
//! ```
//!
//! Once `Downloading` is entered the local artifact and the staged marker
//! are removed on every path: success, any stage failing, or the deadline
//! expiring. Failures that happen after `Downloading` record `Cleanup`
//! before `Failed`.

use super::marker::{MarkerStore, temp_marker_path};
use super::oracle::VersionOracle;
use super::transfer::ArtifactTransfer;
use crate::config::MirrorConfig;
use crate::core::{MirrorError, Version};
use crate::storage::MirrorBackend;
use crate::utils::fs::ScopedFile;
use crate::utils::progress::{NoProgress, ProgressObserver};
use reqwest::Client;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Workflow position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    CheckingVersions,
    UpToDate,
    Downloading,
    Uploading,
    UpdatingMarker,
    Cleanup,
    Failed,
}

impl SyncState {
    /// Whether a run ends in this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::UpToDate | Self::Cleanup | Self::Failed)
    }

    /// Whether the workflow may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SyncState::*;
        match (self, next) {
            (Idle, CheckingVersions)
            | (CheckingVersions, UpToDate | Downloading)
            | (Downloading, Uploading)
            | (Uploading, UpdatingMarker)
            | (Downloading | Uploading | UpdatingMarker, Cleanup) => true,
            // Cleanup after a failure still ends in Failed
            (Cleanup, Failed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CheckingVersions => "checking versions",
            Self::UpToDate => "up to date",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::UpdatingMarker => "updating marker",
            Self::Cleanup => "cleanup",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Mirror even when the marker already matches upstream.
    pub force: bool,
    /// Abort the run after this long. Falls back to `sync.deadline_secs`.
    pub deadline: Option<Duration>,
}

/// Successful end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The mirror already had `version`.
    UpToDate { version: Version },
    /// The mirror moved from `previous` to `version`.
    Synced { previous: Version, version: Version },
}

/// Versions on both sides, without transferring anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub upstream: Version,
    pub mirrored: Version,
}

impl SyncStatus {
    /// Whether a sync would transfer anything.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.upstream != self.mirrored
    }
}

/// Drives the oracle, marker store and transfers through one run.
///
/// Concurrent runs against the same mirror keys race on the marker; callers
/// must schedule one run at a time.
pub struct SyncOrchestrator<O, B> {
    config: MirrorConfig,
    client: Client,
    oracle: O,
    backend: B,
    progress: Arc<dyn ProgressObserver>,
    history: Vec<SyncState>,
    target: Option<Version>,
}

impl<O: VersionOracle, B: MirrorBackend> SyncOrchestrator<O, B> {
    pub fn new(config: MirrorConfig, client: Client, oracle: O, backend: B) -> Self {
        Self {
            config,
            client,
            oracle,
            backend,
            progress: Arc::new(NoProgress),
            history: vec![SyncState::Idle],
            target: None,
        }
    }

    /// Report transfer progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.history.last().copied().unwrap_or(SyncState::Idle)
    }

    /// Every state visited by the last run, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Compare upstream with the mirror without changing anything.
    pub async fn status(&self) -> Result<SyncStatus, MirrorError> {
        let upstream = self.oracle.latest_version().await?;
        let mirrored = self.markers().read_marker(&self.config.sync.marker_key).await;
        Ok(SyncStatus {
            upstream,
            mirrored,
        })
    }

    /// Run one sync attempt.
    pub async fn run(&mut self, options: &SyncOptions) -> Result<SyncOutcome, MirrorError> {
        self.history = vec![SyncState::Idle];
        self.target = None;

        let deadline = options.deadline.or_else(|| self.config.deadline());
        let result = match deadline {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.execute(options)).await;
                match timed {
                    Ok(result) => result,
                    Err(_) => Err(self.deadline_error(limit)),
                }
            }
            None => self.execute(options).await,
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let failed_in = self.failed_stage();
                if self.history.contains(&SyncState::Downloading)
                    && self.state() != SyncState::Cleanup
                {
                    // Guards dropped with the aborted future already removed the files
                    self.transition(SyncState::Cleanup);
                }
                self.transition(SyncState::Failed);
                error!("Sync failed while {failed_in}: {e}");
                Err(e)
            }
        }
    }

    async fn execute(&mut self, options: &SyncOptions) -> Result<SyncOutcome, MirrorError> {
        self.transition(SyncState::CheckingVersions);
        let latest = self.oracle.latest_version().await?;
        let marker_key = self.config.sync.marker_key.clone();
        let current = self.markers().read_marker(&marker_key).await;
        info!("Upstream version: {latest}, mirrored version: {current}");

        if latest == current {
            if !options.force {
                self.transition(SyncState::UpToDate);
                info!("Mirror is up to date at {latest}");
                return Ok(SyncOutcome::UpToDate {
                    version: latest,
                });
            }
            info!("Mirror is up to date at {latest}, re-mirroring (forced)");
        }

        self.target = Some(latest.clone());
        let artifact = ScopedFile::new(self.config.artifact_path(&latest));
        let staged_marker =
            ScopedFile::new(temp_marker_path(&self.config.sync.work_dir, &marker_key));

        let published = self.publish(&latest, artifact.path()).await;

        self.transition(SyncState::Cleanup);
        for file in [artifact, staged_marker] {
            let path = file.path().to_path_buf();
            if let Err(e) = file.remove().await {
                warn!("Failed to remove {}: {e}", path.display());
            }
        }

        published?;
        info!("Mirrored {latest} (previously {current})");
        Ok(SyncOutcome::Synced {
            previous: current,
            version: latest,
        })
    }

    async fn publish(&mut self, version: &Version, artifact: &Path) -> Result<(), MirrorError> {
        self.transition(SyncState::Downloading);
        let url = self.config.download_url(version);
        self.transfer().download(&url, artifact).await?;

        self.transition(SyncState::Uploading);
        let artifact_key = self.config.sync.artifact_key.clone();
        self.transfer().upload(artifact, &artifact_key).await?;

        self.transition(SyncState::UpdatingMarker);
        let marker_key = self.config.sync.marker_key.clone();
        self.markers().write_marker(&marker_key, version).await
    }

    fn markers(&self) -> MarkerStore<'_, B> {
        MarkerStore::new(
            &self.backend,
            &self.config.sync.work_dir,
            self.config.sync.delete_before_upload,
        )
    }

    fn transfer(&self) -> ArtifactTransfer<'_, B> {
        ArtifactTransfer::new(
            &self.client,
            &self.backend,
            self.progress.clone(),
            self.config.sync.progress_sample_rate,
            self.config.sync.delete_before_upload,
        )
    }

    fn transition(&mut self, next: SyncState) {
        let current = self.state();
        debug_assert!(current.can_transition_to(next), "invalid transition {current} -> {next}");
        debug!("Sync state: {current} -> {next}");
        self.history.push(next);
    }

    /// Last stage entered before cleanup.
    fn failed_stage(&self) -> SyncState {
        self.history
            .iter()
            .rev()
            .copied()
            .find(|s| *s != SyncState::Cleanup)
            .unwrap_or(SyncState::Idle)
    }

    /// Error for a run cut off by its deadline, named after the stage that was running.
    fn deadline_error(&self, limit: Duration) -> MirrorError {
        let reason = format!("deadline of {}s exceeded", limit.as_secs_f64());
        match self.state() {
            SyncState::Downloading => MirrorError::DownloadFailed {
                url: self
                    .target
                    .as_ref()
                    .map(|v| self.config.download_url(v))
                    .unwrap_or_default(),
                reason,
            },
            SyncState::Uploading => MirrorError::UploadFailed {
                key: self.config.sync.artifact_key.clone(),
                reason,
            },
            SyncState::UpdatingMarker => MirrorError::MarkerWriteError {
                key: self.config.sync.marker_key.clone(),
                reason,
            },
            SyncState::Cleanup => MirrorError::Other {
                message: format!("cleanup interrupted: {reason}"),
            },
            _ => MirrorError::UpstreamUnavailable {
                url: self.oracle.source().to_string(),
                reason,
            },
        }
    }
}
