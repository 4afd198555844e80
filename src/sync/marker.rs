//! The version marker: a small mirror object holding the last synced version.

use crate::core::{MirrorError, Version};
use crate::storage::MirrorBackend;
use crate::utils::fs::{ScopedFile, create_file, sanitize_file_name};
use crate::utils::progress::NoProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Local path used to stage a marker write for `key`.
pub fn temp_marker_path(work_dir: &Path, key: &str) -> PathBuf {
    work_dir.join(format!("{}.tmp", sanitize_file_name(key)))
}

/// Reads and writes version markers through a [`MirrorBackend`].
pub struct MarkerStore<'a, B> {
    backend: &'a B,
    work_dir: &'a Path,
    delete_before_upload: bool,
}

impl<'a, B: MirrorBackend> MarkerStore<'a, B> {
    pub fn new(backend: &'a B, work_dir: &'a Path, delete_before_upload: bool) -> Self {
        Self {
            backend,
            work_dir,
            delete_before_upload,
        }
    }

    /// Current marker value.
    ///
    /// Never fails: a missing marker is the normal first-run state and an
    /// unreadable one is logged. Both yield [`Version::empty`], which forces a
    /// sync.
    pub async fn read_marker(&self, key: &str) -> Version {
        match self.try_read_marker(key).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                info!("No version marker at {key}, treating mirror as empty");
                Version::empty()
            }
            Err(e) => {
                warn!("{e}; treating mirror as empty");
                Version::empty()
            }
        }
    }

    /// Marker value, `None` when absent, or [`MirrorError::MarkerReadFailure`].
    pub async fn try_read_marker(&self, key: &str) -> Result<Option<Version>, MirrorError> {
        let failure = |reason: String| MirrorError::MarkerReadFailure {
            key: key.to_string(),
            reason,
        };

        let Some(info) = self.backend.stat(key).await.map_err(|e| failure(e.to_string()))? else {
            return Ok(None);
        };
        debug!("Marker {key} exists ({} bytes)", info.size);

        let content = self.backend.read_public(key).await.map_err(|e| failure(e.to_string()))?;
        Ok(Some(Version::from(content.trim())))
    }

    /// Replace the marker with `version`.
    ///
    /// The value is staged in a local file and uploaded as one object, so a
    /// failed write leaves the previous marker untouched. The old marker is
    /// only deleted first when the backend cannot overwrite in place, since a
    /// delete followed by a failed upload would lose it.
    pub async fn write_marker(&self, key: &str, version: &Version) -> Result<(), MirrorError> {
        let failure = |reason: String| MirrorError::MarkerWriteError {
            key: key.to_string(),
            reason,
        };

        let staged = ScopedFile::new(temp_marker_path(self.work_dir, key));
        let stage_error = |e: std::io::Error| {
            failure(format!("cannot stage marker at {}: {e}", staged.path().display()))
        };
        let mut file = create_file(staged.path()).map_err(stage_error)?;
        file.write_all(version.as_bytes()).await.map_err(stage_error)?;
        file.flush().await.map_err(stage_error)?;
        drop(file);

        let delete_first = self.delete_before_upload && !self.backend.overwrites();
        self.backend
            .replace_object(key, staged.path(), delete_first, Arc::new(NoProgress))
            .await
            .map_err(|e| failure(e.to_string()))?;

        if let Err(e) = staged.remove().await {
            warn!("Failed to remove staged marker: {e}");
        }
        info!("Version marker {key} set to {version}");
        Ok(())
    }
}
