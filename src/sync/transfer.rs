//! Streaming artifact transfers between upstream, local disk and the mirror.

use crate::core::MirrorError;
use crate::storage::MirrorBackend;
use crate::utils::fs::create_file;
use crate::utils::progress::{ProgressObserver, TransferSession};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Moves the artifact: upstream to disk, then disk to mirror.
///
/// Neither direction buffers the whole artifact in memory. Cleanup of the
/// local file is left to the caller, including after a failed download.
pub struct ArtifactTransfer<'a, B> {
    client: &'a Client,
    backend: &'a B,
    progress: Arc<dyn ProgressObserver>,
    sample_rate: u32,
    delete_before_upload: bool,
}

impl<'a, B: MirrorBackend> ArtifactTransfer<'a, B> {
    pub fn new(
        client: &'a Client,
        backend: &'a B,
        progress: Arc<dyn ProgressObserver>,
        sample_rate: u32,
        delete_before_upload: bool,
    ) -> Self {
        Self {
            client,
            backend,
            progress,
            sample_rate,
            delete_before_upload,
        }
    }

    /// Stream `url` into `dest` and return the written path.
    ///
    /// The response's `Content-Length` drives progress; without it progress is
    /// a plain byte count.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, MirrorError> {
        let failure = |reason: String| MirrorError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        info!("Downloading {url}");
        let mut response =
            self.client.get(url).send().await.map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("HTTP {status}")));
        }

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failure(format!("cannot create {}: {e}", parent.display())))?;
        }
        let mut file = create_file(dest)
            .map_err(|e| failure(format!("cannot create {}: {e}", dest.display())))?;

        let total = response.content_length();
        let mut session =
            TransferSession::new(self.progress.clone(), "Downloading", total, self.sample_rate);

        while let Some(chunk) = response.chunk().await.map_err(|e| failure(e.to_string()))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| failure(format!("cannot write {}: {e}", dest.display())))?;
            session.record(chunk.len());
        }
        file.flush().await.map_err(|e| failure(format!("cannot flush {}: {e}", dest.display())))?;

        let snapshot = session.finish();
        if let Some(expected) = total
            && expected > 0
            && snapshot.transferred < expected
        {
            return Err(failure(format!(
                "connection closed after {} of {expected} bytes",
                snapshot.transferred
            )));
        }

        info!("Downloaded {} bytes to {}", snapshot.transferred, dest.display());
        Ok(dest.to_path_buf())
    }

    /// Publish the local file at `path` as `key`.
    pub async fn upload(&self, path: &Path, key: &str) -> Result<(), MirrorError> {
        debug!("Publishing {} as {key}", path.display());
        self.backend
            .replace_object(key, path, self.delete_before_upload, self.progress.clone())
            .await
            .map_err(|e| MirrorError::UploadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}
