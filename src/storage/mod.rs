//! Object storage acting as the mirror.
//!
//! The sync workflow only needs a handful of bucket operations, captured by
//! [`MirrorBackend`]. [`QiniuBackend`] talks to Qiniu Kodo over HTTPS; tests
//! use the in-memory backend from `test_utils`.
//!
//! Reads of the version marker go through the bucket's public domain, the
//! same way downstream consumers of the mirror read it.

pub mod auth;
pub mod qiniu;

pub use qiniu::QiniuBackend;

use crate::utils::progress::ProgressObserver;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures reported by a mirror backend.
///
/// The sync pipeline maps these onto stage-specific
/// [`MirrorError`](crate::core::MirrorError) variants.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with an unexpected status.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Reading the local file to upload failed.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials are unusable.
    #[error("invalid credentials: {0}")]
    Credentials(String),
}

/// Metadata returned by [`MirrorBackend::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// Size in bytes.
    #[serde(rename = "fsize", default)]
    pub size: u64,
    /// Content hash as reported by the service.
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Upload time in 100ns units since the epoch.
    #[serde(default)]
    pub put_time: Option<i64>,
}

/// Bucket operations used by the sync workflow.
pub trait MirrorBackend: Send + Sync {
    /// Metadata for `key`, or `None` when no such object exists.
    fn stat(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<ObjectInfo>, StorageError>> + Send;

    /// Delete `key`. Returns `false` when there was nothing to delete.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Upload the file at `path` as `key`, creating or overwriting it.
    ///
    /// The write is all-or-nothing: `key` keeps its previous content unless
    /// the whole file was accepted.
    fn put_file(
        &self,
        key: &str,
        path: &Path,
        progress: Arc<dyn ProgressObserver>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Fetch the content of `key` through the public domain.
    fn read_public(&self, key: &str) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Public URL under which `key` is served.
    fn public_url(&self, key: &str) -> String;

    /// Whether `put_file` replaces an existing object in place.
    ///
    /// Backends that reject uploads over existing keys return `false`; callers
    /// must then delete first.
    fn overwrites(&self) -> bool {
        true
    }

    /// Upload `path` as `key`, optionally deleting the old object first.
    ///
    /// Deletion is best effort: a failed or unnecessary delete is logged and
    /// the upload proceeds.
    fn replace_object(
        &self,
        key: &str,
        path: &Path,
        delete_first: bool,
        progress: Arc<dyn ProgressObserver>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        async move {
            if delete_first {
                match self.delete(key).await {
                    Ok(true) => debug!("Deleted existing object {key}"),
                    Ok(false) => debug!("No existing object {key} to delete"),
                    Err(e) => warn!("Could not delete {key} before upload: {e}"),
                }
            }
            self.put_file(key, path, progress).await
        }
    }
}
