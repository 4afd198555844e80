//! In-memory mirror backend.

use crate::constants::UPLOAD_CHUNK_SIZE;
use crate::storage::{MirrorBackend, ObjectInfo, StorageError};
use crate::utils::progress::{ProgressObserver, TransferSession};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Backend operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Stat,
    Delete,
    Put,
    ReadPublic,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Stat(String),
    Delete(String),
    Put(String),
    ReadPublic(String),
}

impl BackendCall {
    /// Whether this call modifies the bucket.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Delete(_) | Self::Put(_))
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    calls: Vec<BackendCall>,
    failures: HashSet<(Operation, Option<String>)>,
}

/// A bucket held in memory.
///
/// Failures can be injected per operation, either for one key or for all
/// keys. With [`create_only`](Self::create_only), uploads over an existing
/// object are rejected the way an insert-only token would be, which makes
/// delete-before-upload observable.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    create_only: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object.
    #[must_use]
    pub fn with_object(self, key: &str, content: impl AsRef<[u8]>) -> Self {
        self.insert(key, content);
        self
    }

    /// Reject uploads over existing objects.
    #[must_use]
    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    /// Make `operation` fail for `key`, or for every key when `key` is `None`.
    #[must_use]
    pub fn failing(self, operation: Operation, key: Option<&str>) -> Self {
        self.fail(operation, key);
        self
    }

    pub fn insert(&self, key: &str, content: impl AsRef<[u8]>) {
        self.with_state(|s| {
            s.objects.insert(key.to_string(), content.as_ref().to_vec());
        });
    }

    pub fn fail(&self, operation: Operation, key: Option<&str>) {
        self.with_state(|s| {
            s.failures.insert((operation, key.map(str::to_string)));
        });
    }

    /// Stored bytes for `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.with_state(|s| s.objects.get(key).cloned())
    }

    /// Stored content for `key` as UTF-8.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.with_state(|s| s.calls.clone())
    }

    /// Keys that were uploaded, in order.
    pub fn puts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Put(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Number of calls that modified the bucket.
    pub fn write_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_write()).count()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Record `call` and return the injected failure for it, if any.
    fn enter(
        &self,
        operation: Operation,
        call: BackendCall,
        key: &str,
    ) -> Result<(), StorageError> {
        self.with_state(|s| {
            s.calls.push(call);
            let fails = s.failures.contains(&(operation, Some(key.to_string())))
                || s.failures.contains(&(operation, None));
            if fails {
                Err(StorageError::Status {
                    operation: format!("{operation:?}").to_lowercase(),
                    status: 503,
                    body: "injected failure".to_string(),
                })
            } else {
                Ok(())
            }
        })
    }
}

impl MirrorBackend for MemoryBackend {
    async fn stat(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        self.enter(Operation::Stat, BackendCall::Stat(key.to_string()), key)?;
        Ok(self.with_state(|s| {
            s.objects.get(key).map(|content| ObjectInfo {
                size: content.len() as u64,
                hash: String::new(),
                mime_type: None,
                put_time: None,
            })
        }))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.enter(Operation::Delete, BackendCall::Delete(key.to_string()), key)?;
        Ok(self.with_state(|s| s.objects.remove(key).is_some()))
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        progress: Arc<dyn ProgressObserver>,
    ) -> Result<(), StorageError> {
        self.enter(Operation::Put, BackendCall::Put(key.to_string()), key)?;

        let content = tokio::fs::read(path).await.map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let total = Some(content.len() as u64);
        let mut session = TransferSession::new(progress, "Uploading", total, 1);
        for chunk in content.chunks(UPLOAD_CHUNK_SIZE) {
            session.record(chunk.len());
        }
        session.finish();

        let create_only = self.create_only;
        self.with_state(|s| {
            if create_only && s.objects.contains_key(key) {
                return Err(StorageError::Status {
                    operation: "upload".to_string(),
                    status: 614,
                    body: "file exists".to_string(),
                });
            }
            s.objects.insert(key.to_string(), content);
            Ok(())
        })
    }

    fn overwrites(&self) -> bool {
        !self.create_only
    }

    async fn read_public(&self, key: &str) -> Result<String, StorageError> {
        self.enter(Operation::ReadPublic, BackendCall::ReadPublic(key.to_string()), key)?;
        self.with_state(|s| s.objects.get(key).cloned())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .ok_or_else(|| StorageError::Status {
                operation: "public read".to_string(),
                status: 404,
                body: "not found".to_string(),
            })
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://bucket/{key}")
    }
}
