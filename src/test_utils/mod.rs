//! Test utilities for release-mirror
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`MemoryBackend`] - an in-memory mirror with call recording and failure injection
//! - [`StaticOracle`] - a version oracle returning a fixed answer
//! - [`TestServer`] - a tiny local HTTP server for upstream and bucket endpoints
//! - [`RecordingProgress`] - a progress observer that keeps every snapshot
//!
//! # Example
//!
//! ```rust,no_run
//! use release_mirror::test_utils::{MemoryBackend, StaticOracle};
//!
//! let backend = MemoryBackend::new().with_object("factorio/current-version.txt", "1.1.100");
//! let oracle = StaticOracle::new("1.1.101");
//! ```

pub mod memory;
pub mod oracle;
pub mod server;

pub use memory::{BackendCall, MemoryBackend, Operation};
pub use oracle::StaticOracle;
pub use server::{Route, TestServer};

use crate::utils::progress::{ProgressObserver, ProgressSnapshot};
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, tests stay
/// silent.
///
/// ```bash
/// RUST_LOG=release_mirror=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Observer that records every notification.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    starts: Mutex<Vec<(String, Option<u64>)>>,
    updates: Mutex<Vec<ProgressSnapshot>>,
    finishes: Mutex<Vec<ProgressSnapshot>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(label, total)` for each started transfer.
    pub fn starts(&self) -> Vec<(String, Option<u64>)> {
        self.starts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Sampled updates in arrival order.
    pub fn updates(&self) -> Vec<ProgressSnapshot> {
        self.updates.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Final snapshots in arrival order.
    pub fn finishes(&self) -> Vec<ProgressSnapshot> {
        self.finishes.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_start(&self, label: &str, total: Option<u64>) {
        if let Ok(mut starts) = self.starts.lock() {
            starts.push((label.to_string(), total));
        }
    }

    fn on_progress(&self, snapshot: ProgressSnapshot) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(snapshot);
        }
    }

    fn on_finish(&self, snapshot: ProgressSnapshot) {
        if let Ok(mut finishes) = self.finishes.lock() {
            finishes.push(snapshot);
        }
    }
}
