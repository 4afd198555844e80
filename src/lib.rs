//! release-mirror - keep an object-storage mirror of upstream release builds
//!
//! The crate checks an upstream release API for the latest version of a build
//! (by default the Factorio headless server), compares it with a version
//! marker stored in a bucket, and when they differ downloads the build,
//! uploads it and then updates the marker. Local files are removed on every
//! exit path.
//!
//! # Architecture
//!
//! ```text
//! cli ──> config ──> sync::SyncOrchestrator
//!                      ├── sync::VersionOracle     (upstream release API)
//!                      ├── sync::MarkerStore       (version marker in the bucket)
//!                      └── sync::ArtifactTransfer  (download, upload)
//!                             └── storage::MirrorBackend (Qiniu Kodo)
//! ```
//!
//! - [`core`] - Error types and the [`core::Version`] token
//! - [`config`] - `release-mirror.toml` plus `QINIU_*` environment overrides
//! - [`storage`] - Bucket operations and Qiniu request signing
//! - [`sync`] - The workflow and its state machine
//! - [`utils`] - Progress reporting and scoped local files
//! - [`cli`] - The `release-mirror` command
//!
//! # Guarantees
//!
//! - The marker is only written after the artifact upload succeeded.
//! - A missing or unreadable marker counts as "nothing mirrored yet".
//! - Versions are compared as exact strings.
//! - Two concurrent runs against the same bucket keys are not supported;
//!   schedule runs one at a time.
//!
//! # Quick Start
//!
//! ```bash
//! export QINIU_ACCESS_KEY=... QINIU_SECRET_KEY=... QINIU_BUCKET=... QINIU_DOMAIN=...
//! release-mirror status
//! release-mirror sync
//! ```

// Core functionality modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

// Mirror workflow
pub mod storage;
pub mod sync;

// Supporting modules
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
