//! Configuration management for release-mirror
//!
//! A single TOML file (`release-mirror.toml`) describes one mirror:
//!
//! 1. **`[upstream]`** - where the latest version is published and how the
//!    artifact URL is derived from it
//! 2. **`[mirror]`** - bucket, public domain and API hosts
//! 3. **`[sync]`** - object keys, work directory and workflow tuning
//!
//! # Resolution order
//!
//! 1. `--config <path>` on the command line
//! 2. `RELEASE_MIRROR_CONFIG`
//! 3. `./release-mirror.toml` (optional)
//!
//! Bucket credentials are then overridden from the environment
//! (`QINIU_ACCESS_KEY`, `QINIU_SECRET_KEY`, `QINIU_BUCKET`, `QINIU_DOMAIN`),
//! which the CLI first populates from a `.env` file when present.
//!
//! The loaded value is passed explicitly to every component; there is no
//! process-wide client or configuration singleton.

mod mirror;

pub use mirror::{BucketConfig, EXAMPLE_CONFIG, MirrorConfig, SyncConfig, UpstreamConfig};
