//! Integration test suite for release-mirror
//!
//! End-to-end tests that drive the real HTTP clients against a local test
//! server standing in for the release API, the artifact host and the Qiniu
//! endpoints, plus command-line tests of the built binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: The `release-mirror` binary (help, config commands, exit codes)
//! - **qiniu_backend**: Bucket operations and request signing on the wire
//! - **release_oracle**: Upstream version lookup
//! - **sync_workflow**: Full runs through the orchestrator

mod cli;
mod common;
mod qiniu_backend;
mod release_oracle;
mod sync_workflow;
