//! Fixed-answer version oracle.

use crate::core::{MirrorError, Version};
use crate::sync::VersionOracle;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Oracle that always gives the same answer and counts how often it was asked.
#[derive(Debug)]
pub struct StaticOracle {
    answer: Result<Version, String>,
    calls: AtomicUsize,
}

impl StaticOracle {
    /// Oracle reporting `version`.
    pub fn new(version: impl Into<Version>) -> Self {
        Self {
            answer: Ok(version.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Oracle failing with `UpstreamUnavailable`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            answer: Err(reason.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VersionOracle for StaticOracle {
    async fn latest_version(&self) -> Result<Version, MirrorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(|reason| MirrorError::UpstreamUnavailable {
            url: self.source().to_string(),
            reason,
        })
    }

    fn source(&self) -> &str {
        "static://oracle"
    }
}
