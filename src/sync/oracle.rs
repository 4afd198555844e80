//! Authoritative upstream version lookup.

use crate::config::UpstreamConfig;
use crate::core::{MirrorError, Version};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// Source of the latest upstream version.
pub trait VersionOracle: Send + Sync {
    /// The latest published version.
    ///
    /// Fails with [`MirrorError::UpstreamUnavailable`] on network errors,
    /// malformed responses, and missing or empty versions.
    fn latest_version(&self) -> impl Future<Output = Result<Version, MirrorError>> + Send;

    /// Where versions come from, for messages.
    fn source(&self) -> &str;
}

/// Reads `{channel: {build: version}}` from a JSON release document such as
/// `https://factorio.com/api/latest-releases`.
#[derive(Debug, Clone)]
pub struct ReleaseApiOracle {
    client: Client,
    url: String,
    channel: String,
    build: String,
}

impl ReleaseApiOracle {
    pub fn new(client: Client, upstream: &UpstreamConfig) -> Self {
        Self {
            client,
            url: upstream.releases_url.clone(),
            channel: upstream.channel.clone(),
            build: upstream.build.clone(),
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> MirrorError {
        MirrorError::UpstreamUnavailable {
            url: self.url.clone(),
            reason: reason.into(),
        }
    }
}

/// Pull `document[channel][build]` out of a release document.
pub fn extract_version(document: &Value, channel: &str, build: &str) -> Result<Version, String> {
    let releases = document
        .get(channel)
        .ok_or_else(|| format!("release document has no '{channel}' channel"))?;
    let raw = releases
        .get(build)
        .ok_or_else(|| format!("channel '{channel}' has no '{build}' build"))?
        .as_str()
        .ok_or_else(|| format!("'{channel}.{build}' is not a string"))?;

    let version = raw.trim();
    if version.is_empty() {
        return Err(format!("'{channel}.{build}' is empty"));
    }
    Ok(Version::from(version))
}

impl VersionOracle for ReleaseApiOracle {
    async fn latest_version(&self) -> Result<Version, MirrorError> {
        debug!("Fetching release document from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {status}")));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("invalid release document: {e}")))?;

        let version = extract_version(&document, &self.channel, &self.build)
            .map_err(|reason| self.unavailable(reason))?;
        debug!("Latest {} {} version: {version}", self.channel, self.build);
        Ok(version)
    }

    fn source(&self) -> &str {
        &self.url
    }
}
