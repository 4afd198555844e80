//! The `release-mirror.toml` configuration file.
//!
//! Settings are read from TOML, then environment variables override the
//! bucket credentials (the same variable names operators already export for
//! other bucket tooling). A missing default config file is not an error:
//! everything except the credentials has a default.
//!
//! ```toml
//! [upstream]
//! releases_url = "https://factorio.com/api/latest-releases"
//! channel = "stable"
//! build = "headless"
//!
//! [mirror]
//! bucket = "my-bucket"
//! domain = "cdn.example.com"
//!
//! [sync]
//! progress_sample_rate = 100
//! delete_before_upload = true
//! ```

use crate::constants::{
    ACCESS_KEY_ENV, BUCKET_ENV, CONFIG_PATH_ENV, DEFAULT_ARTIFACT_FILE_NAME, DEFAULT_ARTIFACT_KEY,
    DEFAULT_BUILD, DEFAULT_CHANNEL, DEFAULT_CONFIG_FILE, DEFAULT_DOWNLOAD_URL, DEFAULT_MARKER_KEY,
    DEFAULT_PROGRESS_SAMPLE_RATE, DEFAULT_PUBLIC_SCHEME, DEFAULT_RELEASES_URL, DEFAULT_RS_HOST,
    DEFAULT_UP_HOST, DEFAULT_UPLOAD_TOKEN_TTL_SECS, DOMAIN_ENV, SECRET_KEY_ENV,
    VERSION_PLACEHOLDER,
};
use crate::core::{MirrorError, Version};
use crate::utils::fs::sanitize_file_name;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Complete configuration for one mirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Where versions and artifacts come from.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// The object-storage bucket acting as the mirror.
    #[serde(default)]
    pub mirror: BucketConfig,

    /// Workflow tuning.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Upstream release source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// JSON document listing the latest version per channel and build.
    #[serde(default = "default_releases_url")]
    pub releases_url: String,

    /// Top-level key of the release document (e.g. `stable`, `experimental`).
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Key inside the channel naming the build to mirror (e.g. `headless`).
    #[serde(default = "default_build")]
    pub build: String,

    /// Artifact URL template; must contain `{version}`.
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// Local file name template for the downloaded artifact.
    #[serde(default = "default_artifact_file_name")]
    pub artifact_file_name: String,
}

/// Bucket credentials and endpoints.
///
/// `Debug` never prints the secret key.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketConfig {
    /// Access key; usually provided by `QINIU_ACCESS_KEY`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,

    /// Secret key; usually provided by `QINIU_SECRET_KEY`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    /// Bucket name.
    #[serde(default)]
    pub bucket: String,

    /// Public domain bound to the bucket, used for anonymous reads.
    #[serde(default)]
    pub domain: String,

    /// Scheme for anonymous reads (`http` or `https`).
    #[serde(default = "default_public_scheme")]
    pub public_scheme: String,

    /// Management API host (stat/delete).
    #[serde(default = "default_rs_host")]
    pub rs_host: String,

    /// Form upload host.
    #[serde(default = "default_up_host")]
    pub up_host: String,

    /// Lifetime of generated upload tokens.
    #[serde(default = "default_upload_token_ttl_secs")]
    pub upload_token_ttl_secs: u64,
}

/// Sync workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Mirror key of the version marker.
    #[serde(default = "default_marker_key")]
    pub marker_key: String,

    /// Mirror key of the latest artifact.
    #[serde(default = "default_artifact_key")]
    pub artifact_key: String,

    /// Directory holding the download and the temporary marker file.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Emit one progress notification per this many chunks.
    #[serde(default = "default_progress_sample_rate")]
    pub progress_sample_rate: u32,

    /// Delete an existing object before uploading over it.
    #[serde(default = "default_delete_before_upload")]
    pub delete_before_upload: bool,

    /// Overall deadline for one sync run, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Connect timeout for HTTP requests, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_releases_url() -> String {
    DEFAULT_RELEASES_URL.to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_build() -> String {
    DEFAULT_BUILD.to_string()
}

fn default_download_url() -> String {
    DEFAULT_DOWNLOAD_URL.to_string()
}

fn default_artifact_file_name() -> String {
    DEFAULT_ARTIFACT_FILE_NAME.to_string()
}

fn default_public_scheme() -> String {
    DEFAULT_PUBLIC_SCHEME.to_string()
}

fn default_rs_host() -> String {
    DEFAULT_RS_HOST.to_string()
}

fn default_up_host() -> String {
    DEFAULT_UP_HOST.to_string()
}

const fn default_upload_token_ttl_secs() -> u64 {
    DEFAULT_UPLOAD_TOKEN_TTL_SECS
}

fn default_marker_key() -> String {
    DEFAULT_MARKER_KEY.to_string()
}

fn default_artifact_key() -> String {
    DEFAULT_ARTIFACT_KEY.to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

const fn default_progress_sample_rate() -> u32 {
    DEFAULT_PROGRESS_SAMPLE_RATE
}

const fn default_delete_before_upload() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("release-mirror/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            releases_url: default_releases_url(),
            channel: default_channel(),
            build: default_build(),
            download_url: default_download_url(),
            artifact_file_name: default_artifact_file_name(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            domain: String::new(),
            public_scheme: default_public_scheme(),
            rs_host: default_rs_host(),
            up_host: default_up_host(),
            upload_token_ttl_secs: default_upload_token_ttl_secs(),
        }
    }
}

impl fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("public_scheme", &self.public_scheme)
            .field("rs_host", &self.rs_host)
            .field("up_host", &self.up_host)
            .field("upload_token_ttl_secs", &self.upload_token_ttl_secs)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            marker_key: default_marker_key(),
            artifact_key: default_artifact_key(),
            work_dir: default_work_dir(),
            progress_sample_rate: default_progress_sample_rate(),
            delete_before_upload: default_delete_before_upload(),
            deadline_secs: None,
            http_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "********"
    }
}

/// Starter configuration written by `release-mirror config init`.
pub const EXAMPLE_CONFIG: &str = r#"# release-mirror configuration
#
# Credentials are best kept out of this file: export QINIU_ACCESS_KEY,
# QINIU_SECRET_KEY, QINIU_BUCKET and QINIU_DOMAIN (or put them in .env).

[upstream]
releases_url = "https://factorio.com/api/latest-releases"
channel = "stable"
build = "headless"
download_url = "https://www.factorio.com/get-download/{version}/headless/linux64"
artifact_file_name = "factorio-{version}.tar.xz"

[mirror]
bucket = ""
domain = ""
public_scheme = "http"
rs_host = "https://rs.qiniu.com"
up_host = "https://up.qiniup.com"

[sync]
marker_key = "factorio/current-version.txt"
artifact_key = "factorio/latest.tar.xz"
work_dir = "."
progress_sample_rate = 100
delete_before_upload = true
# deadline_secs = 3600
"#;

impl MirrorConfig {
    /// Load configuration from an optional explicit path.
    ///
    /// - An explicit path must exist.
    /// - Without one, [`default_path`](Self::default_path) is used and a
    ///   missing file yields the default configuration.
    ///
    /// Environment overrides are not applied here; see
    /// [`apply_env_overrides`](Self::apply_env_overrides).
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(MirrorError::ConfigError {
                        message: format!("config file {} does not exist", path.display()),
                    }
                    .into());
                }
                Self::load_from(&path).await
            }
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path).await
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific TOML file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .map_err(MirrorError::from)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save configuration as pretty TOML.
    ///
    /// The file may hold credentials, so on Unix it is restricted to the owner.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Write the commented starter configuration to `path`.
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub async fn init_example(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(MirrorError::ConfigError {
                message: format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ),
            }
            .into());
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        fs::write(path, EXAMPLE_CONFIG)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Default config file location.
    ///
    /// `RELEASE_MIRROR_CONFIG` wins; otherwise `release-mirror.toml` in the
    /// current directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Override bucket settings from environment-style lookups.
    ///
    /// Takes the lookup as a closure so tests never touch the process
    /// environment. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ACCESS_KEY_ENV) {
            self.mirror.access_key = v;
        }
        if let Some(v) = get(SECRET_KEY_ENV) {
            self.mirror.secret_key = v;
        }
        if let Some(v) = get(BUCKET_ENV) {
            self.mirror.bucket = v;
        }
        if let Some(v) = get(DOMAIN_ENV) {
            self.mirror.domain = v;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env_overrides(|name| std::env::var(name).ok());
    }

    /// Check that a sync can be attempted with these settings.
    pub fn validate(&self) -> Result<(), MirrorError> {
        let required = [
            ("mirror.access_key", ACCESS_KEY_ENV, &self.mirror.access_key),
            ("mirror.secret_key", SECRET_KEY_ENV, &self.mirror.secret_key),
            ("mirror.bucket", BUCKET_ENV, &self.mirror.bucket),
            ("mirror.domain", DOMAIN_ENV, &self.mirror.domain),
        ];
        for (name, env_var, value) in required {
            if value.trim().is_empty() {
                return Err(MirrorError::MissingCredential {
                    name: name.to_string(),
                    env_var: env_var.to_string(),
                });
            }
        }

        if self.sync.progress_sample_rate == 0 {
            return Err(MirrorError::ConfigError {
                message: "sync.progress_sample_rate must be at least 1".to_string(),
            });
        }

        if !self.upstream.download_url.contains(VERSION_PLACEHOLDER) {
            return Err(MirrorError::ConfigError {
                message: format!(
                    "upstream.download_url must contain {VERSION_PLACEHOLDER}: {}",
                    self.upstream.download_url
                ),
            });
        }

        if self.sync.marker_key.is_empty() || self.sync.artifact_key.is_empty() {
            return Err(MirrorError::ConfigError {
                message: "sync.marker_key and sync.artifact_key must not be empty".to_string(),
            });
        }

        if self.sync.marker_key == self.sync.artifact_key {
            return Err(MirrorError::ConfigError {
                message: "sync.marker_key and sync.artifact_key must differ".to_string(),
            });
        }

        Ok(())
    }

    /// Artifact URL for a version.
    #[must_use]
    pub fn download_url(&self, version: &Version) -> String {
        self.upstream.download_url.replace(VERSION_PLACEHOLDER, version.as_str())
    }

    /// Local path the artifact for `version` is downloaded to.
    ///
    /// The version comes from the network, so it is sanitized before it
    /// becomes part of a file name.
    #[must_use]
    pub fn artifact_path(&self, version: &Version) -> PathBuf {
        let name = self
            .upstream
            .artifact_file_name
            .replace(VERSION_PLACEHOLDER, &sanitize_file_name(version.as_str()));
        self.sync.work_dir.join(name)
    }

    /// Overall sync deadline, if configured.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.sync.deadline_secs.map(Duration::from_secs)
    }

    /// Build the HTTP client shared by the oracle, transfers and mirror backend.
    pub fn http_client(&self) -> Result<reqwest::Client, MirrorError> {
        let mut builder = reqwest::Client::builder().user_agent(&self.sync.user_agent);
        if let Some(secs) = self.sync.http_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        builder.build().map_err(|e| MirrorError::ConfigError {
            message: format!("failed to build HTTP client: {e}"),
        })
    }

    /// Copy of this configuration safe to print.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.mirror.secret_key = redact(&copy.mirror.secret_key).to_string();
        copy
    }
}
