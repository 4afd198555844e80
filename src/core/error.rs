//! Error handling for release-mirror
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so every pipeline stage reports exactly which
//!    step of a sync failed
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`MirrorError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper adding details and suggestions for display
//!
//! # Error Categories
//!
//! - **Sync pipeline**: [`MirrorError::UpstreamUnavailable`], [`MirrorError::DownloadFailed`],
//!   [`MirrorError::UploadFailed`], [`MirrorError::MarkerWriteError`]
//! - **Marker reads**: [`MirrorError::MarkerReadFailure`] is produced internally and always
//!   downgraded to an empty version; it never reaches the caller of a sync
//! - **Configuration**: [`MirrorError::ConfigError`], [`MirrorError::MissingCredential`],
//!   [`MirrorError::TomlError`]
//! - **Local files**: [`MirrorError::IoError`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use release_mirror::core::{MirrorError, user_friendly_error};
//!
//! let error = MirrorError::UploadFailed {
//!     key: "factorio/latest.tar.xz".to_string(),
//!     reason: "HTTP 401".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for release-mirror operations
///
/// Each pipeline stage maps its failures to exactly one variant so the
/// orchestrator can report which step broke without inspecting messages.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// The authoritative version source could not be reached or answered with
    /// something that does not contain a usable version.
    #[error("Upstream version source unavailable at {url}: {reason}")]
    UpstreamUnavailable {
        /// URL of the version document
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Streaming the artifact from upstream to local disk failed.
    #[error("Download failed from {url}: {reason}")]
    DownloadFailed {
        /// Artifact URL
        url: String,
        /// What went wrong
        reason: String,
    },

    /// The mirror did not accept the artifact.
    #[error("Upload of '{key}' failed: {reason}")]
    UploadFailed {
        /// Destination key in the mirror
        key: String,
        /// What went wrong
        reason: String,
    },

    /// The mirror did not accept the new version marker.
    #[error("Writing version marker '{key}' failed: {reason}")]
    MarkerWriteError {
        /// Marker key in the mirror
        key: String,
        /// What went wrong
        reason: String,
    },

    /// The current marker could not be read.
    ///
    /// Only used internally by the marker store, which normalizes it to the
    /// empty version.
    #[error("Reading version marker '{key}' failed: {reason}")]
    MarkerReadFailure {
        /// Marker key in the mirror
        key: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the invalid setting
        message: String,
    },

    /// A required credential or bucket setting is not configured.
    #[error("Missing mirror setting '{name}'")]
    MissingCredential {
        /// Configuration field name (e.g. `mirror.access_key`)
        name: String,
        /// Environment variable that can provide it
        env_var: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for MirrorError {
    fn clone(&self) -> Self {
        match self {
            Self::UpstreamUnavailable {
                url,
                reason,
            } => Self::UpstreamUnavailable {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::UploadFailed {
                key,
                reason,
            } => Self::UploadFailed {
                key: key.clone(),
                reason: reason.clone(),
            },
            Self::MarkerWriteError {
                key,
                reason,
            } => Self::MarkerWriteError {
                key: key.clone(),
                reason: reason.clone(),
            },
            Self::MarkerReadFailure {
                key,
                reason,
            } => Self::MarkerReadFailure {
                key: key.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::MissingCredential {
                name,
                env_var,
            } => Self::MissingCredential {
                name: name.clone(),
                env_var: env_var.clone(),
            },
            // io::Error and toml errors are not Clone; keep kind and message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Result alias used by the sync pipeline.
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

/// Error context wrapper that adds user-friendly details and suggestions
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: MirrorError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestions or details.
    #[must_use]
    pub const fn new(error: MirrorError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`MirrorError`] anywhere in the chain (so `anyhow` context added by
/// the CLI does not hide it), [`std::io::Error`], and falls back to printing
/// the full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(mirror_error) = error.chain().find_map(|e| e.downcast_ref::<MirrorError>()) {
        return create_error_context(mirror_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(MirrorError::IoError(std::io::Error::new(
                    io_error.kind(),
                    io_error.to_string(),
                )))
                .with_suggestion(
                    "Check that the work directory is writable by the current user",
                );
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(MirrorError::IoError(std::io::Error::new(
                    io_error.kind(),
                    io_error.to_string(),
                )))
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(MirrorError::Other {
        message,
    })
}

fn create_error_context(error: MirrorError) -> ErrorContext {
    match &error {
        MirrorError::UpstreamUnavailable {
            ..
        } => ErrorContext::new(error)
            .with_suggestion(
                "Check network connectivity and that upstream.releases_url, upstream.channel \
                 and upstream.build point at a published release",
            )
            .with_details("Nothing was downloaded or uploaded; the mirror is unchanged"),
        MirrorError::DownloadFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Retry the sync; check upstream.download_url if this keeps failing")
            .with_details("The partial download was removed and the mirror is unchanged"),
        MirrorError::UploadFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion(
                "Verify the access key, secret key and bucket, and that the bucket has quota left",
            )
            .with_details(
                "The version marker was not updated, so the next sync will retry this version",
            ),
        MirrorError::MarkerWriteError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Verify the credentials allow overwriting the marker key")
            .with_details(
                "The artifact was uploaded but the marker still names the previous version; \
                 the next sync will mirror this version again",
            ),
        MirrorError::MarkerReadFailure {
            ..
        } => ErrorContext::new(error)
            .with_details("Marker read failures are treated as an empty marker"),
        MirrorError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'release-mirror config show' to inspect the effective settings"),
        MirrorError::MissingCredential {
            env_var,
            ..
        } => {
            let suggestion =
                format!("Set {env_var} in the environment or .env file, or in the config file");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        MirrorError::TomlError(_) => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax of the configuration file"),
        MirrorError::IoError(_) | MirrorError::Other {
            ..
        } => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MirrorError::UploadFailed {
            key: "factorio/latest.tar.xz".to_string(),
            reason: "HTTP 401".to_string(),
        };
        assert_eq!(error.to_string(), "Upload of 'factorio/latest.tar.xz' failed: HTTP 401");
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(MirrorError::Other {
            message: "boom".to_string(),
        })
        .with_details("details here")
        .with_suggestion("try again");

        let rendered = ctx.to_string();
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("Details: details here"));
        assert!(rendered.contains("Suggestion: try again"));
    }

    #[test]
    fn test_user_friendly_error_finds_mirror_error_behind_context() {
        let error = anyhow::Error::from(MirrorError::MissingCredential {
            name: "mirror.secret_key".to_string(),
            env_var: "QINIU_SECRET_KEY".to_string(),
        })
        .context("Failed to load configuration");

        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, MirrorError::MissingCredential { .. }));
        assert!(ctx.suggestion.unwrap().contains("QINIU_SECRET_KEY"));
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let ctx = user_friendly_error(error);
        let rendered = ctx.error.to_string();
        assert!(rendered.starts_with("outer"));
        assert!(rendered.contains("Caused by:"));
        assert!(rendered.contains("root cause"));
    }

    #[test]
    fn test_clone_preserves_io_kind() {
        let error = MirrorError::IoError(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        match error.clone() {
            MirrorError::IoError(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected clone: {other:?}"),
        }
    }
}
