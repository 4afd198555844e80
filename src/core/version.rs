//! Opaque release version tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An upstream release version.
///
/// Versions are opaque: two versions are the same release only if their
/// strings are byte-for-byte equal. No semver ordering is applied, so
/// `"1.1.100"` and `"1.1.100 "` are different tokens (callers trim where the
/// source may pad, see the marker store).
///
/// The empty version is the sentinel for "nothing mirrored yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wrap a version string as-is.
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// The "no version known yet" sentinel.
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Whether this is the empty sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes as persisted in a marker object.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Version {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_string_equality() {
        assert_eq!(Version::from("1.1.100"), Version::new("1.1.100".to_string()));
        assert_ne!(Version::from("1.1.100"), Version::from("1.1.101"));
        // No semantic normalization
        assert_ne!(Version::from("1.1.100"), Version::from("v1.1.100"));
        assert_ne!(Version::from("1.10.0"), Version::from("1.10"));
    }

    #[test]
    fn test_empty_sentinel() {
        assert!(Version::empty().is_empty());
        assert_eq!(Version::empty(), Version::default());
        assert_ne!(Version::empty(), Version::from("0"));
        assert_eq!(Version::empty().to_string(), "<none>");
        assert_eq!(Version::empty().as_str(), "");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Version::from("2.0.72")).unwrap();
        assert_eq!(json, "\"2.0.72\"");
    }
}
