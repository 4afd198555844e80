//! Core types shared by every layer of release-mirror.
//!
//! - [`error`] - [`MirrorError`], [`ErrorContext`] and [`user_friendly_error`]
//! - [`version`] - the opaque [`Version`] token

pub mod error;
pub mod version;

pub use error::{ErrorContext, MirrorError, user_friendly_error};
pub use version::Version;
