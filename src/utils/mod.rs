//! Shared helpers
//!
//! # Modules
//!
//! - [`fs`] - Scoped work-directory files and file name sanitizing
//! - [`progress`] - Progress bars and the transfer progress side channel

pub mod fs;
pub mod progress;

pub use fs::{ScopedFile, create_file, sanitize_file_name};
pub use progress::{
    ConsoleProgress, NoProgress, ProgressBar, ProgressObserver, ProgressSnapshot, ProgressStyle,
    TransferSession,
};
