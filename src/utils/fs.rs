//! Local file helpers for the sync work directory.
//!
//! [`ScopedFile`] owns a path for the duration of a run and deletes it when
//! dropped, so downloaded artifacts and temporary marker files disappear on
//! every exit path, including early returns through `?`.

use std::io;
use std::path::{Path, PathBuf};

/// A work-directory file that is removed when the guard is dropped.
///
/// The file itself does not need to exist yet: the guard is usually created
/// before the download starts so that a partially written file is covered
/// too.
///
/// # Examples
///
/// ```rust,no_run
/// use release_mirror::utils::fs::ScopedFile;
///
/// # async fn example() -> anyhow::Result<()> {
/// let artifact = ScopedFile::new("factorio-2.0.72.tar.xz");
/// tokio::fs::write(artifact.path(), b"...").await?;
/// artifact.remove().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
    armed: bool,
}

impl ScopedFile {
    /// Take ownership of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// The owned path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now and report what happened.
    ///
    /// A file that was never created counts as removed.
    pub async fn remove(mut self) -> io::Result<()> {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {e}", self.path.display()),
        }
    }
}

/// Create (or truncate) `path` for async writing.
///
/// The file is opened synchronously rather than on the blocking pool, so it
/// exists by the time this returns. A caller cancelled at a later await point
/// drops its [`ScopedFile`] guard after the file was created, never before, and
/// the guard removes it.
pub fn create_file(path: &Path) -> io::Result<tokio::fs::File> {
    std::fs::File::create(path).map(tokio::fs::File::from_std)
}

/// Make an untrusted string safe to use as a single file name component.
///
/// Path separators, control characters and characters rejected by Windows
/// become `_`. Names consisting only of dots are replaced entirely.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        trimmed.replace("..", "_")
    }
}
