//! Transfer progress reporting
//!
//! Two layers live here:
//!
//! - [`ProgressBar`] and [`ProgressStyle`]: thin wrappers over `indicatif`
//!   with the release-mirror look, hidden when `RELEASE_MIRROR_NO_PROGRESS`
//!   is set.
//! - [`ProgressObserver`] and [`TransferSession`]: the side channel used by
//!   downloads and uploads. A session counts bytes, samples notifications
//!   every N chunks and guarantees that reported positions never go
//!   backwards and never exceed a known total. Observers cannot influence the
//!   transfer; they only see snapshots.
//!
//! # Examples
//!
//! ```rust
//! use release_mirror::utils::progress::{NoProgress, TransferSession};
//! use std::sync::Arc;
//!
//! let mut session = TransferSession::new(Arc::new(NoProgress), "Downloading", Some(1024), 10);
//! session.record(512);
//! session.record(512);
//! assert_eq!(session.finish().transferred, 1024);
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV;

/// Whether progress bars are disabled via `RELEASE_MIRROR_NO_PROGRESS`.
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress bar with consistent styling.
///
/// Hidden bars silently accept every call, so callers never branch on
/// whether output is enabled.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Byte-oriented bar for a transfer of `len` bytes.
    pub fn new_download(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(ProgressStyle::download());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Spinner for transfers of unknown size; shows a running byte count.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(ProgressStyle::spinner());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Bar that never draws.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Bar matching what is known about the total size.
    pub fn for_total(total: Option<u64>) -> Self {
        match total {
            Some(len) if len > 0 => Self::new_download(len),
            _ => Self::new_spinner(),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    /// Whether output is actually drawn.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }
}

/// Predefined styles.
pub struct ProgressStyle;

impl ProgressStyle {
    /// Byte transfer with a known total:
    ///
    /// ```text
    /// Downloading [━━━━━━━━━━━━━━╸━━━━━━━━━━━━━━━━━━━━━━━━━] 21.4 MiB/60.2 MiB (00:12)
    /// ```
    pub fn download() -> IndicatifStyle {
        IndicatifStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| IndicatifStyle::default_bar())
            .progress_chars("━╸━")
    }

    /// Byte transfer without a total; no percentage is ever shown.
    pub fn spinner() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.cyan} {bytes} {msg}")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
    }
}

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes moved so far.
    pub transferred: u64,
    /// Expected total, when known and nonzero.
    pub total: Option<u64>,
}

impl ProgressSnapshot {
    /// Completion percentage, or `None` when the total is unknown.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.transferred as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

/// Receives transfer progress.
///
/// Implementations must be cheap and must not block: they are called from
/// inside the copy loop.
pub trait ProgressObserver: Send + Sync {
    /// A transfer named `label` begins.
    fn on_start(&self, label: &str, total: Option<u64>);

    /// Sampled progress update.
    fn on_progress(&self, snapshot: ProgressSnapshot);

    /// The transfer ended (successfully or not).
    fn on_finish(&self, snapshot: ProgressSnapshot);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_start(&self, _label: &str, _total: Option<u64>) {}

    fn on_progress(&self, _snapshot: ProgressSnapshot) {}

    fn on_finish(&self, _snapshot: ProgressSnapshot) {}
}

/// Terminal observer backed by `indicatif`.
///
/// When bars are disabled, sampled updates go to the log instead, which keeps
/// CI output readable.
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
    draw: bool,
}

impl ConsoleProgress {
    /// Draw bars unless `RELEASE_MIRROR_NO_PROGRESS` is set.
    pub fn new() -> Self {
        Self::with_bars(!is_progress_disabled())
    }

    /// Draw bars only when `draw` is true; otherwise log sampled progress.
    pub fn with_bars(draw: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            draw,
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_start(&self, label: &str, total: Option<u64>) {
        let bar = if self.draw {
            ProgressBar::for_total(total)
        } else {
            ProgressBar::hidden()
        };
        bar.set_prefix(label.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_progress(&self, snapshot: ProgressSnapshot) {
        let Ok(slot) = self.bar.lock() else {
            return;
        };
        match slot.as_ref() {
            Some(bar) if !bar.is_hidden() => bar.set_position(snapshot.transferred),
            _ => match snapshot.percent() {
                Some(percent) => tracing::info!("Progress: {percent:.2}%"),
                None => tracing::info!("Progress: {} bytes", snapshot.transferred),
            },
        }
    }

    fn on_finish(&self, snapshot: ProgressSnapshot) {
        if let Ok(mut slot) = self.bar.lock()
            && let Some(bar) = slot.take()
        {
            bar.set_position(snapshot.transferred);
            bar.finish_and_clear();
        }
        tracing::debug!("Transfer finished after {} bytes", snapshot.transferred);
    }
}

/// Byte accounting for one transfer.
///
/// - Positions only increase.
/// - A declared total of zero is treated as unknown.
/// - If more bytes arrive than declared, the total is dropped rather than
///   reporting a position past it.
/// - Observers see one update per `sample_rate` chunks plus a final one.
/// - A session dropped before [`finish`](Self::finish), e.g. on an I/O error,
///   still notifies `on_finish` with the bytes moved so far.
pub struct TransferSession {
    observer: Arc<dyn ProgressObserver>,
    sample_rate: u64,
    chunks: u64,
    transferred: u64,
    total: Option<u64>,
    last_reported: u64,
    finished: bool,
}

impl TransferSession {
    /// Start a session and notify the observer.
    pub fn new(
        observer: Arc<dyn ProgressObserver>,
        label: &str,
        total: Option<u64>,
        sample_rate: u32,
    ) -> Self {
        let total = total.filter(|t| *t > 0);
        observer.on_start(label, total);
        Self {
            observer,
            sample_rate: u64::from(sample_rate.max(1)),
            chunks: 0,
            transferred: 0,
            total,
            last_reported: 0,
            finished: false,
        }
    }

    /// Account for one chunk of `len` bytes.
    pub fn record(&mut self, len: usize) {
        self.transferred = self.transferred.saturating_add(len as u64);
        self.chunks += 1;

        if let Some(total) = self.total
            && self.transferred > total
        {
            tracing::debug!(
                "Transfer exceeded declared size ({} > {total}), dropping total",
                self.transferred
            );
            self.total = None;
        }

        if self.chunks % self.sample_rate == 0 {
            self.report();
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            transferred: self.transferred,
            total: self.total,
        }
    }

    /// Bytes accounted so far.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// End the session and return the final snapshot.
    pub fn finish(mut self) -> ProgressSnapshot {
        self.finished = true;
        let snapshot = self.snapshot();
        self.observer.on_finish(snapshot);
        snapshot
    }

    fn report(&mut self) {
        if self.transferred < self.last_reported {
            return;
        }
        self.last_reported = self.transferred;
        self.observer.on_progress(self.snapshot());
    }
}

impl Drop for TransferSession {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Transfer ended early after {} bytes", self.transferred);
            self.observer.on_finish(self.snapshot());
        }
    }
}
