//! Byte-level download progress for the active selection.
//!
//! A [`ProgressMonitor`] owns at most one [`DownloadTracker`] at a time. The
//! instrumented transport feeds it declared and received byte counts, the
//! window reader feeds it row progress, and observers subscribe to a
//! [`Progress`] watch channel.
//!
//! While a transfer streams, reported percentages stay within `[1, 99]` and
//! never decrease. `100` is only published by [`ProgressMonitor::finish`] and
//! `0` means nothing has started.

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

/// Lowest percentage published while streaming.
pub const MIN_STREAMING_PERCENT: u8 = 1;

/// Highest percentage published while streaming.
pub const MAX_STREAMING_PERCENT: u8 = 99;

/// Byte counters of the transfer currently being tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadTracker {
    /// Sum of declared content lengths.
    pub total: u64,
    /// Bytes received so far.
    pub loaded: u64,
}

impl DownloadTracker {
    /// Percentage of the transfer received, clamped to the streaming range.
    ///
    /// `loaded` may exceed `total` when a response declared no length, so the
    /// denominator is whichever is larger. Returns 0 before any byte arrives.
    pub fn percent(&self) -> u8 {
        let denominator = self.total.max(self.loaded);
        if denominator == 0 {
            return 0;
        }
        streaming_percent(self.loaded as f64 / denominator as f64)
    }
}

/// Convert a completed fraction to a streaming percentage in `[1, 99]`.
pub fn streaming_percent(fraction: f64) -> u8 {
    let percent = (fraction * 100.0).round();
    if percent.is_nan() {
        return MIN_STREAMING_PERCENT;
    }
    percent.clamp(MIN_STREAMING_PERCENT as f64, MAX_STREAMING_PERCENT as f64) as u8
}

/// Observable progress state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// A transfer is in flight.
    pub active: bool,
    /// Completion percentage in `[0, 100]`.
    pub percent: u8,
}

/// Owner of the single active download tracker and its progress channel.
#[derive(Debug)]
pub struct ProgressMonitor {
    tracker: Mutex<Option<DownloadTracker>>,
    state: watch::Sender<Progress>,
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressMonitor {
    /// Create an idle monitor.
    pub fn new() -> Self {
        let (state, _) = watch::channel(Progress::default());
        Self {
            tracker: Mutex::new(None),
            state,
        }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.state.subscribe()
    }

    /// Latest published progress.
    pub fn progress(&self) -> Progress {
        *self.state.borrow()
    }

    /// Start tracking a new transfer, replacing any previous tracker.
    pub fn begin(&self) {
        *self.tracker.lock() = Some(DownloadTracker::default());
        self.state.send_replace(Progress {
            active: true,
            percent: 0,
        });
    }

    /// Whether a tracker is active.
    pub fn is_tracking(&self) -> bool {
        self.tracker.lock().is_some()
    }

    /// Snapshot of the active tracker.
    pub fn tracker(&self) -> Option<DownloadTracker> {
        *self.tracker.lock()
    }

    /// Add a response's declared content length to the expected total.
    pub fn add_expected(&self, bytes: u64) {
        if let Some(tracker) = self.tracker.lock().as_mut() {
            tracker.total += bytes;
        }
    }

    /// Record received bytes and publish the resulting percentage.
    pub fn add_loaded(&self, bytes: u64) {
        let percent = {
            let mut guard = self.tracker.lock();
            let Some(tracker) = guard.as_mut() else {
                return;
            };
            tracker.loaded += bytes;
            tracker.percent()
        };
        self.report(percent);
    }

    /// Publish a streaming percentage.
    ///
    /// The value is clamped to `[1, 99]` and ignored unless it advances the
    /// published progress of an active transfer.
    pub fn report(&self, percent: u8) {
        let percent = percent.clamp(MIN_STREAMING_PERCENT, MAX_STREAMING_PERCENT);
        self.state.send_if_modified(|state| {
            if !state.active || percent <= state.percent {
                return false;
            }
            trace!("Progress {}%", percent);
            state.percent = percent;
            true
        });
    }

    /// Signal overall completion and drop the tracker.
    pub fn finish(&self) {
        *self.tracker.lock() = None;
        self.state.send_replace(Progress {
            active: false,
            percent: 100,
        });
    }

    /// Abandon the transfer without completing it and drop the tracker.
    pub fn cancel(&self) {
        *self.tracker.lock() = None;
        self.state.send_replace(Progress::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_percent() {
        assert_eq!(DownloadTracker { total: 0, loaded: 0 }.percent(), 0);
        assert_eq!(DownloadTracker { total: 1000, loaded: 1 }.percent(), 1);
        assert_eq!(DownloadTracker { total: 1000, loaded: 506 }.percent(), 51);
        assert_eq!(DownloadTracker { total: 1000, loaded: 1000 }.percent(), 99);
        // Undeclared lengths: loaded outruns total
        assert_eq!(DownloadTracker { total: 10, loaded: 40 }.percent(), 99);
    }

    #[test]
    fn test_begin_and_finish() {
        let monitor = ProgressMonitor::new();
        assert!(!monitor.is_tracking());
        monitor.begin();
        assert!(monitor.is_tracking());
        assert_eq!(monitor.progress(), Progress { active: true, percent: 0 });

        monitor.finish();
        assert!(!monitor.is_tracking());
        assert_eq!(monitor.progress(), Progress { active: false, percent: 100 });
    }

    #[test]
    fn test_byte_accounting() {
        let monitor = ProgressMonitor::new();
        monitor.begin();
        monitor.add_expected(200);
        monitor.add_loaded(50);
        assert_eq!(monitor.progress().percent, 25);
        monitor.add_expected(200);
        monitor.add_loaded(50);
        assert_eq!(monitor.tracker(), Some(DownloadTracker { total: 400, loaded: 100 }));
        // Total grew: raw percent drops to 25 but published value holds
        assert_eq!(monitor.progress().percent, 25);
        monitor.add_loaded(300);
        assert_eq!(monitor.progress().percent, 99);
    }

    #[test]
    fn test_report_is_monotonic_and_clamped() {
        let monitor = ProgressMonitor::new();
        monitor.begin();
        monitor.report(0);
        assert_eq!(monitor.progress().percent, 1);
        monitor.report(40);
        monitor.report(30);
        assert_eq!(monitor.progress().percent, 40);
        monitor.report(100);
        assert_eq!(monitor.progress().percent, 99);
    }

    #[test]
    fn test_idle_monitor_ignores_updates() {
        let monitor = ProgressMonitor::new();
        monitor.add_expected(10);
        monitor.add_loaded(10);
        monitor.report(50);
        assert_eq!(monitor.progress(), Progress::default());
        assert_eq!(monitor.tracker(), None);
    }

    #[test]
    fn test_begin_replaces_tracker() {
        let monitor = ProgressMonitor::new();
        monitor.begin();
        monitor.add_expected(100);
        monitor.add_loaded(60);
        monitor.begin();
        assert_eq!(monitor.tracker(), Some(DownloadTracker::default()));
        assert_eq!(monitor.progress().percent, 0);
    }

    #[test]
    fn test_cancel_resets() {
        let monitor = ProgressMonitor::new();
        let receiver = monitor.subscribe();
        monitor.begin();
        monitor.report(20);
        monitor.cancel();
        assert_eq!(*receiver.borrow(), Progress::default());
    }
}
