//! Download progress reporting.
//!
//! A [`ProgressSink`] is shared by every download worker. Workers add the
//! bytes they receive; the sink keeps a synchronized running total and
//! forwards strictly increasing totals to an optional [`ProgressCallback`].
//! Progress is observational only and never influences control flow.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Progress event emitted during downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Download has started.
    Started {
        /// Total size in bytes, if known.
        total: Option<u64>,
    },
    /// Download progress update.
    Progress {
        /// Bytes downloaded so far, across all workers.
        downloaded: u64,
        /// Average download speed in bytes per second.
        speed: u64,
    },
    /// Download completed successfully.
    Completed,
    /// Download stopped with an error after it started.
    Failed,
}

/// Callback type for receiving progress updates during downloads.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Thread-safe byte counter shared by concurrent download workers.
pub struct ProgressSink {
    downloaded: AtomicU64,
    reported: Mutex<u64>,
    started: Mutex<Instant>,
    callback: Option<ProgressCallback>,
}

impl ProgressSink {
    /// Creates a sink that forwards events to `callback`.
    #[must_use]
    pub fn new(callback: ProgressCallback) -> Self {
        Self::with_callback(Some(callback))
    }

    /// Creates a sink that only counts.
    #[must_use]
    pub fn silent() -> Self {
        Self::with_callback(None)
    }

    fn with_callback(callback: Option<ProgressCallback>) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            reported: Mutex::new(0),
            started: Mutex::new(Instant::now()),
            callback,
        }
    }

    /// Resets the counter and announces a new transfer.
    pub fn start(&self, total: Option<u64>) {
        self.downloaded.store(0, Ordering::SeqCst);
        *self.reported.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.emit(ProgressEvent::Started { total });
    }

    /// Records `bytes` more bytes and returns the new total.
    pub fn add(&self, bytes: u64) -> u64 {
        let downloaded = self.downloaded.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if self.callback.is_some() {
            let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
            // Concurrent workers may arrive out of order; only forward new maxima.
            if downloaded > *reported {
                *reported = downloaded;
                let speed = self.speed(downloaded);
                self.emit(ProgressEvent::Progress { downloaded, speed });
            }
        }
        downloaded
    }

    /// Announces that the transfer finished.
    pub fn finish(&self) {
        self.emit(ProgressEvent::Completed);
    }

    /// Announces that the transfer stopped with an error.
    pub fn fail(&self) {
        self.emit(ProgressEvent::Failed);
    }

    /// Bytes recorded since the last [`ProgressSink::start`].
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn speed(&self, downloaded: u64) -> u64 {
        let elapsed_secs = self
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
            .as_secs_f64();
        if elapsed_secs > 0.0 {
            (downloaded as f64 / elapsed_secs) as u64
        } else {
            0
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

/// Minimum interval between progress line redraws in milliseconds.
const CLI_PROGRESS_INTERVAL_MS: u128 = 250;

/// Returns a callback that renders a single-line progress display on stderr.
#[must_use]
pub fn terminal_progress() -> ProgressCallback {
    let state = Mutex::new((None::<u64>, Instant::now()));
    Arc::new(move |event| {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            ProgressEvent::Started { total } => {
                *state = (total, Instant::now());
            }
            ProgressEvent::Progress { downloaded, speed } => {
                let now = Instant::now();
                let finished = state.0.is_some_and(|total| downloaded >= total);
                if finished || now.duration_since(state.1).as_millis() >= CLI_PROGRESS_INTERVAL_MS {
                    print_progress(downloaded, state.0, speed);
                    state.1 = now;
                }
            }
            // Terminate the progress line so later output starts on its own line.
            ProgressEvent::Completed | ProgressEvent::Failed => {
                eprintln!();
            }
        }
    })
}

/// Prints a simple text-based progress line.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn print_progress(downloaded: u64, total: Option<u64>, speed: u64) {
    let downloaded_str = format_bytes(downloaded);
    let speed_str = format_speed(speed as f64);
    match total {
        Some(total) if total > 0 => {
            let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0) as u8;
            let total_str = format_bytes(total);
            eprint!("\rdownloading {downloaded_str}/{total_str} ({percent}%) {speed_str}     ");
        }
        _ => eprint!("\rdownloading {downloaded_str} {speed_str}     "),
    }
    let _ = std::io::stderr().flush();
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats speed (bytes/sec) into a human-readable string.
fn format_speed(speed: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if speed >= MB {
        format!("{:.2} MB/s", speed / MB)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed / KB)
    } else {
        format!("{speed:.0} B/s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_sink() -> (Arc<ProgressSink>, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let callback: ProgressCallback = Arc::new(move |event| {
            sink_events.lock().expect("lock").push(event);
        });
        (Arc::new(ProgressSink::new(callback)), events)
    }

    #[test]
    fn add_accumulates_and_returns_total() {
        let sink = ProgressSink::silent();
        assert_eq!(sink.add(10), 10);
        assert_eq!(sink.add(5), 15);
        assert_eq!(sink.downloaded(), 15);
    }

    #[test]
    fn start_resets_counter_and_emits_started() {
        let (sink, events) = recording_sink();
        sink.add(100);
        sink.start(Some(42));
        assert_eq!(sink.downloaded(), 0);
        let events = events.lock().expect("lock");
        assert_eq!(events.last(), Some(&ProgressEvent::Started { total: Some(42) }));
    }

    #[test]
    fn concurrent_updates_are_all_counted_and_reported_monotonically() {
        let (sink, events) = recording_sink();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        sink.add(3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }

        assert_eq!(sink.downloaded(), 8 * 1000 * 3);

        let events = events.lock().expect("lock");
        let totals: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { downloaded, .. } => Some(*downloaded),
                _ => None,
            })
            .collect();
        assert!(totals.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(totals.last(), Some(&24_000));
    }

    #[test]
    fn finish_emits_completed() {
        let (sink, events) = recording_sink();
        sink.finish();
        assert_eq!(
            events.lock().expect("lock").as_slice(),
            &[ProgressEvent::Completed]
        );
    }

    #[test]
    fn fail_emits_failed() {
        let (sink, events) = recording_sink();
        sink.start(Some(10));
        sink.fail();
        assert_eq!(
            events.lock().expect("lock").last(),
            Some(&ProgressEvent::Failed)
        );
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn format_speed_picks_unit() {
        assert_eq!(format_speed(100.0), "100 B/s");
        assert_eq!(format_speed(2048.0), "2.00 KB/s");
        assert_eq!(format_speed(1024.0 * 1024.0 * 1.5), "1.50 MB/s");
    }
}
