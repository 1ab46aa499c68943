//! Progress notifications and the channel that carries them to a host.

use std::path::{Path, PathBuf};

use framecast_model::fraction_between;
use tokio::sync::mpsc;

/// Label shown on the last frame, while the encoder flushes.
pub const FINALIZING_LABEL: &str = "Finalizing video export, please wait...";

/// A frame-level progress notification.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameProgress {
    /// Human-readable status, e.g. `0:01:05 Remaining (48.20 FPS)`.
    pub label: String,
    pub start_frame: u64,
    pub end_frame: u64,
    pub frame: u64,
    /// Digits after the decimal point for the percentage.
    pub digits: u8,
    /// Set on the single event emitted after the loop finishes.
    pub is_final: bool,
}

impl FrameProgress {
    /// Completed share of the range.
    pub fn fraction(&self) -> f64 {
        fraction_between(self.start_frame, self.end_frame, self.frame)
    }

    /// Percentage text at the event's precision, e.g. `" 42.7% "`.
    pub fn percentage_label(&self) -> String {
        if self.end_frame > self.start_frame {
            format!("{:4.*}% ", self.digits as usize, self.fraction() * 100.0)
        } else {
            "100%".to_string()
        }
    }
}

/// Everything an observer can be told about an export.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        path: PathBuf,
        start_frame: u64,
        end_frame: u64,
    },
    Frame(FrameProgress),
    Ended {
        path: PathBuf,
    },
}

/// Receives export notifications.
///
/// Implementations must return promptly; the export loop calls them inline.
pub trait ExportObserver {
    fn started(&mut self, path: &Path, start_frame: u64, end_frame: u64);

    fn frame(&mut self, progress: &FrameProgress);

    fn ended(&mut self, path: &Path);

    /// Called after each display tick so the host can process pending work.
    fn yield_now(&mut self) {}
}

impl<O: ExportObserver + ?Sized> ExportObserver for &mut O {
    fn started(&mut self, path: &Path, start_frame: u64, end_frame: u64) {
        (**self).started(path, start_frame, end_frame);
    }

    fn frame(&mut self, progress: &FrameProgress) {
        (**self).frame(progress);
    }

    fn ended(&mut self, path: &Path) {
        (**self).ended(path);
    }

    fn yield_now(&mut self) {
        (**self).yield_now();
    }
}

/// Collects every event in order.
impl ExportObserver for Vec<ProgressEvent> {
    fn started(&mut self, path: &Path, start_frame: u64, end_frame: u64) {
        self.push(ProgressEvent::Started {
            path: path.to_path_buf(),
            start_frame,
            end_frame,
        });
    }

    fn frame(&mut self, progress: &FrameProgress) {
        self.push(ProgressEvent::Frame(progress.clone()));
    }

    fn ended(&mut self, path: &Path) {
        self.push(ProgressEvent::Ended {
            path: path.to_path_buf(),
        });
    }
}

/// Forwards events over a bounded channel without stalling the loop.
///
/// Intermediate frame events are dropped when the receiver falls behind.
/// `started`, `ended`, and the final frame event wait for room instead, so
/// they always arrive. Run the export loop on a blocking thread (for example
/// `tokio::task::spawn_blocking`) when using this observer.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: mpsc::Sender<ProgressEvent>,
    dropped: u64,
}

/// Create a channel observer and the receiver the host reads from.
pub fn progress_channel(capacity: usize) -> (ChannelObserver, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelObserver { tx, dropped: 0 }, rx)
}

impl ChannelObserver {
    /// Frame events skipped because the receiver was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn deliver(&self, event: ProgressEvent) {
        if self.tx.blocking_send(event).is_err() {
            tracing::debug!("Progress receiver dropped; discarding event");
        }
    }
}

impl ExportObserver for ChannelObserver {
    fn started(&mut self, path: &Path, start_frame: u64, end_frame: u64) {
        self.deliver(ProgressEvent::Started {
            path: path.to_path_buf(),
            start_frame,
            end_frame,
        });
    }

    fn frame(&mut self, progress: &FrameProgress) {
        if progress.is_final {
            self.deliver(ProgressEvent::Frame(progress.clone()));
            return;
        }
        match self.tx.try_send(ProgressEvent::Frame(progress.clone())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::trace!(frame = progress.frame, "Progress channel full; skipping tick");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn ended(&mut self, path: &Path) {
        self.deliver(ProgressEvent::Ended {
            path: path.to_path_buf(),
        });
    }

    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Format `seconds` as `H:MM:SS <word> (fps FPS)`.
pub fn format_clock_label(seconds: u64, fps: f64, word: &str) -> String {
    format!(
        "{}:{:02}:{:02} {word} ({fps:5.2} FPS)",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
    )
}
