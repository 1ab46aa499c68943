//! The frame export loop.
//!
//! An [`ExportLoop`] is built idle, consumed by [`ExportLoop::run`], and
//! leaves behind an [`ExportOutcome`]. Running a second export needs a new
//! loop.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framecast_common::clock::Clock;
use framecast_common::config::ExportDefaults;
use framecast_model::ExportRange;

use crate::error::{ExportError, SinkError, SinkErrorKind};
use crate::estimator::Estimator;
use crate::progress::{format_clock_label, ExportObserver, FrameProgress, FINALIZING_LABEL};
use crate::sink::Sink;
use crate::source::{CacheScope, FrameSource};
use crate::throttle::{ProgressThrottle, ThrottlePolicy};

/// Default number of frames a source may cache during export.
pub const DEFAULT_CACHE_FRAMES: usize = 500;

/// How an export attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed {
        frames_written: u64,
        elapsed: Duration,
    },
    Cancelled {
        frames_written: u64,
    },
    Failed {
        kind: SinkErrorKind,
        detail: String,
    },
}

impl ExportOutcome {
    fn failed(err: SinkError) -> Self {
        Self::Failed {
            kind: err.kind,
            detail: err.detail,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Frames committed to the sink, when the export did not fail.
    pub fn frames_written(&self) -> Option<u64> {
        match self {
            Self::Completed { frames_written, .. } | Self::Cancelled { frames_written } => {
                Some(*frames_written)
            }
            Self::Failed { .. } => None,
        }
    }

    /// The failure as an [`ExportError`]. Cancellation is not an error.
    pub fn error(&self) -> Option<ExportError> {
        match self {
            Self::Failed { kind, detail } => Some(SinkError::new(*kind, detail.clone()).into()),
            _ => None,
        }
    }
}

/// Validate user-entered bounds before an export starts.
pub fn validate_range(start_frame: u64, end_frame: u64) -> Result<ExportRange, ExportError> {
    Ok(ExportRange::new(start_frame, end_frame)?)
}

/// Cooperative cancellation, shared between the loop and whoever stops it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Where the stream stopped, for the final report.
#[derive(Debug)]
struct StreamSummary {
    last_frame: u64,
    frames_written: u64,
    cancelled: bool,
    digits: u8,
    fps: f64,
    elapsed_secs: f64,
}

/// Drives one export from the first frame to the last.
pub struct ExportLoop<C: Clock> {
    clock: C,
    policy: ThrottlePolicy,
    cache_frames: usize,
}

impl<C: Clock> ExportLoop<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            policy: ThrottlePolicy::default(),
            cache_frames: DEFAULT_CACHE_FRAMES,
        }
    }

    /// Build a loop with the throttle and cache sizes from configuration.
    pub fn from_config(clock: C, defaults: &ExportDefaults) -> Self {
        Self {
            clock,
            policy: ThrottlePolicy::from(defaults),
            cache_frames: defaults.cache_max_frames,
        }
    }

    pub fn with_policy(mut self, policy: ThrottlePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache_frames(mut self, frames: usize) -> Self {
        self.cache_frames = frames;
        self
    }

    /// Render every frame of `range` into `sink`, reporting to `observer`.
    ///
    /// The source's cache is held for the whole run. After `sink.open`
    /// succeeds the sink is closed exactly once, whatever happens; a close
    /// failure only becomes the outcome when nothing failed before it.
    /// `observer.ended` is always the last notification.
    pub fn run<S, K, O>(
        self,
        range: ExportRange,
        source: &mut S,
        sink: &mut K,
        observer: &mut O,
        cancel: &CancelFlag,
    ) -> ExportOutcome
    where
        S: FrameSource + ?Sized,
        K: Sink + ?Sized,
        O: ExportObserver + ?Sized,
    {
        let path = sink.path().to_path_buf();
        tracing::info!(
            output = %path.display(),
            start_frame = range.start_frame(),
            end_frame = range.end_frame(),
            "Starting export"
        );

        let mut source = CacheScope::acquire(source, self.cache_frames);

        if let Err(err) = sink.open() {
            tracing::error!(kind = %err.kind, detail = %err.detail, "Failed to open sink");
            observer.ended(&path);
            return ExportOutcome::failed(err);
        }

        observer.started(&path, range.start_frame(), range.end_frame());

        let streamed = self.stream(&range, &mut *source, sink, observer, cancel);
        let closed = sink.close();

        let outcome = match (streamed, closed) {
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(
                        kind = %close_err.kind,
                        detail = %close_err.detail,
                        "Sink close also failed after a write error"
                    );
                }
                tracing::error!(kind = %err.kind, detail = %err.detail, "Export failed");
                ExportOutcome::failed(err)
            }
            (Ok(_), Err(close_err)) => {
                tracing::error!(
                    kind = %close_err.kind,
                    detail = %close_err.detail,
                    "Failed to finalize output"
                );
                ExportOutcome::failed(close_err)
            }
            (Ok(summary), Ok(())) => self.finish(&range, &path, summary, observer),
        };

        observer.ended(&path);
        outcome
    }

    fn stream<S, K, O>(
        &self,
        range: &ExportRange,
        source: &mut S,
        sink: &mut K,
        observer: &mut O,
        cancel: &CancelFlag,
    ) -> Result<StreamSummary, SinkError>
    where
        S: FrameSource + ?Sized,
        K: Sink + ?Sized,
        O: ExportObserver + ?Sized,
    {
        let start_time = self.clock.now_secs();
        let mut estimator = Estimator::new(range.start_frame(), range.end_frame(), start_time);
        let throttle = ProgressThrottle::new(&self.policy, range);
        let mut label = String::new();
        let mut summary = StreamSummary {
            last_frame: range.start_frame(),
            frames_written: 0,
            cancelled: false,
            digits: 1,
            fps: 0.0,
            elapsed_secs: 0.0,
        };

        tracing::debug!(step = throttle.step(), "Progress throttle configured");

        for frame in range.frames() {
            let now = self.clock.now_secs();
            if throttle.is_display_tick(frame, estimator.since_last_sample(now)) {
                let estimate = estimator.update(frame, now);
                if let (Some(seconds), Some(fps)) = (estimate.seconds_remaining, estimate.fps) {
                    summary.fps = fps;
                    label = format_clock_label(seconds, fps, "Remaining");
                }
                if frame == range.end_frame() {
                    label = FINALIZING_LABEL.to_string();
                }
                summary.digits = estimate.digits;

                observer.frame(&FrameProgress {
                    label: label.clone(),
                    start_frame: range.start_frame(),
                    end_frame: range.end_frame(),
                    frame,
                    digits: estimate.digits,
                    is_final: false,
                });
                observer.yield_now();
            }

            let buffer = source.render(frame);
            if let Err(err) = sink.write(&buffer) {
                tracing::warn!(frame, kind = %err.kind, "Sink rejected frame");
                return Err(err);
            }
            summary.last_frame = frame;
            summary.frames_written += 1;

            if cancel.is_cancelled() {
                tracing::info!(
                    frame,
                    frames_written = summary.frames_written,
                    "Export cancelled"
                );
                summary.cancelled = true;
                break;
            }
        }

        summary.elapsed_secs = estimator.elapsed(self.clock.now_secs());
        Ok(summary)
    }

    fn finish<O: ExportObserver + ?Sized>(
        &self,
        range: &ExportRange,
        path: &Path,
        summary: StreamSummary,
        observer: &mut O,
    ) -> ExportOutcome {
        let seconds_run = summary.elapsed_secs.round_ties_even() as u64;
        observer.frame(&FrameProgress {
            label: format_clock_label(seconds_run, summary.fps, "Elapsed"),
            start_frame: range.start_frame(),
            end_frame: range.end_frame(),
            frame: summary.last_frame,
            digits: summary.digits,
            is_final: true,
        });

        if summary.cancelled {
            ExportOutcome::Cancelled {
                frames_written: summary.frames_written,
            }
        } else {
            tracing::info!(
                output = %path.display(),
                frames_written = summary.frames_written,
                elapsed_secs = summary.elapsed_secs,
                "Export finished"
            );
            ExportOutcome::Completed {
                frames_written: summary.frames_written,
                elapsed: Duration::from_secs_f64(summary.elapsed_secs),
            }
        }
    }
}
