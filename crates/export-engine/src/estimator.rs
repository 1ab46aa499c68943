//! Throughput, ETA, and display precision estimation.

use framecast_model::fraction_between;

/// Fewest digits shown after the decimal point of a percentage.
pub const MIN_DIGITS: u8 = 1;
/// Most digits shown after the decimal point of a percentage.
pub const MAX_DIGITS: u8 = 5;

/// Mutable estimator state, reset at export start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorState {
    /// Completion fraction shown by the last display tick.
    pub last_displayed_fraction: f64,
    /// Clock reading at the last display tick.
    pub last_sample_time: f64,
    /// Clock reading when the export started.
    pub start_time: f64,
}

/// Position of the export at one display tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub frame: u64,
    pub elapsed_seconds: f64,
    /// Completed share of the range, in `[0.0, 1.0]`.
    pub fraction_done: f64,
}

/// Result of [`Estimator::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub sample: ProgressSample,
    /// Digits after the decimal point for the percentage display.
    pub digits: u8,
    /// Whole seconds until the last frame, when throughput is known.
    pub seconds_remaining: Option<u64>,
    /// Frames per second so far, when any time has elapsed.
    pub fps: Option<f64>,
}

/// Turns frame positions and clock readings into ETA and precision.
#[derive(Debug, Clone)]
pub struct Estimator {
    start_frame: u64,
    end_frame: u64,
    state: EstimatorState,
}

impl Estimator {
    /// Anchor a fresh estimator at `now`. Each export builds its own.
    pub fn new(start_frame: u64, end_frame: u64, now: f64) -> Self {
        Self {
            start_frame,
            end_frame,
            state: EstimatorState {
                last_displayed_fraction: 0.0,
                last_sample_time: now,
                start_time: now,
            },
        }
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    /// Seconds since the last displayed tick.
    pub fn since_last_sample(&self, now: f64) -> f64 {
        (now - self.state.last_sample_time).max(0.0)
    }

    /// Seconds since the export started.
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.state.start_time).max(0.0)
    }

    /// Produce the estimate for a displayed tick and commit it.
    ///
    /// Only call this for ticks that are actually shown: the precision is
    /// derived from how far progress moved since the previous call.
    pub fn update(&mut self, current_frame: u64, now: f64) -> Estimate {
        let fraction_done = fraction_between(self.start_frame, self.end_frame, current_frame);
        let digits = digit_precision(fraction_done - self.state.last_displayed_fraction);

        let elapsed = self.elapsed(now);
        let frames_done = current_frame.saturating_sub(self.start_frame);
        let frames_left = self.end_frame.saturating_sub(current_frame);

        let fps = (elapsed > 0.0).then(|| frames_done as f64 / elapsed);
        let seconds_remaining = (elapsed > 0.0 && frames_done > 0).then(|| {
            (elapsed * frames_left as f64 / frames_done as f64).round_ties_even() as u64
        });

        self.state.last_displayed_fraction = fraction_done;
        self.state.last_sample_time = now;

        Estimate {
            sample: ProgressSample {
                frame: current_frame,
                elapsed_seconds: elapsed,
                fraction_done,
            },
            digits,
            seconds_remaining,
            fps,
        }
    }
}

/// Digits after the decimal point needed for a progress step of `delta`
/// (as a fraction of the whole) to move the displayed percentage.
///
/// Slow progress gets more digits so the display never looks frozen.
pub fn digit_precision(delta: f64) -> u8 {
    if delta > 0.0 {
        (-2.0 - delta.log10())
            .ceil()
            .clamp(MIN_DIGITS as f64, MAX_DIGITS as f64) as u8
    } else {
        MIN_DIGITS
    }
}
