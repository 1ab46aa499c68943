//! Inclusive frame ranges.

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Default number of progress events an export aims for.
pub const DEFAULT_PROGRESS_EVENTS: u64 = 1000;

/// An inclusive, validated range of 1-based frame numbers.
///
/// A range always spans at least two frames: an export whose start and end
/// coincide is rejected here, before any export loop sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct ExportRange {
    start_frame: u64,
    end_frame: u64,
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    start_frame: u64,
    end_frame: u64,
}

impl ExportRange {
    /// Validate and build a range.
    pub fn new(start_frame: u64, end_frame: u64) -> Result<Self, ModelError> {
        if start_frame == 0 || start_frame >= end_frame {
            return Err(ModelError::InvalidRange {
                start: start_frame,
                end: end_frame,
            });
        }
        Ok(Self {
            start_frame,
            end_frame,
        })
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> u64 {
        self.end_frame
    }

    /// Distance between the first and last frame.
    pub fn span(&self) -> u64 {
        self.end_frame - self.start_frame
    }

    /// Number of frames the range covers (both ends included).
    pub fn frame_count(&self) -> u64 {
        self.span() + 1
    }

    /// Fraction of the range completed when `frame` is the current frame.
    ///
    /// Frames outside the range are clamped into `[0.0, 1.0]`.
    pub fn fraction_at(&self, frame: u64) -> f64 {
        fraction_between(self.start_frame, self.end_frame, frame)
    }

    /// Frame interval between count-based progress events.
    ///
    /// Keeps the number of events near `target_events` regardless of range
    /// length. Always at least 1.
    pub fn progress_step(&self, target_events: u64) -> u64 {
        let target = target_events.max(1) as f64;
        let step = (self.span() as f64 / target).round_ties_even() as u64;
        step.max(1)
    }

    /// Iterate over every frame in ascending order.
    pub fn frames(&self) -> std::ops::RangeInclusive<u64> {
        self.start_frame..=self.end_frame
    }
}

/// Completion fraction of `frame` within `start..=end`.
///
/// A zero-length span counts as fully complete.
pub fn fraction_between(start: u64, end: u64, frame: u64) -> f64 {
    if end <= start {
        return 1.0;
    }
    let done = frame.saturating_sub(start) as f64;
    (done / (end - start) as f64).clamp(0.0, 1.0)
}

impl TryFrom<RawRange> for ExportRange {
    type Error = ModelError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.start_frame, raw.end_frame)
    }
}

impl From<ExportRange> for RawRange {
    fn from(range: ExportRange) -> Self {
        Self {
            start_frame: range.start_frame,
            end_frame: range.end_frame,
        }
    }
}
