//! Progress event throttling.

use framecast_common::config::ExportDefaults;
use framecast_model::{ExportRange, DEFAULT_PROGRESS_EVENTS};

/// How often progress is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottlePolicy {
    /// Approximate number of count-based events per export.
    pub target_events: u64,
    /// A tick is always shown once this many seconds pass without one.
    pub liveness_secs: f64,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            target_events: DEFAULT_PROGRESS_EVENTS,
            liveness_secs: 1.0,
        }
    }
}

impl From<&ExportDefaults> for ThrottlePolicy {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            target_events: defaults.progress_target_events,
            liveness_secs: defaults.liveness_interval_secs,
        }
    }
}

/// Decides which loop iterations are display ticks.
#[derive(Debug, Clone, Copy)]
pub struct ProgressThrottle {
    step: u64,
    liveness_secs: f64,
}

impl ProgressThrottle {
    pub fn new(policy: &ThrottlePolicy, range: &ExportRange) -> Self {
        Self {
            step: range.progress_step(policy.target_events),
            liveness_secs: policy.liveness_secs,
        }
    }

    /// Frame interval of count-based ticks. Never zero.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// A frame is shown when it lands on the step, or when the display has
    /// been idle for longer than the liveness interval.
    pub fn is_display_tick(&self, frame: u64, secs_since_last_display: f64) -> bool {
        frame % self.step == 0 || secs_since_last_display > self.liveness_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_ticks_on_multiples() {
        let range = ExportRange::new(1, 10_001).unwrap();
        let throttle = ProgressThrottle::new(&ThrottlePolicy::default(), &range);
        assert_eq!(throttle.step(), 10);
        assert!(throttle.is_display_tick(20, 0.0));
        assert!(!throttle.is_display_tick(21, 0.5));
    }

    #[test]
    fn test_liveness_fallback_is_strictly_greater() {
        let range = ExportRange::new(1, 100_001).unwrap();
        let throttle = ProgressThrottle::new(&ThrottlePolicy::default(), &range);
        assert!(!throttle.is_display_tick(7, 1.0));
        assert!(throttle.is_display_tick(7, 1.01));
    }

    #[test]
    fn test_two_frame_range_steps_every_frame() {
        let range = ExportRange::new(1, 2).unwrap();
        let throttle = ProgressThrottle::new(&ThrottlePolicy::default(), &range);
        assert_eq!(throttle.step(), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let mut defaults = ExportDefaults::default();
        defaults.progress_target_events = 10;
        defaults.liveness_interval_secs = 0.25;
        let policy = ThrottlePolicy::from(&defaults);
        let range = ExportRange::new(1, 101).unwrap();
        assert_eq!(ProgressThrottle::new(&policy, &range).step(), 10);
        assert_eq!(policy.liveness_secs, 0.25);
    }
}
