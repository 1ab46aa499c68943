//! Clock utilities for export timing.
//!
//! The export loop never reads wall-clock time directly. It asks a [`Clock`]
//! for seconds since an arbitrary epoch, which lets hosts use a monotonic
//! clock and lets tests drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A source of monotonic time in seconds.
pub trait Clock: Send + Sync {
    /// Seconds elapsed since the clock's epoch. Never decreases.
    fn now_secs(&self) -> f64;
}

/// A monotonic clock anchored to the moment it was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    /// The instant the clock started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl MonotonicClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Wall-clock time at clock start, for logs.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to
/// the export loop and advance another from inside a sink.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `secs` seconds. Negative values are ignored.
    pub fn advance_secs(&self, secs: f64) {
        if secs > 0.0 {
            self.nanos.fetch_add(secs_to_ns(secs), Ordering::SeqCst);
        }
    }

    /// Jump to an absolute time, if it is not in the past.
    pub fn set_secs(&self, secs: f64) {
        let target = secs_to_ns(secs.max(0.0));
        self.nanos.fetch_max(target, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        ns_to_secs(self.nanos.load(Ordering::SeqCst))
    }
}

/// Convert a nanosecond value to seconds.
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Convert seconds to nanoseconds.
pub fn secs_to_ns(secs: f64) -> u64 {
    (secs * 1_000_000_000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_elapsed() {
        let clock = MonotonicClock::start();
        let first = clock.now_secs();
        let second = clock.now_secs();
        assert!(first >= 0.0);
        assert!(second >= first);
        assert!(second < 1.0);
    }

    #[test]
    fn test_epoch_wall_is_rfc3339() {
        let before = chrono::Utc::now();
        let clock = MonotonicClock::start();
        let wall = chrono::DateTime::parse_from_rfc3339(clock.epoch_wall()).unwrap();
        assert!(wall.timestamp() >= before.timestamp() - 1);
    }

    #[test]
    fn test_ns_to_secs_conversion() {
        assert!((ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
        assert_eq!(secs_to_ns(2.0), 2_000_000_000);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        assert_eq!(clock.now_secs(), 0.0);

        handle.advance_secs(1.25);
        assert!((clock.now_secs() - 1.25).abs() < 1e-9);

        handle.advance_secs(-5.0);
        assert!((clock.now_secs() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.set_secs(10.0);
        clock.set_secs(3.0);
        assert!((clock.now_secs() - 10.0).abs() < 1e-9);
    }
}
