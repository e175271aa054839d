//! Host-timer drift compensation.

use std::time::Duration;

/// Exponentially weighted estimate of how late the host's housekeeping timer
/// fires.
///
/// The look-ahead engine already tolerates tick jitter; this helper is an
/// optional layer for hosts that sleep between [`run_tick`] calls and want
/// the average cadence to stay on target. Record each tick's observed
/// lateness and sleep for [`next_delay`] instead of the nominal interval.
///
/// [`run_tick`]: super::Metronome::run_tick
/// [`next_delay`]: DriftTracker::next_delay
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use woodshed::DriftTracker;
///
/// let mut drift = DriftTracker::new(Duration::from_millis(25));
/// // The timer keeps firing ~2 ms late...
/// for _ in 0..50 {
///     drift.record_lateness(Duration::from_millis(2));
/// }
/// // ...so the recommended sleep settles near 23 ms.
/// assert!(drift.next_delay() < Duration::from_millis(25));
/// ```
#[derive(Debug, Clone)]
pub struct DriftTracker {
    interval: Duration,
    smoothing: f64,
    estimate_secs: f64,
}

impl DriftTracker {
    const DEFAULT_SMOOTHING: f64 = 0.1;

    /// Creates a tracker around the nominal tick interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            smoothing: Self::DEFAULT_SMOOTHING,
            estimate_secs: 0.0,
        }
    }

    /// Overrides the smoothing factor; higher reacts faster, lower is
    /// steadier.
    ///
    /// # Panics
    ///
    /// Panics if `smoothing` is outside `(0, 1]`.
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        assert!(
            smoothing > 0.0 && smoothing <= 1.0,
            "smoothing must be within (0, 1]"
        );
        self.smoothing = smoothing;
        self
    }

    /// Feeds one observation of how late the tick fired.
    pub fn record_lateness(&mut self, lateness: Duration) {
        self.estimate_secs += self.smoothing * (lateness.as_secs_f64() - self.estimate_secs);
    }

    /// Current lateness estimate.
    pub fn estimate(&self) -> Duration {
        Duration::from_secs_f64(self.estimate_secs.max(0.0))
    }

    /// Sleep time that keeps the average cadence at the nominal interval;
    /// never negative.
    pub fn next_delay(&self) -> Duration {
        self.interval.saturating_sub(self.estimate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_nominal_interval() {
        let drift = DriftTracker::new(Duration::from_millis(25));
        assert_eq!(drift.next_delay(), Duration::from_millis(25));
    }

    #[test]
    fn test_converges_to_constant_lateness() {
        let mut drift = DriftTracker::new(Duration::from_millis(25));
        for _ in 0..200 {
            drift.record_lateness(Duration::from_millis(3));
        }
        let estimate = drift.estimate().as_secs_f64();
        assert!((estimate - 0.003).abs() < 1e-4);
        let delay = drift.next_delay().as_secs_f64();
        assert!((delay - 0.022).abs() < 1e-4);
    }

    #[test]
    fn test_delay_never_goes_negative() {
        let mut drift = DriftTracker::new(Duration::from_millis(25)).with_smoothing(1.0);
        drift.record_lateness(Duration::from_millis(100));
        assert_eq!(drift.next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_smoothing_dampens_outliers() {
        let mut steady = DriftTracker::new(Duration::from_millis(25)).with_smoothing(0.05);
        for _ in 0..100 {
            steady.record_lateness(Duration::from_millis(2));
        }
        let before = steady.estimate();
        steady.record_lateness(Duration::from_millis(50));
        let after = steady.estimate();
        // One wild observation moves the estimate only slightly.
        assert!(after < before + Duration::from_millis(3));
    }

    #[test]
    #[should_panic(expected = "smoothing must be within (0, 1]")]
    fn test_invalid_smoothing_panics() {
        let _ = DriftTracker::new(Duration::from_millis(25)).with_smoothing(0.0);
    }
}
