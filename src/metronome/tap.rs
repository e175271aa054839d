//! Tap-tempo estimation.

use super::engine::{MAX_BPM, MIN_BPM};

/// Seconds of silence after which the tap history starts over.
const RESET_GAP_SECS: f64 = 2.0;

/// Taps retained for the rolling estimate.
const MAX_TAPS: usize = 4;

/// Estimates a tempo from the user's tap timestamps.
///
/// Keeps the last few taps; the estimate is `60 / mean inter-tap interval`,
/// rounded to a whole BPM and clamped to the supported range. A gap longer
/// than two seconds abandons the history and starts a fresh estimate.
///
/// # Examples
///
/// ```
/// use woodshed::TapTempo;
///
/// let mut tap = TapTempo::new();
/// assert_eq!(tap.tap(0.0), None);
/// assert_eq!(tap.tap(0.5), Some(120.0));
/// assert_eq!(tap.tap(1.0), Some(120.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TapTempo {
    taps: Vec<f64>,
}

impl TapTempo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tap at `timestamp` seconds on any monotonic clock.
    ///
    /// Returns the current tempo estimate once at least two taps are in the
    /// window, otherwise `None`.
    pub fn tap(&mut self, timestamp: f64) -> Option<f64> {
        if let Some(&last) = self.taps.last()
            && timestamp - last > RESET_GAP_SECS
        {
            self.taps.clear();
        }

        self.taps.push(timestamp);
        if self.taps.len() > MAX_TAPS {
            self.taps.remove(0);
        }
        if self.taps.len() < 2 {
            return None;
        }

        let span = self.taps.last().unwrap() - self.taps.first().unwrap();
        let mean_interval = span / (self.taps.len() - 1) as f64;
        Some((60.0 / mean_interval).round().clamp(MIN_BPM, MAX_BPM))
    }

    /// Discards the tap history.
    pub fn reset(&mut self) {
        self.taps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_two_taps() {
        let mut tap = TapTempo::new();
        assert_eq!(tap.tap(10.0), None);
        assert!(tap.tap(10.5).is_some());
    }

    #[test]
    fn test_steady_taps_give_exact_tempo() {
        let mut tap = TapTempo::new();
        let mut estimate = None;
        for i in 0..4 {
            estimate = tap.tap(i as f64 * 0.5);
        }
        assert_eq!(estimate, Some(120.0));
    }

    #[test]
    fn test_window_keeps_last_four_taps() {
        let mut tap = TapTempo::new();
        // Four slow taps, then a burst of fast ones: the estimate must track
        // the recent rate, not the stale history.
        for i in 0..4 {
            tap.tap(i as f64 * 1.0);
        }
        let mut estimate = None;
        for i in 0..4 {
            estimate = tap.tap(3.5 + i as f64 * 0.25);
        }
        assert_eq!(estimate, Some(240.0));
    }

    #[test]
    fn test_long_gap_resets_history() {
        let mut tap = TapTempo::new();
        tap.tap(0.0);
        tap.tap(0.5);
        // More than two seconds of silence: back to square one.
        assert_eq!(tap.tap(5.0), None);
        assert_eq!(tap.tap(5.5), Some(120.0));
    }

    #[test]
    fn test_estimate_is_clamped() {
        let mut tap = TapTempo::new();
        tap.tap(0.0);
        assert_eq!(tap.tap(0.05), Some(MAX_BPM));

        let mut tap = TapTempo::new();
        tap.tap(0.0);
        assert_eq!(tap.tap(1.99), Some(MIN_BPM));
    }

    #[test]
    fn test_explicit_reset() {
        let mut tap = TapTempo::new();
        tap.tap(0.0);
        tap.tap(0.5);
        tap.reset();
        assert_eq!(tap.tap(1.0), None);
    }
}
