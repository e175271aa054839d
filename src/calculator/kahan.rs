//! Compensated (Kahan) summation.

/// A compensated floating-point accumulator.
///
/// Keeps a running compensation term alongside the sum, recovering the
/// low-order bits that a plain `+=` would discard. The accumulated rounding
/// error stays bounded by a small constant regardless of how many terms are
/// added, where naive summation's error grows with the term count.
///
/// The practice-time calculator adds hundreds of per-step durations whose
/// magnitudes differ widely (slow early steps dominate fast late ones), which
/// is exactly the shape of input that punishes naive accumulation.
///
/// # Examples
///
/// ```
/// use woodshed::KahanSum;
///
/// let mut sum = KahanSum::new();
/// for k in 1..=1000 {
///     sum.add(1.0 / k as f64);
/// }
/// // Harmonic number H_1000
/// assert!((sum.value() - 7.485470860550345).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, folding in the compensation from previous additions.
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// Returns the current compensated sum.
    pub fn value(&self) -> f64 {
        self.sum
    }
}

impl Extend<f64> for KahanSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for KahanSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = Self::new();
        sum.extend(iter);
        sum
    }
}
