//! Practice-time estimation for tempo-ramp routines.
//!
//! A tempo-ramp routine plays a fixed phrase repeatedly, nudging the tempo up
//! by a fixed step until it reaches the target: `B` beats per repetition,
//! `R` repetitions at each tempo, stepping from the start tempo to the target
//! in increments of `step_bpm`, and the whole ladder repeated for `sets`
//! sets. [`calculate`] reports how long that takes, both as an exact
//! compensated sum over every tempo step and as a closed-form approximation
//! that costs the same for ten steps or ten thousand.

mod kahan;

pub use kahan::KahanSum;

/// Parameters describing a tempo-ramp practice routine.
///
/// # Examples
///
/// ```
/// use woodshed::PracticeParams;
///
/// // Ramp a 4-beat phrase from 60 to 120 BPM in steps of 10,
/// // playing each tempo twice.
/// let params = PracticeParams {
///     start_bpm: 60.0,
///     target_bpm: 120.0,
///     step_bpm: 10.0,
///     beats_per_rep: 4,
///     reps_per_step: 2,
///     sets: 1,
/// };
/// let estimate = woodshed::calculate(&params).unwrap();
/// assert_eq!(estimate.steps, 6);
/// assert_eq!(estimate.end_bpm, 120.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeParams {
    /// Start tempo in BPM. Must be positive.
    pub start_bpm: f64,
    /// Target tempo in BPM. Must be above `start_bpm`.
    pub target_bpm: f64,
    /// Tempo increment per step, in BPM. Must be positive.
    pub step_bpm: f64,
    /// Beats in one repetition of the phrase. Must be at least 1.
    pub beats_per_rep: u32,
    /// Repetitions played at each tempo step. Must be at least 1.
    pub reps_per_step: u32,
    /// Full passes through the whole ramp. Must be at least 1.
    pub sets: u32,
}

/// A violated [`PracticeParams`] constraint.
///
/// Validation runs before any computation; callers get either a complete
/// [`PracticeEstimate`] or exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// `step_bpm` was zero or negative.
    #[error("tempo step must be positive (got {0})")]
    NonPositiveStep(f64),
    /// `start_bpm` or `target_bpm` was zero or negative.
    #[error("tempos must be positive (start {start}, target {target})")]
    NonPositiveTempo { start: f64, target: f64 },
    /// `target_bpm` did not exceed `start_bpm`.
    #[error("target tempo ({target}) must be above start tempo ({start})")]
    TargetNotAboveStart { start: f64, target: f64 },
    /// A beat, repetition, or set count was zero.
    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },
}

/// The outcome of [`calculate`]: durations plus the derived ramp metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeEstimate {
    /// Total duration from summing every tempo step, in seconds.
    pub exact_secs: f64,
    /// Closed-form continuous-ramp approximation, in seconds.
    pub approx_secs: f64,
    /// Signed relative error of the approximation, in percent.
    ///
    /// Informational only; shrinks as `step_bpm` shrinks toward a
    /// continuous ramp.
    pub error_rate_pct: f64,
    /// Number of step increments actually reached (`n`); zero means the
    /// routine never leaves the start tempo.
    pub steps: u32,
    /// Last tempo actually reached. Below `target_bpm` when the span is not
    /// an exact multiple of the step.
    pub end_bpm: f64,
    /// Beats played at each tempo step (`beats_per_rep * reps_per_step`).
    pub beats_per_step: u32,
    /// Seconds-per-BPM scaling constant for one step's beats (`60 * beats_per_step`).
    pub step_factor: f64,
    /// The validated input parameters.
    pub params: PracticeParams,
}

impl PracticeParams {
    /// Checks every constraint, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.step_bpm <= 0.0 {
            return Err(ValidationError::NonPositiveStep(self.step_bpm));
        }
        if self.start_bpm <= 0.0 || self.target_bpm <= 0.0 {
            return Err(ValidationError::NonPositiveTempo {
                start: self.start_bpm,
                target: self.target_bpm,
            });
        }
        if self.target_bpm <= self.start_bpm {
            return Err(ValidationError::TargetNotAboveStart {
                start: self.start_bpm,
                target: self.target_bpm,
            });
        }
        for (name, count) in [
            ("beats_per_rep", self.beats_per_rep),
            ("reps_per_step", self.reps_per_step),
            ("sets", self.sets),
        ] {
            if count == 0 {
                return Err(ValidationError::ZeroCount { name });
            }
        }
        Ok(())
    }
}

/// Number of whole steps in the ramp: `floor((target - start) / step)`.
///
/// The ratio is snapped to the nearest integer when it lands within 1e-9 of
/// one, so that spans which are exact multiples of the step are not lost to
/// binary rounding (e.g. a 0.1 BPM step over a 27.0 BPM span).
fn step_count(start: f64, target: f64, step: f64) -> u32 {
    let ratio = (target - start) / step;
    let snapped = if (ratio - ratio.round()).abs() < 1e-9 * ratio.max(1.0) {
        ratio.round()
    } else {
        ratio.floor()
    };
    snapped as u32
}

/// Computes the duration of a tempo-ramp routine.
///
/// At tempo `t` BPM each beat lasts `60 / t` seconds, so one step's
/// `beats_per_step` beats take `step_factor / t` seconds. The exact duration
/// sums that term over every reached tempo `start + k * step` using
/// compensated summation; the approximation replaces the sum with a rational
/// function of the ramp's endpoint sum and product.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first violated constraint; no
/// partial results are produced.
///
/// # Examples
///
/// ```
/// use woodshed::{calculate, PracticeParams};
///
/// let params = PracticeParams {
///     start_bpm: 60.0,
///     target_bpm: 120.0,
///     step_bpm: 10.0,
///     beats_per_rep: 4,
///     reps_per_step: 2,
///     sets: 1,
/// };
/// let estimate = calculate(&params).unwrap();
/// assert!(estimate.exact_secs > 0.0);
/// assert!(estimate.error_rate_pct.abs() < 10.0);
/// ```
pub fn calculate(params: &PracticeParams) -> Result<PracticeEstimate, ValidationError> {
    params.validate()?;

    let beats_per_step = params.beats_per_rep * params.reps_per_step;
    let step_factor = 60.0 * beats_per_step as f64;
    let steps = step_count(params.start_bpm, params.target_bpm, params.step_bpm);
    let end_bpm = params.start_bpm + steps as f64 * params.step_bpm;
    let sets = params.sets as f64;

    let mut sum = KahanSum::new();
    for k in 0..=steps {
        let tempo = params.start_bpm + k as f64 * params.step_bpm;
        sum.add(step_factor / tempo);
    }
    let exact_secs = sets * sum.value();

    // Continuous-ramp estimate from the endpoint sum S and product P:
    // an integral term 4nS / (S^2 + 4P) plus an endpoint correction S / 2P.
    // P > 0 is guaranteed by validation, so both divisions are safe.
    let s = params.start_bpm + end_bpm;
    let p = params.start_bpm * end_bpm;
    let integral = 4.0 * steps as f64 * s / (s * s + 4.0 * p);
    let correction = s / (2.0 * p);
    let approx_secs = sets * step_factor * (integral + correction);

    let error_rate_pct = (approx_secs - exact_secs) / exact_secs * 100.0;

    Ok(PracticeEstimate {
        exact_secs,
        approx_secs,
        error_rate_pct,
        steps,
        end_bpm,
        beats_per_step,
        step_factor,
        params: *params,
    })
}
