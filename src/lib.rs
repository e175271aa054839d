//! Woodshed - practice-time planning and a drift-resistant metronome.
//!
//! Two independent engines, composed only by the caller:
//!
//! - [`calculator`]: a pure function from tempo-ramp practice parameters to
//!   exact and approximate durations, with compensated summation and a
//!   quantified approximation error.
//! - [`metronome`]: a stateful look-ahead scheduler that drives synthesized
//!   click voices through a pluggable audio backend, with meter, subdivision,
//!   and automatic tempo progression.

pub mod calculator;
pub mod error;
pub mod metronome;

// Re-export commonly used types at the crate root
pub use calculator::{KahanSum, PracticeEstimate, PracticeParams, ValidationError, calculate};
pub use error::{Error, Result};
pub use metronome::{
    AudioBackend, BeatEvent, DriftTracker, Metronome, OfflineRenderer, PlayState, Progression,
    SoundType, TapTempo, Tone,
};
