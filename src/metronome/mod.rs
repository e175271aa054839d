//! The metronome engine: a look-ahead scheduler over a pluggable audio
//! backend.
//!
//! The engine ([`Metronome`]) owns the beat/bar/subdivision state and an
//! optional tempo progression; the [`AudioBackend`] supplies the monotonic
//! clock and sample-accurate tone playback. [`OfflineRenderer`] is the
//! built-in backend for tests and offline rendering; live backends wrap a
//! platform audio API. [`TapTempo`] and [`DriftTracker`] are small host-side
//! companions: tempo entry by tapping, and timer-cadence compensation.

pub mod backend;
mod drift;
mod engine;
mod offline;
mod tap;
mod voice;

pub use backend::AudioBackend;
pub use drift::DriftTracker;
pub use engine::{
    BeatEvent, LOOKAHEAD_MS, MAX_BPM, MIN_BPM, Metronome, PlayState, Progression,
    SCHEDULE_AHEAD_SECS, lookahead,
};
pub use offline::OfflineRenderer;
pub use tap::TapTempo;
pub use voice::{BeatStrength, SoundType, Tone, ToneRenderer, Waveform};
