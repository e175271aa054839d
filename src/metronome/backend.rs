//! The seam between the scheduling engine and the audio platform.

use crate::Result;

use super::voice::Tone;

/// Audio platform capabilities the engine needs: a monotonic clock and
/// sample-accurate tone playback.
///
/// The engine's housekeeping tick is deliberately coarse; precision comes
/// from the backend honouring each [`Tone`]'s absolute `start_time` on its
/// own clock. Implementations must never rewind `now()`.
///
/// [`OfflineRenderer`](super::OfflineRenderer) is the in-crate
/// implementation; a live implementation wraps the platform audio API (see
/// `demos/live_metronome.rs` for a cpal-backed one).
pub trait AudioBackend {
    /// Current time on the backend's monotonic clock, in seconds.
    fn now(&self) -> f64;

    /// Brings the backend up if it is not running yet.
    ///
    /// Called on every [`Metronome::start`](super::Metronome::start); must be
    /// idempotent. A failure leaves the engine stopped, and `start` may be
    /// retried.
    fn ensure_running(&mut self) -> Result<()>;

    /// Schedules a tone to begin exactly at `tone.start_time`.
    ///
    /// A failure affects only this tone; the engine drops the beat's audio
    /// and keeps its timing loop running.
    fn play(&mut self, tone: Tone) -> Result<()>;
}
