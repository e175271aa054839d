//! Offline audio backend: mixes scheduled tones into a sample buffer.

use crate::{Error, Result};

use super::backend::AudioBackend;
use super::voice::Tone;

/// An [`AudioBackend`] without a sound card.
///
/// Tones are rendered immediately at the exact sample offset their
/// `start_time` maps to; the monotonic clock is a frame counter the host
/// advances explicitly. Used by tests and by offline rendering (e.g. writing
/// a routine's click track to a WAV file).
///
/// # Examples
///
/// ```
/// use woodshed::AudioBackend;
/// use woodshed::metronome::{Metronome, OfflineRenderer};
///
/// let mut metronome = Metronome::new(OfflineRenderer::new(44100));
/// metronome.start().unwrap();
/// while metronome.backend().now() < 2.0 {
///     metronome.run_tick();
///     metronome.backend_mut().advance(0.025);
/// }
/// let samples = metronome.backend().samples();
/// assert!(samples.iter().any(|s| *s != 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct OfflineRenderer {
    sample_rate: u32,
    clock_frames: u64,
    samples: Vec<f32>,
}

impl OfflineRenderer {
    /// Creates a renderer with its clock at zero and an empty buffer.
    pub fn new(sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be greater than 0");
        Self {
            sample_rate,
            clock_frames: 0,
            samples: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Moves the clock forward. The host calls this between housekeeping
    /// ticks to simulate real time passing.
    pub fn advance(&mut self, seconds: f64) {
        assert!(seconds >= 0.0, "the clock cannot rewind");
        self.clock_frames += (seconds * self.sample_rate as f64).round() as u64;
    }

    /// Everything rendered so far, mono at [`sample_rate`](Self::sample_rate).
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consumes the renderer, returning the rendered buffer.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Maps an absolute time to a frame offset in the buffer.
    fn frame_at(&self, time: f64) -> u64 {
        (time * self.sample_rate as f64).round() as u64
    }
}

impl AudioBackend for OfflineRenderer {
    fn now(&self) -> f64 {
        self.clock_frames as f64 / self.sample_rate as f64
    }

    fn ensure_running(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self, tone: Tone) -> Result<()> {
        if tone.start_time < 0.0 {
            return Err(Error::backend(format!(
                "cannot schedule a tone at negative time {}",
                tone.start_time
            )));
        }

        let offset = self.frame_at(tone.start_time) as usize;
        let rendered = tone.render(self.sample_rate);

        let end = offset + rendered.len();
        if self.samples.len() < end {
            self.samples.resize(end, 0.0);
        }
        for (slot, sample) in self.samples[offset..end].iter_mut().zip(&rendered) {
            *slot += sample;
        }
        Ok(())
    }
}
