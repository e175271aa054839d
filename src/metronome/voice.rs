//! Click voices: short synthesized tones for each beat.
//!
//! Every beat is rendered as a deterministic percussive tone: an oscillator
//! with a few milliseconds of onset and an exponential decay to silence. The
//! three voices differ in waveform and pitch; within a voice, accented beats
//! sit above main beats, which sit above subdivision beats, in both pitch and
//! loudness.

/// Basic oscillator shapes used by the click voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

impl Waveform {
    /// Evaluates one cycle of the waveform at `phase` in `[0, 1)`.
    fn sample(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (phase * std::f64::consts::TAU).sin(),
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// How prominent a beat is within its bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatStrength {
    /// First beat of a bar (only exists when bars are enabled).
    Accent,
    /// Any other beat boundary.
    Main,
    /// A subdivision between beats.
    Sub,
}

impl BeatStrength {
    /// Peak gain for this strength, before the engine's volume is applied.
    /// Ordering (accent > main > sub) is a contract; the exact values are
    /// voicing defaults.
    fn gain(&self) -> f64 {
        match self {
            BeatStrength::Accent => 1.0,
            BeatStrength::Main => 0.7,
            BeatStrength::Sub => 0.45,
        }
    }
}

/// The selectable metronome voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundType {
    /// Bright square-wave click.
    #[default]
    Click,
    /// Rounder triangle-wave knock.
    Wood,
    /// Pure sine beep.
    Beep,
}

impl SoundType {
    fn waveform(&self) -> Waveform {
        match self {
            SoundType::Click => Waveform::Square,
            SoundType::Wood => Waveform::Triangle,
            SoundType::Beep => Waveform::Sine,
        }
    }

    /// Voicing defaults: (frequency in Hz, decay time constant in seconds)
    /// per beat strength.
    fn voicing(&self, strength: BeatStrength) -> (f64, f64) {
        match (self, strength) {
            (SoundType::Click, BeatStrength::Accent) => (1800.0, 0.008),
            (SoundType::Click, BeatStrength::Main) => (1500.0, 0.008),
            (SoundType::Click, BeatStrength::Sub) => (1200.0, 0.008),
            (SoundType::Wood, BeatStrength::Accent) => (900.0, 0.010),
            (SoundType::Wood, BeatStrength::Main) => (750.0, 0.010),
            (SoundType::Wood, BeatStrength::Sub) => (620.0, 0.010),
            (SoundType::Beep, BeatStrength::Accent) => (880.0, 0.010),
            (SoundType::Beep, BeatStrength::Main) => (660.0, 0.010),
            (SoundType::Beep, BeatStrength::Sub) => (440.0, 0.010),
        }
    }

    /// Builds the tone for one beat.
    ///
    /// # Arguments
    ///
    /// * `start_time` - Absolute backend-clock time the tone must begin at
    /// * `strength` - Accent / main / subdivision placement of the beat
    /// * `volume` - Engine volume in `[0, 1]`, multiplied into the peak gain
    pub fn tone(&self, start_time: f64, strength: BeatStrength, volume: f64) -> Tone {
        let (frequency, decay) = self.voicing(strength);
        Tone {
            start_time,
            waveform: self.waveform(),
            frequency,
            amplitude: strength.gain() * volume,
            decay,
            duration: Tone::DEFAULT_DURATION,
        }
    }
}

/// A fully described scheduled tone.
///
/// Carries everything a backend needs to render the sound at an exact time:
/// waveform, pitch, peak amplitude, and the envelope constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Absolute backend-clock time the tone begins, in seconds.
    pub start_time: f64,
    pub waveform: Waveform,
    /// Oscillator frequency in Hz.
    pub frequency: f64,
    /// Peak amplitude in `[0, 1]`.
    pub amplitude: f64,
    /// Exponential decay time constant, in seconds.
    pub decay: f64,
    /// Total rendered length in seconds; the envelope is near-silent well
    /// before this point.
    pub duration: f64,
}

impl Tone {
    /// Default tone length. Short enough that a note fully decays before the
    /// next subdivision even at 250 BPM with sixteenth subdivisions.
    pub const DEFAULT_DURATION: f64 = 0.05;

    /// Linear onset length, to avoid a discontinuity click at the start.
    const ATTACK: f64 = 0.002;

    /// Renders the whole tone into a sample buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use woodshed::metronome::{BeatStrength, SoundType};
    ///
    /// let tone = SoundType::Beep.tone(0.0, BeatStrength::Accent, 1.0);
    /// let samples = tone.render(44100);
    /// assert_eq!(samples.len(), (44100.0 * tone.duration) as usize);
    /// ```
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        ToneRenderer::new(*self, sample_rate).collect()
    }
}

/// Sample-by-sample generator for a [`Tone`].
///
/// Phase-accumulator oscillator under an attack/exponential-decay envelope.
/// Yields exactly `duration * sample_rate` samples.
#[derive(Debug, Clone)]
pub struct ToneRenderer {
    tone: Tone,
    sample_rate: u32,
    phase: f64,
    phase_increment: f64,
    position: usize,
    total_samples: usize,
}

impl ToneRenderer {
    pub fn new(tone: Tone, sample_rate: u32) -> Self {
        Self {
            tone,
            sample_rate,
            phase: 0.0,
            phase_increment: tone.frequency / sample_rate as f64,
            position: 0,
            total_samples: (sample_rate as f64 * tone.duration) as usize,
        }
    }

    /// True once every sample has been produced.
    pub fn is_finished(&self) -> bool {
        self.position >= self.total_samples
    }

    /// Produces the next sample, or silence once the tone has ended.
    pub fn next_sample(&mut self) -> f64 {
        if self.is_finished() {
            return 0.0;
        }

        let t = self.position as f64 / self.sample_rate as f64;
        let envelope = if t < Tone::ATTACK {
            t / Tone::ATTACK
        } else {
            (-(t - Tone::ATTACK) / self.tone.decay).exp()
        };

        let sample = self.tone.amplitude * envelope * self.tone.waveform.sample(self.phase);

        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.position += 1;

        sample
    }
}

impl Iterator for ToneRenderer {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.is_finished() {
            None
        } else {
            Some(self.next_sample() as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |p, s| p.max(s.abs()))
    }

    #[test]
    fn test_render_length() {
        let tone = SoundType::Click.tone(0.0, BeatStrength::Main, 1.0);
        let samples = tone.render(SAMPLE_RATE);
        assert_eq!(samples.len(), (SAMPLE_RATE as f64 * tone.duration) as usize);
    }

    #[test]
    fn test_loudness_ordering_per_voice() {
        for sound in [SoundType::Click, SoundType::Wood, SoundType::Beep] {
            let accent = peak(&sound.tone(0.0, BeatStrength::Accent, 1.0).render(SAMPLE_RATE));
            let main = peak(&sound.tone(0.0, BeatStrength::Main, 1.0).render(SAMPLE_RATE));
            let sub = peak(&sound.tone(0.0, BeatStrength::Sub, 1.0).render(SAMPLE_RATE));

            assert!(accent > main, "{sound:?}: accent {accent} vs main {main}");
            assert!(main > sub, "{sound:?}: main {main} vs sub {sub}");
        }
    }

    #[test]
    fn test_tone_fully_decays_within_duration() {
        // At 250 BPM with sixteenth subdivisions the next note arrives after
        // 60 ms; by then any voice must be below 2% of its peak.
        for sound in [SoundType::Click, SoundType::Wood, SoundType::Beep] {
            for strength in [BeatStrength::Accent, BeatStrength::Main, BeatStrength::Sub] {
                let tone = sound.tone(0.0, strength, 1.0);
                let samples = tone.render(SAMPLE_RATE);
                let tail_start = samples.len() - samples.len() / 20;
                let tail_peak = peak(&samples[tail_start..]);
                assert!(
                    tail_peak < 0.02 * tone.amplitude as f32,
                    "{sound:?}/{strength:?}: tail peak {tail_peak}"
                );
            }
        }
    }

    #[test]
    fn test_volume_scales_amplitude() {
        let loud = peak(&SoundType::Beep.tone(0.0, BeatStrength::Main, 1.0).render(SAMPLE_RATE));
        let soft = peak(&SoundType::Beep.tone(0.0, BeatStrength::Main, 0.5).render(SAMPLE_RATE));
        assert!((loud / 2.0 - soft).abs() < 1e-3);
    }

    #[test]
    fn test_onset_is_ramped() {
        // The very first sample must not jump straight to peak level.
        let tone = SoundType::Click.tone(0.0, BeatStrength::Accent, 1.0);
        let samples = tone.render(SAMPLE_RATE);
        assert!(samples[0].abs() < 0.05);
    }

    #[test]
    fn test_renderer_reports_finished() {
        let tone = SoundType::Wood.tone(0.0, BeatStrength::Sub, 0.8);
        let mut renderer = ToneRenderer::new(tone, SAMPLE_RATE);
        let total = (SAMPLE_RATE as f64 * tone.duration) as usize;

        for _ in 0..total {
            assert!(!renderer.is_finished());
            renderer.next_sample();
        }
        assert!(renderer.is_finished());
        assert_eq!(renderer.next_sample(), 0.0);
    }
}
