//! Look-ahead metronome engine.
//!
//! The engine never schedules "the next beat" reactively. The host calls
//! [`Metronome::run_tick`] on a coarse cadence (every [`LOOKAHEAD_MS`]
//! milliseconds or so); each tick scans [`SCHEDULE_AHEAD_SECS`] into the
//! future on the backend's clock and hands every beat falling in that window
//! to the backend with its exact target timestamp. Timer jitter therefore
//! never compounds: however late a housekeeping tick fires, the beats it
//! schedules still land on the audio clock's grid, and cumulative drift is
//! bounded by a single tick's jitter.

use std::time::Duration;

use log::{debug, warn};

use crate::Result;

use super::backend::AudioBackend;
use super::voice::{BeatStrength, SoundType};

/// Lowest tempo the UI range supports. The engine itself tolerates any
/// positive BPM; this bound is for tap-tempo clamping and hosts.
pub const MIN_BPM: f64 = 30.0;
/// Highest tempo the UI range supports.
pub const MAX_BPM: f64 = 250.0;

/// Recommended housekeeping cadence, in milliseconds.
pub const LOOKAHEAD_MS: u64 = 25;
/// How far past "now" each housekeeping tick schedules, in seconds.
pub const SCHEDULE_AHEAD_SECS: f64 = 0.1;

/// Offset of the first beat after `start`, so it is never in the past by the
/// time the first housekeeping tick runs.
const START_EPSILON_SECS: f64 = 0.005;

/// Recommended housekeeping cadence as a [`Duration`].
pub fn lookahead() -> Duration {
    Duration::from_millis(LOOKAHEAD_MS)
}

/// Transport state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// One scheduled beat, as reported to the beat observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Absolute backend-clock time the beat sounds at, in seconds.
    pub time: f64,
    /// Beat index within the bar (always 0 when bars are disabled).
    pub beat_in_bar: u32,
    /// Subdivision index within the beat; 0 is the beat itself.
    pub subdivision: u32,
    /// True on beat boundaries (subdivision index 0).
    pub is_main: bool,
    /// True on the first beat of a bar; never true when bars are disabled.
    pub is_accent: bool,
}

/// Automatic tempo ramp: raise the tempo by `step_bpm` every `bars` completed
/// bars, never past `target_bpm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progression {
    /// BPM added at each advance. Must be positive.
    pub step_bpm: f64,
    /// Completed bars between advances. Must be at least 1.
    pub bars: u32,
    /// Ceiling the tempo is clamped to. Must be positive.
    pub target_bpm: f64,
}

/// The metronome engine.
///
/// Owns its timing state and an [`AudioBackend`]; everything runs on the
/// caller's single thread of control. Setters may be called at any time and
/// take effect from the next beat computed after the call.
///
/// # Examples
///
/// ```
/// use woodshed::metronome::{Metronome, OfflineRenderer};
///
/// let mut metronome = Metronome::new(OfflineRenderer::new(44100));
/// metronome.set_tempo(100.0);
/// metronome.set_subdivision(2);
/// metronome.start().unwrap();
///
/// // Host loop: housekeeping tick, then let the clock move on.
/// for _ in 0..40 {
///     metronome.run_tick();
///     metronome.backend_mut().advance(0.025);
/// }
/// metronome.stop();
/// assert!(!metronome.is_playing());
/// ```
pub struct Metronome<B: AudioBackend> {
    backend: B,
    state: PlayState,
    tempo: f64,
    beats_per_bar: u32,
    subdivision: u32,
    sound: SoundType,
    volume: f64,
    current_beat_in_bar: u32,
    current_subdivision: u32,
    next_note_time: f64,
    progression: Option<Progression>,
    bars_elapsed: u32,
    beat_hook: Option<Box<dyn FnMut(BeatEvent)>>,
    tempo_hook: Option<Box<dyn FnMut(f64)>>,
}

impl<B: AudioBackend> Metronome<B> {
    /// Creates a stopped engine with default settings: 120 BPM, 4 beats per
    /// bar, quarter-note subdivision, click voice, volume 0.8.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: PlayState::Stopped,
            tempo: 120.0,
            beats_per_bar: 4,
            subdivision: 1,
            sound: SoundType::default(),
            volume: 0.8,
            current_beat_in_bar: 0,
            current_subdivision: 0,
            next_note_time: 0.0,
            progression: None,
            bars_elapsed: 0,
            beat_hook: None,
            tempo_hook: None,
        }
    }

    /// Starts playback. A no-op while already playing.
    ///
    /// Resets the beat and subdivision counters and places the first beat a
    /// few milliseconds ahead of the backend clock.
    ///
    /// # Errors
    ///
    /// Propagates the backend's bring-up failure; the engine stays stopped
    /// and `start` may be retried.
    pub fn start(&mut self) -> Result<()> {
        if self.state == PlayState::Playing {
            return Ok(());
        }
        self.backend.ensure_running()?;
        self.current_beat_in_bar = 0;
        self.current_subdivision = 0;
        self.bars_elapsed = 0;
        self.next_note_time = self.backend.now() + START_EPSILON_SECS;
        self.state = PlayState::Playing;
        Ok(())
    }

    /// Stops scheduling and resets the counters.
    ///
    /// Beats already handed to the backend inside the look-ahead window play
    /// out; their envelopes decay on their own, so there is no cutoff click.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.current_beat_in_bar = 0;
        self.current_subdivision = 0;
        self.bars_elapsed = 0;
    }

    /// Housekeeping tick: schedules every beat due within the look-ahead
    /// window. Call this every [`LOOKAHEAD_MS`] milliseconds while playing;
    /// calling it while stopped does nothing.
    pub fn run_tick(&mut self) {
        if self.state != PlayState::Playing {
            return;
        }
        let horizon = self.backend.now() + SCHEDULE_AHEAD_SECS;
        while self.next_note_time < horizon {
            self.schedule_note();
            self.advance();
        }
    }

    /// Schedules the note at `next_note_time` and notifies the beat observer.
    fn schedule_note(&mut self) {
        let is_main = self.current_subdivision == 0;
        let is_accent = is_main && self.beats_per_bar > 0 && self.current_beat_in_bar == 0;
        let strength = if is_accent {
            BeatStrength::Accent
        } else if is_main {
            BeatStrength::Main
        } else {
            BeatStrength::Sub
        };

        let tone = self.sound.tone(self.next_note_time, strength, self.volume);
        if let Err(err) = self.backend.play(tone) {
            // A single missed click is recoverable; timing continuity is not.
            warn!("dropping beat at {:.3}s: {err}", self.next_note_time);
        }

        if let Some(hook) = &mut self.beat_hook {
            hook(BeatEvent {
                time: self.next_note_time,
                beat_in_bar: self.current_beat_in_bar,
                subdivision: self.current_subdivision,
                is_main,
                is_accent,
            });
        }
    }

    /// Advances `next_note_time` by one subdivision and wraps the counters.
    fn advance(&mut self) {
        let seconds_per_subdivision = 60.0 / self.tempo / self.subdivision as f64;
        self.next_note_time += seconds_per_subdivision;

        self.current_subdivision += 1;
        if self.current_subdivision < self.subdivision {
            return;
        }
        self.current_subdivision = 0;

        if self.beats_per_bar == 0 {
            // Free-running stream: no bar cycle, no progression.
            self.current_beat_in_bar = 0;
            return;
        }

        self.current_beat_in_bar += 1;
        if self.current_beat_in_bar >= self.beats_per_bar {
            self.current_beat_in_bar = 0;
            self.complete_bar();
        }
    }

    /// Bar-completion bookkeeping: advances the tempo progression.
    fn complete_bar(&mut self) {
        let Some(progression) = self.progression else {
            return;
        };
        self.bars_elapsed += 1;
        if self.bars_elapsed < progression.bars {
            return;
        }
        self.bars_elapsed = 0;
        if self.tempo >= progression.target_bpm {
            return;
        }
        self.tempo = (self.tempo + progression.step_bpm).min(progression.target_bpm);
        debug!("progression advanced tempo to {} BPM", self.tempo);
        if let Some(hook) = &mut self.tempo_hook {
            hook(self.tempo);
        }
    }

    /// Sets the tempo. Takes effect from the next beat computed.
    ///
    /// # Panics
    ///
    /// Panics if `bpm` is not positive.
    pub fn set_tempo(&mut self, bpm: f64) {
        assert!(bpm > 0.0, "BPM must be greater than 0");
        self.tempo = bpm;
    }

    /// Sets the meter numerator; 0 disables bars and accents entirely.
    pub fn set_beats_per_bar(&mut self, beats: u32) {
        self.beats_per_bar = beats;
        if self.current_beat_in_bar >= beats {
            self.current_beat_in_bar = 0;
        }
    }

    /// Sets subdivisions per beat (1 = quarters, 2 = eighths, 3 = triplets,
    /// 4 = sixteenths).
    ///
    /// # Panics
    ///
    /// Panics if `subdivision` is 0.
    pub fn set_subdivision(&mut self, subdivision: u32) {
        assert!(subdivision > 0, "subdivision must be greater than 0");
        self.subdivision = subdivision;
        if self.current_subdivision >= subdivision {
            self.current_subdivision = 0;
        }
    }

    /// Selects the click voice.
    pub fn set_sound(&mut self, sound: SoundType) {
        self.sound = sound;
    }

    /// Sets the output volume.
    ///
    /// # Panics
    ///
    /// Panics if `volume` is outside `[0, 1]`.
    pub fn set_volume(&mut self, volume: f64) {
        assert!(
            (0.0..=1.0).contains(&volume),
            "volume must be within [0, 1]"
        );
        self.volume = volume;
    }

    /// Enables or disables the automatic tempo ramp. Enabling restarts the
    /// bar count.
    ///
    /// # Panics
    ///
    /// Panics if an enabled progression has a non-positive step or target,
    /// or zero bars.
    pub fn set_progression(&mut self, progression: Option<Progression>) {
        if let Some(p) = &progression {
            assert!(p.step_bpm > 0.0, "progression step must be greater than 0");
            assert!(p.bars > 0, "progression bars must be greater than 0");
            assert!(
                p.target_bpm > 0.0,
                "progression target must be greater than 0"
            );
        }
        self.progression = progression;
        self.bars_elapsed = 0;
    }

    /// Registers the beat observer, called once per scheduled beat with its
    /// precise target timestamp.
    pub fn on_beat(&mut self, hook: impl FnMut(BeatEvent) + 'static) {
        self.beat_hook = Some(Box::new(hook));
    }

    /// Registers the tempo observer, called only when the progression
    /// auto-advances the tempo.
    pub fn on_tempo_change(&mut self, hook: impl FnMut(f64) + 'static) {
        self.tempo_hook = Some(Box::new(hook));
    }

    /// Current tempo in BPM.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Current meter numerator (0 = bars disabled).
    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// Current subdivisions per beat.
    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    /// Currently selected voice.
    pub fn sound(&self) -> SoundType {
        self.sound
    }

    /// Current output volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Current transport state.
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// True while playing.
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Borrows the audio backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutably borrows the audio backend (e.g. to advance an offline clock).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::Error;
    use crate::metronome::voice::Tone;

    /// Backend with an externally driven clock that records every tone.
    struct TestBackend {
        clock: Rc<Cell<f64>>,
        tones: Rc<RefCell<Vec<Tone>>>,
        fail_play: bool,
    }

    impl AudioBackend for TestBackend {
        fn now(&self) -> f64 {
            self.clock.get()
        }

        fn ensure_running(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn play(&mut self, tone: Tone) -> crate::Result<()> {
            if self.fail_play {
                return Err(Error::backend("synthesis unavailable"));
            }
            self.tones.borrow_mut().push(tone);
            Ok(())
        }
    }

    struct Harness {
        metronome: Metronome<TestBackend>,
        clock: Rc<Cell<f64>>,
        tones: Rc<RefCell<Vec<Tone>>>,
        events: Rc<RefCell<Vec<BeatEvent>>>,
    }

    fn harness() -> Harness {
        harness_with(false)
    }

    fn harness_with(fail_play: bool) -> Harness {
        let clock = Rc::new(Cell::new(0.0));
        let tones = Rc::new(RefCell::new(Vec::new()));
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut metronome = Metronome::new(TestBackend {
            clock: clock.clone(),
            tones: tones.clone(),
            fail_play,
        });
        let sink = events.clone();
        metronome.on_beat(move |event| sink.borrow_mut().push(event));

        Harness {
            metronome,
            clock,
            tones,
            events,
        }
    }

    impl Harness {
        /// Drives the housekeeping loop with a 25 ms tick until the clock
        /// reaches `until` seconds.
        fn run_until(&mut self, until: f64) {
            while self.clock.get() < until {
                self.metronome.run_tick();
                self.clock.set(self.clock.get() + LOOKAHEAD_MS as f64 / 1000.0);
            }
            self.metronome.run_tick();
        }

        fn events_before(&self, time: f64) -> Vec<BeatEvent> {
            self.events
                .borrow()
                .iter()
                .copied()
                .filter(|e| e.time < time)
                .collect()
        }
    }

    #[test]
    fn test_two_seconds_at_120_fires_four_beats() {
        let mut h = harness();
        h.metronome.set_tempo(120.0);
        h.metronome.set_beats_per_bar(4);
        h.metronome.set_subdivision(1);
        h.metronome.start().unwrap();
        h.run_until(2.0);

        let beats = h.events_before(2.0);
        assert_eq!(beats.len(), 4);
        for pair in beats.windows(2) {
            assert!((pair[1].time - pair[0].time - 0.5).abs() < 1e-9);
        }
        // Every scheduled tone landed, one per beat event.
        assert!(h.tones.borrow().len() >= 4);
    }

    #[test]
    fn test_next_note_time_strictly_increases() {
        let mut h = harness();
        h.metronome.set_subdivision(3);
        h.metronome.start().unwrap();
        h.run_until(3.0);

        let events = h.events.borrow();
        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[1].time > pair[0].time);
        }
    }

    #[test]
    fn test_counters_stay_in_range() {
        let mut h = harness();
        h.metronome.set_beats_per_bar(3);
        h.metronome.set_subdivision(4);
        h.metronome.start().unwrap();
        h.run_until(4.0);

        for event in h.events.borrow().iter() {
            assert!(event.beat_in_bar < 3);
            assert!(event.subdivision < 4);
        }
    }

    #[test]
    fn test_accent_cycle_follows_bar() {
        let mut h = harness();
        h.metronome.set_tempo(120.0);
        h.metronome.set_beats_per_bar(4);
        h.metronome.start().unwrap();
        h.run_until(4.0);

        let events = h.events.borrow();
        for (index, event) in events.iter().enumerate() {
            assert_eq!(event.is_accent, index % 4 == 0);
            assert!(event.is_main);
        }
    }

    #[test]
    fn test_no_accents_when_bars_disabled() {
        let mut h = harness();
        h.metronome.set_beats_per_bar(0);
        h.metronome.set_subdivision(2);
        h.metronome.start().unwrap();
        h.run_until(4.0);

        let events = h.events.borrow();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| !e.is_accent));
        // Beat boundaries are still flagged as main.
        assert!(events.iter().any(|e| e.is_main));
        assert!(events.iter().all(|e| e.beat_in_bar == 0));
    }

    #[test]
    fn test_progression_steps_and_clamps() {
        let mut h = harness();
        h.metronome.set_tempo(120.0);
        h.metronome.set_beats_per_bar(4);
        h.metronome.set_progression(Some(Progression {
            step_bpm: 5.0,
            bars: 2,
            target_bpm: 140.0,
        }));

        let tempi = Rc::new(RefCell::new(Vec::new()));
        let sink = tempi.clone();
        h.metronome.on_tempo_change(move |bpm| sink.borrow_mut().push(bpm));

        h.metronome.start().unwrap();
        // Plenty of bars: tempo must climb 125, 130, 135, 140 and then hold.
        h.run_until(60.0);

        assert_eq!(*tempi.borrow(), vec![125.0, 130.0, 135.0, 140.0]);
        assert_eq!(h.metronome.tempo(), 140.0);
    }

    #[test]
    fn test_progression_advances_after_each_bars_window() {
        let mut h = harness();
        h.metronome.set_tempo(120.0);
        h.metronome.set_beats_per_bar(4);
        h.metronome.set_progression(Some(Progression {
            step_bpm: 5.0,
            bars: 2,
            target_bpm: 140.0,
        }));
        h.metronome.start().unwrap();

        // Two bars at 120 BPM are 4 seconds; stop the clock just after the
        // second bar line enters the window.
        h.run_until(4.0);
        assert_eq!(h.metronome.tempo(), 125.0);
    }

    #[test]
    fn test_tempo_change_applies_from_next_beat() {
        let mut h = harness();
        h.metronome.set_tempo(60.0);
        h.metronome.start().unwrap();

        h.run_until(1.2);
        h.metronome.set_tempo(120.0);
        h.run_until(3.0);

        let events = h.events.borrow();
        let gaps: Vec<f64> = events.windows(2).map(|p| p[1].time - p[0].time).collect();
        assert!((gaps[0] - 1.0).abs() < 1e-9);
        assert!((gaps[gaps.len() - 1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_stop_start_resets_without_replay() {
        let mut h = harness();
        h.metronome.set_tempo(120.0);
        h.metronome.set_beats_per_bar(4);
        h.metronome.start().unwrap();
        h.run_until(1.3);

        h.metronome.stop();
        assert!(!h.metronome.is_playing());
        let stopped_at = h.clock.get();
        let count_at_stop = h.events.borrow().len();

        h.metronome.start().unwrap();
        h.run_until(stopped_at + 1.0);

        let events = h.events.borrow();
        assert!(events.len() > count_at_stop);
        let first_after_restart = events[count_at_stop];
        // Counters restart at the bar top and nothing replays from the past.
        assert!(first_after_restart.is_accent);
        assert_eq!(first_after_restart.beat_in_bar, 0);
        assert!(first_after_restart.time >= stopped_at);
    }

    #[test]
    fn test_reentrant_start_is_noop() {
        let mut h = harness();
        h.metronome.set_tempo(120.0);
        h.metronome.start().unwrap();
        h.run_until(1.0);
        let scheduled = h.events.borrow().len();

        // Starting again while playing must not rewind the schedule.
        h.metronome.start().unwrap();
        h.metronome.run_tick();
        assert_eq!(h.events.borrow().len(), scheduled);
    }

    #[test]
    fn test_play_failure_drops_audio_keeps_timing() {
        let mut h = harness_with(true);
        h.metronome.set_tempo(120.0);
        h.metronome.start().unwrap();
        h.run_until(2.0);

        // No audio made it out, but the beat observer kept firing on grid.
        assert!(h.tones.borrow().is_empty());
        let beats = h.events_before(2.0);
        assert_eq!(beats.len(), 4);
    }

    #[test]
    fn test_run_tick_while_stopped_does_nothing() {
        let mut h = harness();
        h.metronome.run_tick();
        h.clock.set(5.0);
        h.metronome.run_tick();
        assert!(h.events.borrow().is_empty());
        assert!(h.tones.borrow().is_empty());
    }

    #[test]
    #[should_panic(expected = "BPM must be greater than 0")]
    fn test_invalid_tempo_panics() {
        let mut h = harness();
        h.metronome.set_tempo(0.0);
    }

    #[test]
    #[should_panic(expected = "subdivision must be greater than 0")]
    fn test_invalid_subdivision_panics() {
        let mut h = harness();
        h.metronome.set_subdivision(0);
    }
}
