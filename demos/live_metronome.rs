//! Interactive terminal metronome on the default audio output.
//!
//! Wraps cpal in an [`AudioBackend`]: the output callback owns a small mixer
//! that counts frames (the monotonic clock) and renders scheduled tones at
//! their exact frame offsets. The main thread drives the housekeeping loop,
//! compensating its sleep with a [`DriftTracker`], and handles keys:
//!
//! - `space` start/stop
//! - `+` / `-` tempo up/down
//! - `1` / `2` / `3` click / wood / beep voice
//! - `s` cycle subdivision, `b` cycle beats per bar
//! - `t` tap tempo, `p` toggle progression, `q` quit

use std::io::{Write, stdout};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, StreamConfig};
use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use woodshed::metronome::{AudioBackend, MAX_BPM, MIN_BPM, ToneRenderer, lookahead};
use woodshed::{DriftTracker, Error, Metronome, Progression, SoundType, TapTempo, Tone};

/// Frame counter plus the tones currently sounding, shared with the audio
/// callback.
#[derive(Default)]
struct Mixer {
    frames: u64,
    active: Vec<(u64, ToneRenderer)>,
}

impl Mixer {
    fn next_sample(&mut self) -> f64 {
        let frame = self.frames;
        self.frames += 1;

        let mut sample = 0.0;
        self.active.retain_mut(|(start, renderer)| {
            if *start > frame {
                return true;
            }
            sample += renderer.next_sample();
            !renderer.is_finished()
        });
        sample
    }
}

/// cpal-backed [`AudioBackend`]; the stream is created lazily on the first
/// `ensure_running` and kept alive for the program's lifetime.
struct CpalBackend {
    sample_rate: u32,
    mixer: Arc<Mutex<Mixer>>,
    stream: Option<cpal::Stream>,
}

impl CpalBackend {
    fn new() -> Self {
        Self {
            sample_rate: 44_100,
            mixer: Arc::new(Mutex::new(Mixer::default())),
            stream: None,
        }
    }

    fn build_stream(&mut self) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no output device available"))?;
        let config = device.default_output_config()?;
        self.sample_rate = config.sample_rate().0;

        let stream = match config.sample_format() {
            SampleFormat::F32 => self.output_stream::<f32>(&device, &config.into())?,
            SampleFormat::I16 => self.output_stream::<i16>(&device, &config.into())?,
            SampleFormat::U16 => self.output_stream::<u16>(&device, &config.into())?,
            format => anyhow::bail!("unsupported sample format: {format}"),
        };
        stream.play()?;
        Ok(stream)
    }

    fn output_stream<T>(&self, device: &cpal::Device, config: &StreamConfig) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + FromSample<f64>,
    {
        let channels = config.channels as usize;
        let mixer = self.mixer.clone();
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut mixer = mixer.lock().unwrap();
                for frame in data.chunks_mut(channels) {
                    let value = T::from_sample(mixer.next_sample());
                    for slot in frame.iter_mut() {
                        *slot = value;
                    }
                }
            },
            |err| eprintln!("audio stream error: {err}"),
            None,
        )?;
        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn now(&self) -> f64 {
        let frames = self.mixer.lock().unwrap().frames;
        frames as f64 / self.sample_rate as f64
    }

    fn ensure_running(&mut self) -> woodshed::Result<()> {
        if self.stream.is_none() {
            let stream = self
                .build_stream()
                .map_err(|err| Error::backend(err.to_string()))?;
            self.stream = Some(stream);
        }
        Ok(())
    }

    fn play(&mut self, tone: Tone) -> woodshed::Result<()> {
        let mut mixer = self.mixer.lock().unwrap();
        let start = (tone.start_time * self.sample_rate as f64).round() as u64;
        // A tone that slipped into the past starts immediately instead.
        let start = start.max(mixer.frames);
        let renderer = ToneRenderer::new(tone, self.sample_rate);
        mixer.active.push((start, renderer));
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut metronome = Metronome::new(CpalBackend::new());
    let mut tap = TapTempo::new();
    let mut drift = DriftTracker::new(lookahead());
    let mut progression_on = false;

    let subdivisions = [1_u32, 2, 3, 4];
    let meters = [4_u32, 3, 2, 6, 0];
    let mut subdivision_index = 0;
    let mut meter_index = 0;

    enable_raw_mode()?;
    let result = run(
        &mut metronome,
        &mut tap,
        &mut drift,
        &mut progression_on,
        &subdivisions,
        &mut subdivision_index,
        &meters,
        &mut meter_index,
    );
    disable_raw_mode()?;
    println!();
    result
}

#[allow(clippy::too_many_arguments)]
fn run(
    metronome: &mut Metronome<CpalBackend>,
    tap: &mut TapTempo,
    drift: &mut DriftTracker,
    progression_on: &mut bool,
    subdivisions: &[u32],
    subdivision_index: &mut usize,
    meters: &[u32],
    meter_index: &mut usize,
) -> Result<()> {
    let started = Instant::now();
    let mut deadline = Instant::now() + lookahead();

    print_status(metronome, *progression_on)?;

    loop {
        let wait = deadline.saturating_duration_since(Instant::now());
        if event::poll(wait)?
            && let Event::Key(key) = event::read()?
        {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char(' ') => {
                    if metronome.is_playing() {
                        metronome.stop();
                    } else {
                        metronome.start()?;
                    }
                }
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    metronome.set_tempo((metronome.tempo() + 5.0).min(MAX_BPM));
                }
                KeyCode::Char('-') => {
                    metronome.set_tempo((metronome.tempo() - 5.0).max(MIN_BPM));
                }
                KeyCode::Char('1') => metronome.set_sound(SoundType::Click),
                KeyCode::Char('2') => metronome.set_sound(SoundType::Wood),
                KeyCode::Char('3') => metronome.set_sound(SoundType::Beep),
                KeyCode::Char('s') => {
                    *subdivision_index = (*subdivision_index + 1) % subdivisions.len();
                    metronome.set_subdivision(subdivisions[*subdivision_index]);
                }
                KeyCode::Char('b') => {
                    *meter_index = (*meter_index + 1) % meters.len();
                    metronome.set_beats_per_bar(meters[*meter_index]);
                }
                KeyCode::Char('t') => {
                    if let Some(bpm) = tap.tap(started.elapsed().as_secs_f64()) {
                        metronome.set_tempo(bpm);
                    }
                }
                KeyCode::Char('p') => {
                    *progression_on = !*progression_on;
                    metronome.set_progression(progression_on.then_some(Progression {
                        step_bpm: 5.0,
                        bars: 2,
                        target_bpm: MAX_BPM,
                    }));
                }
                _ => {}
            }
            print_status(metronome, *progression_on)?;
        }

        let now = Instant::now();
        if now >= deadline {
            drift.record_lateness(now - deadline);
            metronome.run_tick();
            deadline = now + drift.next_delay();
            print_status(metronome, *progression_on)?;
        }
    }

    metronome.stop();
    // Let in-flight clicks decay before tearing the stream down.
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
}

fn print_status(metronome: &Metronome<CpalBackend>, progression_on: bool) -> Result<()> {
    let transport = if metronome.is_playing() { ">" } else { "#" };
    print!(
        "\r{transport} {:>5.1} BPM  {}/{}  {:?}{}   [space +/- 1-3 s b t p q]   ",
        metronome.tempo(),
        metronome.beats_per_bar(),
        metronome.subdivision(),
        metronome.sound(),
        if progression_on { "  ramp" } else { "" },
    );
    stdout().flush()?;
    Ok(())
}
