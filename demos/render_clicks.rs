//! Renders the opening of a tempo-ramp practice routine to a WAV file.
//!
//! Plans the routine with the calculator, then runs the metronome over the
//! offline backend with a matching tempo progression and writes the click
//! track it produced.
//!
//! Usage: `cargo run --example render_clicks [output.wav]`

use anyhow::Result;
use woodshed::metronome::{LOOKAHEAD_MS, OfflineRenderer};
use woodshed::{AudioBackend, Metronome, PracticeParams, Progression, SoundType, calculate};

const SAMPLE_RATE: u32 = 44100;

/// Cap on the rendered length, so a long routine still gives a small file.
const MAX_RENDER_SECS: f64 = 30.0;

fn main() -> Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "clicks.wav".to_string());

    let params = PracticeParams {
        start_bpm: 60.0,
        target_bpm: 120.0,
        step_bpm: 10.0,
        beats_per_rep: 4,
        reps_per_step: 2,
        sets: 1,
    };
    let estimate = calculate(&params)?;
    println!(
        "routine: {} -> {} BPM in steps of {} ({} beats per step)",
        params.start_bpm, params.target_bpm, params.step_bpm, estimate.beats_per_step
    );
    println!(
        "exact {:.1}s, approx {:.1}s (error {:+.2}%)",
        estimate.exact_secs, estimate.approx_secs, estimate.error_rate_pct
    );

    let render_secs = estimate.exact_secs.min(MAX_RENDER_SECS);

    let mut metronome = Metronome::new(OfflineRenderer::new(SAMPLE_RATE));
    metronome.set_tempo(params.start_bpm);
    metronome.set_beats_per_bar(params.beats_per_rep);
    metronome.set_sound(SoundType::Wood);
    metronome.set_progression(Some(Progression {
        step_bpm: params.step_bpm,
        bars: params.reps_per_step,
        target_bpm: params.target_bpm,
    }));

    metronome.start()?;
    while metronome.backend().now() < render_secs {
        metronome.run_tick();
        metronome.backend_mut().advance(LOOKAHEAD_MS as f64 / 1000.0);
    }
    metronome.stop();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&output, spec)?;
    for sample in metronome.backend().samples() {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    println!("wrote {:.1}s of clicks to {output}", render_secs);
    Ok(())
}
