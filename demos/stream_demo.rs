//! Example: Stream FFT bins of a synthetic tone through the phase transform.
//!
//! Run with:
//!     cargo run --example stream_demo --features tokio -- [config.json]

use anyhow::{Context, Result};
use complex_accel::pipeline::{DynamicEngine, PipelineConfig};
use complex_accel::transform::synth::generate_tone;
use complex_accel::transform::{ComplexSample, TransformKind};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const SAMPLE_RATE: u32 = 48000;
const FFT_SIZE: usize = 4096;
const FRAMES: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => PipelineConfig {
            verbose: true,
            ..Default::default()
        },
    };

    let mut engine = DynamicEngine::open(TransformKind::MagnitudeAndPhase, &config).await?;
    println!("Complex Accel - Streaming Example");
    println!("=================================\n");
    println!("  Backend: {}", if engine.is_gpu() { "wgpu" } else { "host" });
    println!("  Max items per call: {}\n", engine.max_items_per_call());

    let tone = generate_tone(1500.0, SAMPLE_RATE, FFT_SIZE * FRAMES, 1.0);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);

    let mut mag = vec![0.0f32; FFT_SIZE];
    let mut phase = vec![0.0f32; FFT_SIZE];

    for (frame, chunk) in tone.chunks_exact(FFT_SIZE).enumerate() {
        let mut bins: Vec<Complex<f32>> = chunk.iter().map(|&s| s.into()).collect();
        fft.process(&mut bins);
        let bins: Vec<ComplexSample> = bins.into_iter().map(ComplexSample::from).collect();

        // Feed the streaming engine in calls no larger than it asked for.
        let mut produced = 0;
        while produced < bins.len() {
            let n = engine.max_items_per_call().min(bins.len() - produced);
            let done = engine.dispatch(
                n,
                &bins[produced..],
                &mut [&mut mag[produced..], &mut phase[produced..]],
            )?;
            if done == 0 {
                anyhow::bail!("engine produced no items for frame {}", frame);
            }
            produced += done;
        }

        let (peak, peak_mag) = mag[..FFT_SIZE / 2]
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        let peak_hz = peak as f32 * SAMPLE_RATE as f32 / FFT_SIZE as f32;
        println!(
            "  Frame {}: peak bin {} ({:.1} Hz) magnitude {:.1} phase {:+.4} rad",
            frame, peak, peak_hz, peak_mag, phase[peak]
        );
    }

    Ok(())
}
