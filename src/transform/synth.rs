//! Synthetic complex signals for testing.
//!
//! Generates tones, noise and edge-case batches for unit tests, integration
//! tests and benchmarks.

use std::f32::consts::PI;

use super::sample::ComplexSample;

/// Generate a complex exponential `amplitude * e^(j 2π f t)`.
///
/// # Arguments
/// * `frequency` - Frequency in Hz (negative for a clockwise tone)
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples
/// * `amplitude` - Peak magnitude
pub fn generate_tone(
    frequency: f32,
    sample_rate: u32,
    num_samples: usize,
    amplitude: f32,
) -> Vec<ComplexSample> {
    (0..num_samples)
        .map(|i| {
            let phase = 2.0 * PI * frequency * i as f32 / sample_rate as f32;
            ComplexSample::new(amplitude * phase.cos(), amplitude * phase.sin())
        })
        .collect()
}

/// Generate complex white noise with components in `[-amplitude, amplitude]`.
///
/// Uses a simple linear congruential generator for reproducibility.
pub fn generate_noise(num_samples: usize, amplitude: f32, seed: u64) -> Vec<ComplexSample> {
    let mut state = seed;
    let a: u64 = 6364136223846793005;
    let c: u64 = 1442695040888963407;
    let mut next = move || {
        state = state.wrapping_mul(a).wrapping_add(c);
        (state as f32 / u64::MAX as f32) * 2.0 - 1.0
    };

    (0..num_samples)
        .map(|_| {
            let real = amplitude * next();
            let imag = amplitude * next();
            ComplexSample::new(real, imag)
        })
        .collect()
}

/// Noise batch with the origin, the axes and every quadrant mixed in.
pub fn generate_edge_batch(num_samples: usize, seed: u64) -> Vec<ComplexSample> {
    const EDGES: [(f32, f32); 10] = [
        (0.0, 0.0),
        (1.0, 0.0),
        (-1.0, 0.0),
        (0.0, 1.0),
        (0.0, -1.0),
        (3.0, 4.0),
        (-3.0, 4.0),
        (-3.0, -4.0),
        (3.0, -4.0),
        (-1.0, -0.0),
    ];

    let mut samples = generate_noise(num_samples, 100.0, seed);
    for (slot, &(real, imag)) in samples.iter_mut().step_by(7).zip(EDGES.iter().cycle()) {
        *slot = ComplexSample::new(real, imag);
    }
    samples
}
