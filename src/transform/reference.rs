//! Host reference path.
//!
//! Computes the same transforms as the device kernels without an
//! accelerator. Used as the fallback when no kernel is available and as the
//! oracle in host/device comparison tests.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use super::sample::ComplexSample;
use super::variant::{OutputKind, TransformVariant};

/// Upper bound on `|fast_atan2f(y, x) - atan2(y, x)|` in radians.
///
/// The polynomial itself stays within 1e-5; the bound leaves room for f32
/// rounding in the range reduction.
pub const FAST_ATAN2_MAX_ERROR: f32 = 1e-4;

const LANES: usize = 8;

/// Minimax odd polynomial for `atan(z)` on `[0, 1]`.
#[inline]
fn atan_unit(z: f32) -> f32 {
    let z2 = z * z;
    z * (0.999_866
        + z2 * (-0.330_299_5 + z2 * (0.180_141 + z2 * (-0.085_133 + z2 * 0.020_835_1))))
}

/// Fast approximation of `atan2(y, x)`.
///
/// Returns 0 when both arguments are zero. Signed zeros pick the side of the
/// ±π seam the way `atan2` does, so `(-1, -0.0)` maps to -π.
#[inline]
pub fn fast_atan2f(y: f32, x: f32) -> f32 {
    let ax = x.abs();
    let ay = y.abs();
    if ax == 0.0 && ay == 0.0 {
        return 0.0;
    }

    // Reduce to the first octant so the polynomial argument is in [0, 1].
    let mut angle = if ax.is_infinite() && ay.is_infinite() {
        FRAC_PI_4
    } else if ay > ax {
        FRAC_PI_2 - atan_unit(ax / ay)
    } else {
        atan_unit(ay / ax)
    };

    if x.is_sign_negative() {
        angle = PI - angle;
    }
    if y.is_sign_negative() {
        -angle
    } else {
        angle
    }
}

/// Write `|input[i]|` into `out[i]`.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn magnitude_into(out: &mut [f32], input: &[ComplexSample]) {
    assert_eq!(out.len(), input.len(), "magnitude slices differ in length");

    let mut out_chunks = out.chunks_exact_mut(LANES);
    let mut in_chunks = input.chunks_exact(LANES);
    for (o, i) in (&mut out_chunks).zip(&mut in_chunks) {
        for lane in 0..LANES {
            o[lane] = (i[lane].real * i[lane].real + i[lane].imag * i[lane].imag).sqrt();
        }
    }
    for (o, s) in out_chunks
        .into_remainder()
        .iter_mut()
        .zip(in_chunks.remainder())
    {
        *o = s.magnitude();
    }
}

/// Write `fast_atan2f(imag, real)` into `out[i]`.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn phase_into(out: &mut [f32], input: &[ComplexSample]) {
    assert_eq!(out.len(), input.len(), "phase slices differ in length");
    for (o, s) in out.iter_mut().zip(input) {
        *o = fast_atan2f(s.imag, s.real);
    }
}

/// Reference implementation of one transform variant.
#[derive(Debug, Clone, Copy)]
pub struct ReferencePath {
    variant: &'static TransformVariant,
}

impl ReferencePath {
    pub fn new(variant: &'static TransformVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> &'static TransformVariant {
        self.variant
    }

    /// Compute `n` items into each output slot.
    ///
    /// Always returns `n`.
    ///
    /// # Panics
    ///
    /// Panics if `input` or any output slot is shorter than `n`, or if
    /// `outputs` holds fewer slots than the variant's arity.
    pub fn process(
        &self,
        n: usize,
        input: &[ComplexSample],
        outputs: &mut [&mut [f32]],
    ) -> usize {
        let input = &input[..n];
        for (kind, out) in self.variant.outputs.iter().zip(outputs.iter_mut()) {
            let out = &mut out[..n];
            match kind {
                OutputKind::Magnitude => magnitude_into(out, input),
                OutputKind::Phase => phase_into(out, input),
            }
        }
        n
    }
}
