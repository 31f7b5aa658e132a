//! Complex sample record.
//!
//! The layout must match the WGSL `ComplexSample` struct exactly.

use rustfft::num_complex::Complex;

/// One complex input sample as laid out in device memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ComplexSample {
    pub real: f32,
    pub imag: f32,
}

impl ComplexSample {
    /// Size of one sample in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub const fn new(real: f32, imag: f32) -> Self {
        Self { real, imag }
    }

    /// Euclidean norm, `sqrt(real² + imag²)`.
    pub fn magnitude(&self) -> f32 {
        (self.real * self.real + self.imag * self.imag).sqrt()
    }

    /// Exact phase angle with the origin mapped to 0.
    pub fn phase(&self) -> f32 {
        if self.real == 0.0 && self.imag == 0.0 {
            0.0
        } else {
            self.imag.atan2(self.real)
        }
    }
}

impl From<Complex<f32>> for ComplexSample {
    fn from(c: Complex<f32>) -> Self {
        Self::new(c.re, c.im)
    }
}

impl From<ComplexSample> for Complex<f32> {
    fn from(s: ComplexSample) -> Self {
        Complex::new(s.real, s.imag)
    }
}

impl From<(f32, f32)> for ComplexSample {
    fn from((real, imag): (f32, f32)) -> Self {
        Self::new(real, imag)
    }
}
