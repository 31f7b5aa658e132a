//! Elementwise complex-sample transforms.
//!
//! This module provides:
//! - The `{real, imag}` sample record shared by host and device code
//! - Transform variant descriptors (phase only, magnitude and phase)
//! - The host reference path used for fallback and correctness checks
//! - Synthetic complex signals for tests and benchmarks

pub mod reference;
pub mod sample;
pub mod synth;
pub mod variant;

// Re-export commonly used types
pub use reference::{
    fast_atan2f, magnitude_into, phase_into, ReferencePath, FAST_ATAN2_MAX_ERROR,
};
pub use sample::ComplexSample;
pub use variant::{
    AccessMode, BufferRole, OutputKind, TransformKind, TransformVariant, COMPLEX_TO_ARG,
    COMPLEX_TO_MAG_PHASE,
};
