//! Transform variant descriptors.
//!
//! A descriptor names the kernel entry point, carries its WGSL source and
//! lists the outputs in binding order. The buffer pool, backends and dispatch
//! engine are driven entirely by this data, so adding an elementwise
//! transform means adding a descriptor.

use std::fmt;

use super::sample::ComplexSample;

/// Which elementwise transform an engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// `out[i] = atan2(imag, real)`
    PhaseOnly,
    /// `out0[i] = |z|`, `out1[i] = atan2(imag, real)`
    MagnitudeAndPhase,
}

impl TransformKind {
    /// Descriptor for this kind.
    pub fn variant(self) -> &'static TransformVariant {
        match self {
            TransformKind::PhaseOnly => &COMPLEX_TO_ARG,
            TransformKind::MagnitudeAndPhase => &COMPLEX_TO_MAG_PHASE,
        }
    }

    /// Parse a kind from its kernel or short name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "complex_to_arg" | "arg" | "phase" => Some(TransformKind::PhaseOnly),
            "complex_to_mag_phase" | "mag_phase" | "magphase" => {
                Some(TransformKind::MagnitudeAndPhase)
            }
            _ => None,
        }
    }
}

/// Per-element formula computed into one output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// `sqrt(real² + imag²)`
    Magnitude,
    /// `atan2(imag, real)`, 0 at the origin
    Phase,
}

/// Device access mode for a buffer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Role of a device buffer within one transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Input,
    Output0,
    Output1,
}

impl BufferRole {
    /// Role of the output at `index`, if one exists.
    pub fn output(index: usize) -> Option<Self> {
        match index {
            0 => Some(BufferRole::Output0),
            1 => Some(BufferRole::Output1),
            _ => None,
        }
    }

    pub fn access_mode(self) -> AccessMode {
        match self {
            BufferRole::Input => AccessMode::ReadOnly,
            BufferRole::Output0 | BufferRole::Output1 => AccessMode::ReadWrite,
        }
    }

    /// Bytes per element stored in a buffer of this role.
    pub fn element_size(self) -> usize {
        match self {
            BufferRole::Input => ComplexSample::SIZE,
            BufferRole::Output0 | BufferRole::Output1 => std::mem::size_of::<f32>(),
        }
    }

    /// Kernel binding slot; arguments are bound input first, then outputs.
    pub fn binding(self) -> u32 {
        match self {
            BufferRole::Input => 0,
            BufferRole::Output0 => 1,
            BufferRole::Output1 => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BufferRole::Input => "input",
            BufferRole::Output0 => "output0",
            BufferRole::Output1 => "output1",
        }
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Static description of one elementwise transform.
#[derive(Debug)]
pub struct TransformVariant {
    pub kind: TransformKind,
    /// Human-readable block name used in log messages.
    pub name: &'static str,
    /// Compute shader entry point.
    pub entry_point: &'static str,
    pub shader_source: &'static str,
    /// Outputs in binding order.
    pub outputs: &'static [OutputKind],
}

impl TransformVariant {
    /// Number of output buffers (1 or 2).
    pub fn arity(&self) -> usize {
        self.outputs.len()
    }

    /// All buffer roles in kernel-argument order.
    pub fn roles(&self) -> impl Iterator<Item = BufferRole> + '_ {
        std::iter::once(BufferRole::Input)
            .chain((0..self.arity()).filter_map(BufferRole::output))
    }

    /// Size of one input element in bytes.
    pub fn input_element_size(&self) -> usize {
        BufferRole::Input.element_size()
    }

    /// Binding slot of the dispatch parameter uniform, after all outputs.
    pub fn params_binding(&self) -> u32 {
        self.arity() as u32 + 1
    }
}

pub static COMPLEX_TO_ARG: TransformVariant = TransformVariant {
    kind: TransformKind::PhaseOnly,
    name: "ComplexToArg",
    entry_point: "complex_to_arg",
    shader_source: include_str!("../gpu/shaders/complex_to_arg.wgsl"),
    outputs: &[OutputKind::Phase],
};

pub static COMPLEX_TO_MAG_PHASE: TransformVariant = TransformVariant {
    kind: TransformKind::MagnitudeAndPhase,
    name: "ComplexToMagPhase",
    entry_point: "complex_to_mag_phase",
    shader_source: include_str!("../gpu/shaders/complex_to_mag_phase.wgsl"),
    outputs: &[OutputKind::Magnitude, OutputKind::Phase],
};
