//! Uniform parameter structs for the transform shaders.
//!
//! These structs must match the WGSL shader definitions exactly,
//! including alignment requirements.

/// Per-launch parameters.
/// WGSL: struct DispatchParams { n: u32, _pad0: u32, _pad1: u32, _pad2: u32 }
/// Padded to 16 bytes for uniform buffer layout rules.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DispatchParams {
    /// Global extent; invocations at or past `n` do nothing.
    pub n: u32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl DispatchParams {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(n: usize) -> Self {
        Self {
            n: n as u32,
            _pad0: 0,
            _pad1: 0,
            _pad2: 0,
        }
    }
}
