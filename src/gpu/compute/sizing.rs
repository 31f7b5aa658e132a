//! Per-call item capacity derived from the constant-memory ceiling.

use crate::gpu::capabilities::DeviceCapabilities;

/// Item count used when the streaming framework does not supply one.
pub const DEFAULT_MAX_ITEMS: usize = 8192;

/// Outcome of sizing an engine against its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingDecision {
    /// `floor(const_mem_budget / input_element_size)`, at least 1.
    pub max_const_items: usize,
    /// The default the caller asked for, after the 8192 fallback.
    pub requested: usize,
    /// Capacity the engine actually uses per call.
    pub effective: usize,
}

impl SizingDecision {
    /// Whether the requested default was lowered to fit constant memory.
    pub fn clamped(&self) -> bool {
        self.effective != self.requested
    }
}

/// Size the per-call capacity for an input element of `input_element_size`
/// bytes.
///
/// A requested default of zero is treated like one that exceeds the ceiling.
/// Only the input element's footprint is considered, whatever the number of
/// outputs.
pub fn size_for_device(
    caps: &DeviceCapabilities,
    input_element_size: usize,
    requested: Option<usize>,
) -> SizingDecision {
    let requested = requested.unwrap_or(DEFAULT_MAX_ITEMS);
    let per_item = input_element_size.max(1) as u64;
    let max_const_items = ((caps.const_mem_budget / per_item) as usize).max(1);

    let effective = if requested == 0 || requested > max_const_items {
        max_const_items
    } else {
        requested
    };

    SizingDecision {
        max_const_items,
        requested,
        effective,
    }
}
