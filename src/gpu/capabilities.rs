//! Device capability snapshot.

use std::fmt;

/// Preferred work-group multiple when the device does not report one.
pub const DEFAULT_GROUP_MULTIPLE: u32 = 64;

/// Immutable view of the device limits that constrain dispatch.
///
/// Taken once when an engine is built and never refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Ceiling for read-only input memory, in bytes.
    pub const_mem_budget: u64,
    /// CPU-class devices let the runtime choose the local size.
    pub device_is_cpu_class: bool,
    /// Preferred local work-group size; always non-zero.
    pub preferred_group_multiple: u32,
}

impl DeviceCapabilities {
    pub fn new(
        const_mem_budget: u64,
        device_is_cpu_class: bool,
        preferred_group_multiple: u32,
    ) -> Self {
        Self {
            const_mem_budget,
            device_is_cpu_class,
            preferred_group_multiple: preferred_group_multiple.max(1),
        }
    }

    /// Snapshot a wgpu adapter type and its granted device limits.
    ///
    /// The uniform binding ceiling plays the role of constant memory. The
    /// preferred multiple is capped by the device's work-group width.
    pub fn from_wgpu(
        device_type: wgpu::DeviceType,
        limits: &wgpu::Limits,
        preferred_group_multiple: Option<u32>,
    ) -> Self {
        let preferred = preferred_group_multiple
            .unwrap_or(DEFAULT_GROUP_MULTIPLE)
            .min(limits.max_compute_workgroup_size_x)
            .min(limits.max_compute_invocations_per_workgroup);

        Self::new(
            limits.max_uniform_buffer_binding_size as u64,
            device_type == wgpu::DeviceType::Cpu,
            preferred,
        )
    }
}

impl fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes constant memory, {} device, work-group multiple {}",
            self.const_mem_budget,
            if self.device_is_cpu_class { "CPU-class" } else { "accelerator" },
            self.preferred_group_multiple
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_multiple_never_zero() {
        let caps = DeviceCapabilities::new(65536, false, 0);
        assert_eq!(caps.preferred_group_multiple, 1);
    }

    #[test]
    fn test_from_default_limits() {
        let limits = wgpu::Limits::default();
        let caps = DeviceCapabilities::from_wgpu(wgpu::DeviceType::Cpu, &limits, None);
        assert_eq!(caps.const_mem_budget, 65536);
        assert!(caps.device_is_cpu_class);
        assert_eq!(caps.preferred_group_multiple, DEFAULT_GROUP_MULTIPLE);

        let caps =
            DeviceCapabilities::from_wgpu(wgpu::DeviceType::DiscreteGpu, &limits, Some(4096));
        assert!(!caps.device_is_cpu_class);
        assert_eq!(
            caps.preferred_group_multiple,
            limits.max_compute_workgroup_size_x
        );
    }
}
