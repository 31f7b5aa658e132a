//! Work-group geometry for one kernel launch.

use std::fmt;

use crate::gpu::capabilities::DeviceCapabilities;

/// Launch shape: a global extent of exactly `global` items and an optional
/// local size.
///
/// `local == None` leaves the choice to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGroupGeometry {
    pub global: usize,
    pub local: Option<u32>,
}

impl WorkGroupGeometry {
    /// Geometry for a call over `n` items.
    ///
    /// The preferred multiple is used only on non-CPU devices and only when it
    /// divides `n` evenly.
    pub fn for_items(n: usize, caps: &DeviceCapabilities) -> Self {
        let multiple = caps.preferred_group_multiple as usize;
        let local = if !caps.device_is_cpu_class && multiple > 0 && n % multiple == 0 {
            Some(caps.preferred_group_multiple)
        } else {
            None
        };
        Self { global: n, local }
    }

    /// Local size to launch with, falling back to `default_local`.
    pub fn local_or(&self, default_local: u32) -> u32 {
        self.local.unwrap_or(default_local).max(1)
    }

    /// Workgroup grid `(x, y)` covering `global` items with `local` items per
    /// group.
    ///
    /// Rows are filled up to `max_per_dimension` groups before spilling into
    /// `y`; kernels index as `gid.y * groups.x * local + gid.x`.
    pub fn grid(&self, local: u32, max_per_dimension: u32) -> (u32, u32) {
        let local = local.max(1) as u64;
        let max = max_per_dimension.max(1) as u64;
        let groups = (self.global as u64).div_ceil(local);
        if groups <= max {
            (groups as u32, 1)
        } else {
            (max as u32, groups.div_ceil(max) as u32)
        }
    }
}

impl fmt::Display for WorkGroupGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local {
            Some(local) => write!(f, "global {} / local {}", self.global, local),
            None => write!(f, "global {} / local unspecified", self.global),
        }
    }
}
