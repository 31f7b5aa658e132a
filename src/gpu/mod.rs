//! GPU compute using wgpu.
//!
//! Provides device acquisition, the capability snapshot that constrains
//! dispatch, and the compute engine running the transform kernels.

pub mod capabilities;
pub mod compute;
pub mod context;

pub use capabilities::DeviceCapabilities;
pub use compute::{
    BackendError, ComputeBackend, DispatchError, FallbackPolicy, HostBackend, TransformEngine,
    TransformEngineBuilder, WgpuBackend,
};
pub use context::{DevicePreference, GpuContext, GpuError};
