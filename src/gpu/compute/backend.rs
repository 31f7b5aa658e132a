//! Compute backend seam shared by the wgpu and host implementations.
//!
//! The dispatch engine only talks to the device through this trait, so the
//! device/queue state is an injected object rather than a shared base.

use std::sync::Arc;

use crate::gpu::capabilities::DeviceCapabilities;
use crate::gpu::compute::geometry::WorkGroupGeometry;
use crate::transform::{BufferRole, ComplexSample, TransformVariant};

/// Errors raised by a compute backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{role} buffer of {bytes} bytes exceeds device limit of {max} bytes")]
    BufferTooLarge {
        role: BufferRole,
        bytes: u64,
        max: u64,
    },
    #[error("{role} buffer holds {capacity} items, {requested} requested")]
    BufferOverrun {
        role: BufferRole,
        capacity: usize,
        requested: usize,
    },
    #[error("Kernel launched before its arguments were bound")]
    NotBound,
    #[error("GPU buffer mapping failed: {0}")]
    MapFailed(String),
    #[error("Device poll failed: {0}")]
    PollFailed(String),
}

/// Device operations needed to run one elementwise transform.
///
/// Every operation is blocking: when a call returns, its effect on device or
/// host memory is complete.
pub trait ComputeBackend {
    /// Owned handle to one device buffer.
    type Buffer;
    /// Compiled, invocable kernel.
    type Kernel;

    /// Capability snapshot taken when the backend was opened.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Compile the kernel for `variant`, or `None` if it is not available.
    fn compile_kernel(&self, variant: &TransformVariant) -> Option<Self::Kernel>;

    /// Allocate a buffer for `role` holding `capacity` elements.
    fn allocate(&self, role: BufferRole, capacity: usize) -> Result<Self::Buffer, BackendError>;

    /// Release a buffer. The handle is consumed so it cannot be used again.
    fn release(&self, buffer: Self::Buffer);

    /// Copy samples into the start of an input buffer.
    fn upload(&self, buffer: &Self::Buffer, samples: &[ComplexSample]) -> Result<(), BackendError>;

    /// Bind kernel arguments in positional order: input, then outputs.
    fn bind(&self, kernel: &mut Self::Kernel, args: &[&Self::Buffer]) -> Result<(), BackendError>;

    /// Run the bound kernel over exactly `geometry.global` items.
    fn launch(&self, kernel: &Self::Kernel, geometry: WorkGroupGeometry) -> Result<(), BackendError>;

    /// Copy the first `out.len()` scalars of an output buffer to the host.
    fn download(&self, buffer: &Self::Buffer, out: &mut [f32]) -> Result<(), BackendError>;
}

/// Shared backends, e.g. one device serving several engines.
impl<T: ComputeBackend + ?Sized> ComputeBackend for Arc<T> {
    type Buffer = T::Buffer;
    type Kernel = T::Kernel;

    fn capabilities(&self) -> DeviceCapabilities {
        (**self).capabilities()
    }

    fn compile_kernel(&self, variant: &TransformVariant) -> Option<Self::Kernel> {
        (**self).compile_kernel(variant)
    }

    fn allocate(&self, role: BufferRole, capacity: usize) -> Result<Self::Buffer, BackendError> {
        (**self).allocate(role, capacity)
    }

    fn release(&self, buffer: Self::Buffer) {
        (**self).release(buffer)
    }

    fn upload(&self, buffer: &Self::Buffer, samples: &[ComplexSample]) -> Result<(), BackendError> {
        (**self).upload(buffer, samples)
    }

    fn bind(&self, kernel: &mut Self::Kernel, args: &[&Self::Buffer]) -> Result<(), BackendError> {
        (**self).bind(kernel, args)
    }

    fn launch(&self, kernel: &Self::Kernel, geometry: WorkGroupGeometry) -> Result<(), BackendError> {
        (**self).launch(kernel, geometry)
    }

    fn download(&self, buffer: &Self::Buffer, out: &mut [f32]) -> Result<(), BackendError> {
        (**self).download(buffer, out)
    }
}
