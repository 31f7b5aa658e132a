//! Host-memory compute backend.
//!
//! Behaves like a CPU-class device: buffers live in host memory and kernels
//! evaluate the exact per-element formulas. Used when no GPU adapter is
//! available and to exercise the dispatch engine in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{BackendError, ComputeBackend};
use super::geometry::WorkGroupGeometry;
use crate::gpu::capabilities::{DeviceCapabilities, DEFAULT_GROUP_MULTIPLE};
use crate::transform::{BufferRole, ComplexSample, OutputKind, TransformVariant};

/// Constant-memory ceiling reported by default, matching common GPUs.
pub const HOST_CONST_MEM_BUDGET: u64 = 64 * 1024;

type Storage = Arc<Mutex<Vec<f32>>>;

fn lock(storage: &Storage) -> MutexGuard<'_, Vec<f32>> {
    storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Buffer in host memory. Input buffers store `real, imag` pairs.
#[derive(Debug)]
pub struct HostBuffer {
    role: BufferRole,
    capacity: usize,
    data: Storage,
}

impl HostBuffer {
    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Kernel evaluated on the host.
#[derive(Debug)]
pub struct HostKernel {
    entry_point: String,
    outputs: Vec<OutputKind>,
    bound: Option<(Storage, Vec<(Storage, usize)>)>,
}

impl HostKernel {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Compute backend backed by host memory.
#[derive(Debug)]
pub struct HostBackend {
    caps: DeviceCapabilities,
    max_items: Option<usize>,
    kernels_available: bool,
    live: AtomicUsize,
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new(DeviceCapabilities::new(
            HOST_CONST_MEM_BUDGET,
            true,
            DEFAULT_GROUP_MULTIPLE,
        ))
    }
}

impl HostBackend {
    pub fn new(caps: DeviceCapabilities) -> Self {
        Self {
            caps,
            max_items: None,
            kernels_available: true,
            live: AtomicUsize::new(0),
        }
    }

    /// Backend whose allocations fail above `max_items` elements.
    pub fn with_max_items(max_items: usize) -> Self {
        Self {
            max_items: Some(max_items),
            ..Self::default()
        }
    }

    /// Backend on which no kernel compiles.
    pub fn without_kernels(mut self) -> Self {
        self.kernels_available = false;
        self
    }

    /// Buffers allocated and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ComputeBackend for HostBackend {
    type Buffer = HostBuffer;
    type Kernel = HostKernel;

    fn capabilities(&self) -> DeviceCapabilities {
        self.caps
    }

    fn compile_kernel(&self, variant: &TransformVariant) -> Option<HostKernel> {
        if !self.kernels_available {
            return None;
        }
        Some(HostKernel {
            entry_point: variant.entry_point.to_string(),
            outputs: variant.outputs.to_vec(),
            bound: None,
        })
    }

    fn allocate(&self, role: BufferRole, capacity: usize) -> Result<HostBuffer, BackendError> {
        if let Some(max) = self.max_items {
            if capacity > max {
                return Err(BackendError::BufferTooLarge {
                    role,
                    bytes: (capacity * role.element_size()) as u64,
                    max: (max * role.element_size()) as u64,
                });
            }
        }

        let floats = capacity * role.element_size() / std::mem::size_of::<f32>();
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(HostBuffer {
            role,
            capacity,
            data: Arc::new(Mutex::new(vec![0.0; floats])),
        })
    }

    fn release(&self, buffer: HostBuffer) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        drop(buffer);
    }

    fn upload(&self, buffer: &HostBuffer, samples: &[ComplexSample]) -> Result<(), BackendError> {
        if samples.len() > buffer.capacity {
            return Err(BackendError::BufferOverrun {
                role: buffer.role,
                capacity: buffer.capacity,
                requested: samples.len(),
            });
        }
        let floats: &[f32] = bytemuck::cast_slice(samples);
        lock(&buffer.data)[..floats.len()].copy_from_slice(floats);
        Ok(())
    }

    fn bind(&self, kernel: &mut HostKernel, args: &[&HostBuffer]) -> Result<(), BackendError> {
        let (input, outputs) = args.split_first().ok_or(BackendError::NotBound)?;
        if outputs.len() != kernel.outputs.len() {
            return Err(BackendError::NotBound);
        }
        kernel.bound = Some((
            input.data.clone(),
            outputs
                .iter()
                .map(|b| (b.data.clone(), b.capacity))
                .collect(),
        ));
        Ok(())
    }

    fn launch(&self, kernel: &HostKernel, geometry: WorkGroupGeometry) -> Result<(), BackendError> {
        let (input, outputs) = kernel.bound.as_ref().ok_or(BackendError::NotBound)?;
        let n = geometry.global;

        let input = lock(input);
        let samples: &[ComplexSample] = bytemuck::cast_slice(&input[..]);
        if n > samples.len() {
            return Err(BackendError::BufferOverrun {
                role: BufferRole::Input,
                capacity: samples.len(),
                requested: n,
            });
        }

        for (index, (kind, (storage, capacity))) in kernel.outputs.iter().zip(outputs).enumerate() {
            if n > *capacity {
                return Err(BackendError::BufferOverrun {
                    role: BufferRole::output(index).unwrap_or(BufferRole::Output0),
                    capacity: *capacity,
                    requested: n,
                });
            }
            let mut out = lock(storage);
            for (o, s) in out[..n].iter_mut().zip(&samples[..n]) {
                *o = match kind {
                    OutputKind::Magnitude => s.magnitude(),
                    OutputKind::Phase => s.phase(),
                };
            }
        }
        Ok(())
    }

    fn download(&self, buffer: &HostBuffer, out: &mut [f32]) -> Result<(), BackendError> {
        if out.len() > buffer.capacity {
            return Err(BackendError::BufferOverrun {
                role: buffer.role,
                capacity: buffer.capacity,
                requested: out.len(),
            });
        }
        out.copy_from_slice(&lock(&buffer.data)[..out.len()]);
        Ok(())
    }
}
