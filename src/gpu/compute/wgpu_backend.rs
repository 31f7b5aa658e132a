//! wgpu compute backend.

use std::sync::Arc;
use wgpu::{BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, Queue};

use super::backend::{BackendError, ComputeBackend};
use super::geometry::WorkGroupGeometry;
use super::params::DispatchParams;
use super::pipelines::{create_layout, KernelPipelines};
use crate::gpu::capabilities::DeviceCapabilities;
use crate::gpu::context::GpuContext;
use crate::transform::{BufferRole, ComplexSample, TransformVariant};

/// Local size used when a launch leaves it unspecified.
pub const DEFAULT_LOCAL_SIZE: u32 = 64;

/// Device buffer plus, for outputs, the staging buffer it is read back
/// through.
pub struct WgpuBuffer {
    role: BufferRole,
    capacity: usize,
    buffer: Buffer,
    staging: Option<Buffer>,
}

impl WgpuBuffer {
    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Compiled kernel with its layout, pipelines and parameter uniform.
pub struct WgpuKernel {
    entry_point: String,
    arity: usize,
    params_binding: u32,
    layout: BindGroupLayout,
    pipelines: KernelPipelines,
    params: Buffer,
    bind_group: Option<BindGroup>,
}

impl WgpuKernel {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Compute backend running kernels on a wgpu device.
pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    caps: DeviceCapabilities,
    max_buffer_size: u64,
    max_storage_binding: u64,
    max_groups_per_dimension: u32,
}

impl WgpuBackend {
    /// Create a backend over an existing device and queue.
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, caps: DeviceCapabilities) -> Self {
        let limits = device.limits();
        Self {
            device,
            queue,
            caps,
            max_buffer_size: limits.max_buffer_size,
            max_storage_binding: limits.max_storage_buffer_binding_size as u64,
            max_groups_per_dimension: limits.max_compute_workgroups_per_dimension,
        }
    }

    /// Create a backend from a GPU context, snapshotting its capabilities.
    pub fn from_context(ctx: &GpuContext, preferred_group_multiple: Option<u32>) -> Self {
        let caps = ctx.capabilities(preferred_group_multiple);
        Self::new(ctx.device.clone(), ctx.queue.clone(), caps)
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    fn wait(&self) -> Result<(), BackendError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| BackendError::PollFailed(format!("{:?}", e)))?;
        Ok(())
    }

    fn check_capacity(buffer: &WgpuBuffer, requested: usize) -> Result<(), BackendError> {
        if requested > buffer.capacity {
            return Err(BackendError::BufferOverrun {
                role: buffer.role,
                capacity: buffer.capacity,
                requested,
            });
        }
        Ok(())
    }
}

impl ComputeBackend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Kernel = WgpuKernel;

    fn capabilities(&self) -> DeviceCapabilities {
        self.caps
    }

    fn compile_kernel(&self, variant: &TransformVariant) -> Option<WgpuKernel> {
        // Shader and pipeline validation errors are captured here instead of
        // reaching the uncaptured-error handler.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}_shader", variant.entry_point)),
                source: wgpu::ShaderSource::Wgsl(variant.shader_source.into()),
            });

        let layout = create_layout(&self.device, variant);
        let pipelines = KernelPipelines::new(
            &self.device,
            &shader,
            &layout,
            variant.entry_point,
            self.caps.preferred_group_multiple,
            DEFAULT_LOCAL_SIZE,
        );

        if let Some(error) = pollster::block_on(scope.pop()) {
            log::warn!(
                "{} kernel {} failed to compile: {}",
                variant.name,
                variant.entry_point,
                error
            );
            return None;
        }

        let params = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}_params", variant.entry_point)),
            size: DispatchParams::SIZE,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Some(WgpuKernel {
            entry_point: variant.entry_point.to_string(),
            arity: variant.arity(),
            params_binding: variant.params_binding(),
            layout,
            pipelines,
            params,
            bind_group: None,
        })
    }

    fn allocate(&self, role: BufferRole, capacity: usize) -> Result<WgpuBuffer, BackendError> {
        let bytes = (capacity.max(1) * role.element_size()) as u64;
        let max = self.max_buffer_size.min(self.max_storage_binding);
        if bytes > max {
            return Err(BackendError::BufferTooLarge { role, bytes, max });
        }

        let usage = match role {
            BufferRole::Input => BufferUsages::STORAGE | BufferUsages::COPY_DST,
            BufferRole::Output0 | BufferRole::Output1 => {
                BufferUsages::STORAGE | BufferUsages::COPY_SRC
            }
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(role.label()),
            size: bytes,
            usage,
            mapped_at_creation: false,
        });

        let staging = (role != BufferRole::Input).then(|| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{}_staging", role.label())),
                size: bytes,
                usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Ok(WgpuBuffer {
            role,
            capacity,
            buffer,
            staging,
        })
    }

    fn release(&self, buffer: WgpuBuffer) {
        buffer.buffer.destroy();
        if let Some(staging) = buffer.staging {
            staging.destroy();
        }
    }

    fn upload(&self, buffer: &WgpuBuffer, samples: &[ComplexSample]) -> Result<(), BackendError> {
        Self::check_capacity(buffer, samples.len())?;
        self.queue
            .write_buffer(&buffer.buffer, 0, bytemuck::cast_slice(samples));
        self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        self.wait()
    }

    fn bind(&self, kernel: &mut WgpuKernel, args: &[&WgpuBuffer]) -> Result<(), BackendError> {
        if args.len() != kernel.arity + 1 {
            return Err(BackendError::NotBound);
        }

        let mut entries: Vec<_> = args
            .iter()
            .map(|arg| wgpu::BindGroupEntry {
                binding: arg.role.binding(),
                resource: arg.buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: kernel.params_binding,
            resource: kernel.params.as_entire_binding(),
        });

        kernel.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bind_group", kernel.entry_point)),
            layout: &kernel.layout,
            entries: &entries,
        }));
        Ok(())
    }

    fn launch(&self, kernel: &WgpuKernel, geometry: WorkGroupGeometry) -> Result<(), BackendError> {
        let bind_group = kernel.bind_group.as_ref().ok_or(BackendError::NotBound)?;

        let params = DispatchParams::new(geometry.global);
        self.queue
            .write_buffer(&kernel.params, 0, bytemuck::bytes_of(&params));

        let (pipeline, local) = kernel.pipelines.select(geometry.local);
        let (groups_x, groups_y) = geometry.grid(local, self.max_groups_per_dimension);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&format!("{}_encoder", kernel.entry_point)),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&format!("{}_pass", kernel.entry_point)),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.wait()
    }

    fn download(&self, buffer: &WgpuBuffer, out: &mut [f32]) -> Result<(), BackendError> {
        Self::check_capacity(buffer, out.len())?;
        if out.is_empty() {
            return Ok(());
        }
        let staging = buffer.staging.as_ref().ok_or_else(|| {
            BackendError::MapFailed(format!("{} buffer is not readable", buffer.role))
        })?;

        let size = std::mem::size_of_val(out) as u64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("download_encoder"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.wait()?;

        rx.recv()
            .map_err(|e| BackendError::MapFailed(e.to_string()))?
            .map_err(|e| BackendError::MapFailed(format!("{:?}", e)))?;

        let data = slice.get_mapped_range();
        out.copy_from_slice(bytemuck::cast_slice(&data));
        drop(data);
        staging.unmap();

        Ok(())
    }
}
