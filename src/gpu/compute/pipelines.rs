//! Compute pipeline creation for elementwise transforms.

use wgpu::{BindGroupLayout, ComputePipeline, Device, ShaderModule};

use crate::transform::{AccessMode, TransformVariant};

/// Name of the WGSL override constant that sets the local size.
pub const WORKGROUP_SIZE_CONSTANT: &str = "WORKGROUP_SIZE";

/// Create the bind group layout for a variant: input storage, one storage
/// buffer per output, then the parameter uniform.
pub fn create_layout(device: &Device, variant: &TransformVariant) -> BindGroupLayout {
    let storage = |binding: u32, access: AccessMode| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage {
                read_only: access == AccessMode::ReadOnly,
            },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let mut entries: Vec<_> = variant
        .roles()
        .map(|role| storage(role.binding(), role.access_mode()))
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: variant.params_binding(),
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{}_layout", variant.entry_point)),
        entries: &entries,
    })
}

/// Pipelines for one kernel: one specialised to the device's preferred
/// local size, one for launches that leave the local size unspecified.
pub struct KernelPipelines {
    preferred_size: u32,
    preferred: ComputePipeline,
    default_size: u32,
    default: ComputePipeline,
}

impl KernelPipelines {
    pub fn new(
        device: &Device,
        shader: &ShaderModule,
        layout: &BindGroupLayout,
        entry_point: &str,
        preferred_size: u32,
        default_size: u32,
    ) -> Self {
        Self {
            preferred_size,
            preferred: create_pipeline(device, shader, layout, entry_point, preferred_size),
            default_size,
            default: create_pipeline(device, shader, layout, entry_point, default_size),
        }
    }

    /// Pipeline and local size for a launch.
    pub fn select(&self, local: Option<u32>) -> (&ComputePipeline, u32) {
        match local {
            Some(size) if size == self.preferred_size => (&self.preferred, self.preferred_size),
            _ => (&self.default, self.default_size),
        }
    }
}

fn create_pipeline(
    device: &Device,
    shader: &ShaderModule,
    layout: &BindGroupLayout,
    entry_point: &str,
    workgroup_size: u32,
) -> ComputePipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{}_pipeline_layout", entry_point)),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });

    let constants = [(WORKGROUP_SIZE_CONSTANT, workgroup_size as f64)];
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{}_pipeline_{}", entry_point, workgroup_size)),
        layout: Some(&pipeline_layout),
        module: shader,
        entry_point: Some(entry_point),
        compilation_options: wgpu::PipelineCompilationOptions {
            constants: &constants,
            ..Default::default()
        },
        cache: None,
    })
}
