//! GPU context initialization and management.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wgpu::{Adapter, Device, Instance, Queue};

use super::capabilities::DeviceCapabilities;

/// Errors that can occur during GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found for {0:?} preference")]
    NoAdapter(DevicePreference),
    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Which class of adapter to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Hardware GPU only.
    Gpu,
    /// Software / CPU adapters only.
    Cpu,
    /// Prefer a GPU, accept anything.
    #[default]
    Any,
}

impl DevicePreference {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gpu" | "accelerator" => Some(DevicePreference::Gpu),
            "cpu" => Some(DevicePreference::Cpu),
            "any" | "all" | "default" => Some(DevicePreference::Any),
            _ => None,
        }
    }

    fn accepts(self, device_type: wgpu::DeviceType) -> bool {
        let is_cpu = device_type == wgpu::DeviceType::Cpu;
        match self {
            DevicePreference::Gpu => !is_cpu,
            DevicePreference::Cpu => is_cpu,
            DevicePreference::Any => true,
        }
    }
}

/// GPU context holding device and queue for compute.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Arc<Adapter>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
}

impl GpuContext {
    /// Create a new GPU context accepting any adapter.
    pub async fn new() -> Result<Self, GpuError> {
        Self::with_preference(DevicePreference::Any).await
    }

    /// Create a GPU context on an adapter matching `preference`.
    pub async fn with_preference(preference: DevicePreference) -> Result<Self, GpuError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::GL,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: preference == DevicePreference::Cpu,
                compatible_surface: None,
            })
            .await
            .map_err(|_| GpuError::NoAdapter(preference))?;

        let info = adapter.get_info();
        if !preference.accepts(info.device_type) {
            return Err(GpuError::NoAdapter(preference));
        }
        log::info!("Using adapter {} ({:?}, {:?})", info.name, info.backend, info.device_type);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("complex-accel"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        Ok(Self {
            instance,
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Get info about the GPU adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Snapshot the device limits relevant to dispatch.
    pub fn capabilities(&self, preferred_group_multiple: Option<u32>) -> DeviceCapabilities {
        DeviceCapabilities::from_wgpu(
            self.adapter_info().device_type,
            &self.device.limits(),
            preferred_group_multiple,
        )
    }
}
