//! Engine setup from configuration, combining device selection, backend and
//! transform variant.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::gpu::{
    DevicePreference, DispatchError, FallbackPolicy, GpuContext, GpuError, HostBackend,
    TransformEngine, TransformEngineBuilder, WgpuBackend,
};
use crate::transform::{ComplexSample, TransformKind, TransformVariant};

/// Pipeline configuration for building transform engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Adapter class to open.
    pub device: DevicePreference,
    /// Default items per call; `None` uses 8192, `0` uses the device ceiling.
    pub max_items: Option<usize>,
    /// Behaviour when no kernel is available.
    pub fallback: FallbackPolicy,
    /// Log sizing and kernel decisions at info level.
    pub verbose: bool,
    /// Override for the preferred work-group multiple.
    pub preferred_group_multiple: Option<u32>,
    /// Run on the host backend when no adapter can be opened.
    pub host_backend_fallback: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: DevicePreference::Any,
            max_items: None,
            fallback: FallbackPolicy::Idle,
            verbose: false,
            preferred_group_multiple: None,
            host_backend_fallback: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn builder(&self) -> TransformEngineBuilder {
        TransformEngineBuilder::new()
            .max_items(self.max_items)
            .fallback(self.fallback)
            .verbose(self.verbose)
    }
}

/// Errors that can occur while building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine on either a wgpu device or the host backend, chosen at runtime.
pub enum DynamicEngine {
    Gpu(Box<TransformEngine<WgpuBackend>>),
    Host(TransformEngine<HostBackend>),
}

impl DynamicEngine {
    /// Create an engine on the host backend.
    pub fn host(kind: TransformKind, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let engine = config
            .builder()
            .build(HostBackend::default(), kind.variant())?;
        Ok(DynamicEngine::Host(engine))
    }

    /// Create an engine on an existing GPU context.
    pub fn gpu(
        ctx: &GpuContext,
        kind: TransformKind,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let backend = WgpuBackend::from_context(ctx, config.preferred_group_multiple);
        let engine = config.builder().build(backend, kind.variant())?;
        Ok(DynamicEngine::Gpu(Box::new(engine)))
    }

    /// Use the GPU context if given, falling back to the host backend.
    pub fn gpu_with_fallback(
        ctx: Option<&GpuContext>,
        kind: TransformKind,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        match ctx {
            Some(ctx) => match Self::gpu(ctx, kind, config) {
                Ok(engine) => Ok(engine),
                Err(e) => {
                    log::warn!("GPU engine unavailable ({}), using host backend", e);
                    Self::host(kind, config)
                }
            },
            None => Self::host(kind, config),
        }
    }

    /// Open a device per `config` and build an engine for `kind`.
    pub async fn open(kind: TransformKind, config: &PipelineConfig) -> Result<Self, PipelineError> {
        match GpuContext::with_preference(config.device).await {
            Ok(ctx) => Self::gpu(&ctx, kind, config),
            Err(e) if config.host_backend_fallback => {
                log::warn!("{}; using host backend", e);
                Self::host(kind, config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check if this engine runs on a wgpu device.
    pub fn is_gpu(&self) -> bool {
        matches!(self, DynamicEngine::Gpu(_))
    }

    pub fn variant(&self) -> &'static TransformVariant {
        match self {
            DynamicEngine::Gpu(e) => e.variant(),
            DynamicEngine::Host(e) => e.variant(),
        }
    }

    pub fn max_items_per_call(&self) -> usize {
        match self {
            DynamicEngine::Gpu(e) => e.max_items_per_call(),
            DynamicEngine::Host(e) => e.max_items_per_call(),
        }
    }

    pub fn dispatch(
        &mut self,
        n: usize,
        input: &[ComplexSample],
        outputs: &mut [&mut [f32]],
    ) -> Result<usize, DispatchError> {
        match self {
            DynamicEngine::Gpu(e) => e.dispatch(n, input, outputs),
            DynamicEngine::Host(e) => e.dispatch(n, input, outputs),
        }
    }

    pub fn transform(&mut self, input: &[ComplexSample]) -> Result<Vec<Vec<f32>>, DispatchError> {
        match self {
            DynamicEngine::Gpu(e) => e.transform(input),
            DynamicEngine::Host(e) => e.transform(input),
        }
    }
}

/// Compute the phase of every sample.
pub async fn complex_to_arg(
    input: &[ComplexSample],
    config: &PipelineConfig,
) -> Result<Vec<f32>, PipelineError> {
    let mut engine = DynamicEngine::open(TransformKind::PhaseOnly, config).await?;
    let mut outputs = engine.transform(input)?;
    Ok(outputs.pop().unwrap_or_default())
}

/// Compute magnitude and phase of every sample.
pub async fn complex_to_mag_phase(
    input: &[ComplexSample],
    config: &PipelineConfig,
) -> Result<(Vec<f32>, Vec<f32>), PipelineError> {
    let mut engine = DynamicEngine::open(TransformKind::MagnitudeAndPhase, config).await?;
    let mut outputs = engine.transform(input)?.into_iter();
    let magnitude = outputs.next().unwrap_or_default();
    let phase = outputs.next().unwrap_or_default();
    Ok((magnitude, phase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.device, DevicePreference::Any);
        assert_eq!(config.max_items, None);
        assert_eq!(config.fallback, FallbackPolicy::Idle);
        assert!(config.host_backend_fallback);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = PipelineConfig::from_json_str(
            r#"{ "device": "gpu", "max_items": 16384, "fallback": "reference", "verbose": true }"#,
        )
        .unwrap();
        assert_eq!(config.device, DevicePreference::Gpu);
        assert_eq!(config.max_items, Some(16384));
        assert_eq!(config.fallback, FallbackPolicy::Reference);
        assert!(config.verbose);
        assert_eq!(config.preferred_group_multiple, None);
    }

    #[test]
    fn test_config_rejects_unknown_device() {
        let result = PipelineConfig::from_json_str(r#"{ "device": "fpga" }"#);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_config_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "device": "cpu", "max_items": 0, "preferred_group_multiple": 128 }}"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.max_items, Some(0));
        assert_eq!(config.preferred_group_multiple, Some(128));
        assert_eq!(config.fallback, FallbackPolicy::Idle);
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineConfig::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_host_engine_clamps_to_constant_memory() {
        let config = PipelineConfig {
            max_items: Some(16384),
            ..Default::default()
        };
        let engine = DynamicEngine::host(TransformKind::MagnitudeAndPhase, &config).unwrap();
        assert!(!engine.is_gpu());
        assert_eq!(engine.max_items_per_call(), 8192);
        assert_eq!(engine.variant().arity(), 2);
    }

    #[test]
    fn test_fallback_without_context() {
        let mut engine = DynamicEngine::gpu_with_fallback(
            None,
            TransformKind::PhaseOnly,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert!(!engine.is_gpu());
        let out = engine
            .transform(&[ComplexSample::new(0.0, 0.0), ComplexSample::new(0.0, 2.0)])
            .unwrap();
        assert_eq!(out[0][0], 0.0);
        assert!((out[0][1] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
