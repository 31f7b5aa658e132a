//! Complex Accel
//!
//! Accelerated elementwise transforms over complex sample streams.
//!
//! # Features
//!
//! - Phase (`atan2`) and magnitude+phase transforms over interleaved complex samples
//! - Compute dispatch via wgpu (Metal on macOS, Vulkan on Linux)
//! - Per-call item limits sized from the device's constant memory budget
//! - Host backend and scalar reference path when no adapter is available
//! - Python bindings via PyO3 (when `python` feature is enabled)

pub mod gpu;
pub mod pipeline;
pub mod transform;

// Re-export commonly used types
pub use gpu::{
    ComputeBackend, DeviceCapabilities, DevicePreference, DispatchError, FallbackPolicy,
    GpuContext, GpuError, HostBackend, TransformEngine, TransformEngineBuilder, WgpuBackend,
};
pub use pipeline::{DynamicEngine, PipelineConfig, PipelineError};
pub use transform::{
    fast_atan2f, ComplexSample, ReferencePath, TransformKind, TransformVariant,
    COMPLEX_TO_ARG, COMPLEX_TO_MAG_PHASE, FAST_ATAN2_MAX_ERROR,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
#[allow(deprecated)] // PyO3 0.27 deprecations - APIs still functional
mod python_bindings {
    use crate::pipeline::{self, PipelineConfig};
    use crate::transform::ComplexSample;
    use crate::DevicePreference;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    fn samples_from(real: &[f32], imag: &[f32]) -> PyResult<Vec<ComplexSample>> {
        if real.len() != imag.len() {
            return Err(PyValueError::new_err(format!(
                "real and imag lengths differ: {} vs {}",
                real.len(),
                imag.len()
            )));
        }
        Ok(real
            .iter()
            .zip(imag)
            .map(|(&re, &im)| ComplexSample::new(re, im))
            .collect())
    }

    fn config_for(device: &str, max_items: Option<usize>) -> PyResult<PipelineConfig> {
        let device = DevicePreference::from_str(device)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown device: {}", device)))?;
        Ok(PipelineConfig {
            device,
            max_items,
            ..Default::default()
        })
    }

    /// Compute the phase of each complex sample.
    #[pyfunction]
    #[pyo3(signature = (real, imag, device="any", max_items=None))]
    fn complex_to_arg(
        py: Python<'_>,
        real: Vec<f32>,
        imag: Vec<f32>,
        device: &str,
        max_items: Option<usize>,
    ) -> PyResult<Vec<f32>> {
        let samples = samples_from(&real, &imag)?;
        let config = config_for(device, max_items)?;

        let result = py.allow_threads(|| {
            pollster::block_on(async { pipeline::complex_to_arg(&samples, &config).await })
        });

        result.map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Compute magnitude and phase of each complex sample.
    #[pyfunction]
    #[pyo3(signature = (real, imag, device="any", max_items=None))]
    fn complex_to_mag_phase(
        py: Python<'_>,
        real: Vec<f32>,
        imag: Vec<f32>,
        device: &str,
        max_items: Option<usize>,
    ) -> PyResult<(Vec<f32>, Vec<f32>)> {
        let samples = samples_from(&real, &imag)?;
        let config = config_for(device, max_items)?;

        let result = py.allow_threads(|| {
            pollster::block_on(async { pipeline::complex_to_mag_phase(&samples, &config).await })
        });

        result.map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Scalar phase with the polynomial `atan2` approximation.
    #[pyfunction]
    fn fast_atan2(y: f32, x: f32) -> f32 {
        crate::transform::fast_atan2f(y, x)
    }

    /// Complex Accel Python module
    #[pymodule]
    pub fn complex_accel(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        m.add_function(wrap_pyfunction!(complex_to_arg, m)?)?;
        m.add_function(wrap_pyfunction!(complex_to_mag_phase, m)?)?;
        m.add_function(wrap_pyfunction!(fast_atan2, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python_bindings::*;
