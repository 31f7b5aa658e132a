//! Dispatch engine for elementwise complex transforms.
//!
//! One engine runs one transform variant on one backend. Each call is
//! synchronous: capacity check, upload, argument binding, launch and
//! download all complete before it returns, and a call either produces every
//! requested item or none.

use serde::{Deserialize, Serialize};

use super::backend::{BackendError, ComputeBackend};
use super::buffers::BufferPool;
use super::geometry::WorkGroupGeometry;
use super::sizing::{size_for_device, SizingDecision};
use crate::gpu::capabilities::DeviceCapabilities;
use crate::transform::{BufferRole, ComplexSample, ReferencePath, TransformVariant};

/// Errors returned by [`TransformEngine`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Not enough input samples: need {needed} but got {got}")]
    InputTooShort { needed: usize, got: usize },
    #[error("Output {slot} too short: need {needed} but got {got}")]
    OutputTooShort {
        slot: usize,
        needed: usize,
        got: usize,
    },
    #[error("{variant} expects {expected} output slots, got {got}")]
    OutputArity {
        variant: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Engine disabled after a device buffer allocation failure")]
    EngineFailed,
}

/// What a dispatch does when no kernel is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Produce nothing; the caller retries on a later cycle.
    #[default]
    Idle,
    /// Compute on the host reference path.
    Reference,
}

/// Elementwise transform engine over a compute backend.
pub struct TransformEngine<B: ComputeBackend> {
    backend: B,
    variant: &'static TransformVariant,
    caps: DeviceCapabilities,
    sizing: SizingDecision,
    kernel: Option<B::Kernel>,
    pool: BufferPool<B>,
    reference: ReferencePath,
    fallback: FallbackPolicy,
    failed: bool,
}

impl<B: ComputeBackend> TransformEngine<B> {
    /// Create an engine with default options.
    pub fn new(backend: B, variant: &'static TransformVariant) -> Result<Self, DispatchError> {
        TransformEngineBuilder::new().build(backend, variant)
    }

    fn with_options(
        backend: B,
        variant: &'static TransformVariant,
        requested_items: Option<usize>,
        fallback: FallbackPolicy,
        verbose: bool,
    ) -> Result<Self, DispatchError> {
        let level = if verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        };

        let caps = backend.capabilities();
        let sizing = size_for_device(&caps, variant.input_element_size(), requested_items);
        if sizing.clamped() {
            log::log!(
                level,
                "{} adjusting output buffer for {} items due to constant memory restrictions",
                variant.name,
                sizing.effective
            );
        } else {
            log::log!(
                level,
                "{} using default output buffer of {} items",
                variant.name,
                sizing.effective
            );
        }

        let kernel = backend.compile_kernel(variant);
        match kernel {
            Some(_) => log::log!(level, "{} compiled kernel {}", variant.name, variant.entry_point),
            None => log::warn!(
                "{} has no kernel for {}; device path unavailable",
                variant.name,
                variant.entry_point
            ),
        }

        let pool = BufferPool::new(&backend, variant, sizing.effective)?;

        Ok(Self {
            backend,
            variant,
            caps,
            sizing,
            kernel,
            pool,
            reference: ReferencePath::new(variant),
            fallback,
            failed: false,
        })
    }

    pub fn variant(&self) -> &'static TransformVariant {
        self.variant
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    pub fn sizing(&self) -> &SizingDecision {
        &self.sizing
    }

    /// Largest item count the streaming framework should request per call.
    pub fn max_items_per_call(&self) -> usize {
        self.sizing.effective
    }

    /// Current buffer pool capacity in items.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Number of buffer pool resizes so far.
    pub fn resizes(&self) -> usize {
        self.pool.resizes()
    }

    pub fn has_kernel(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Whether a buffer allocation failure has disabled this engine.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Transform `n` samples into the output slots.
    ///
    /// Returns `n` once the device path runs. Without a kernel, returns 0 or,
    /// with [`FallbackPolicy::Reference`], computes on the host and returns
    /// `n`.
    pub fn dispatch(
        &mut self,
        n: usize,
        input: &[ComplexSample],
        outputs: &mut [&mut [f32]],
    ) -> Result<usize, DispatchError> {
        self.validate(n, input, outputs)?;
        if self.failed {
            return Err(DispatchError::EngineFailed);
        }
        if n == 0 {
            return Ok(0);
        }

        if self.kernel.is_none() {
            return Ok(match self.fallback {
                FallbackPolicy::Idle => {
                    log::trace!("{} not ready, producing 0 items", self.variant.name);
                    0
                }
                FallbackPolicy::Reference => self.reference.process(n, input, outputs),
            });
        }

        self.run_device(n, input, outputs)
    }

    /// Run only the device path; returns 0 without a kernel.
    pub fn process_device(
        &mut self,
        n: usize,
        input: &[ComplexSample],
        outputs: &mut [&mut [f32]],
    ) -> Result<usize, DispatchError> {
        self.validate(n, input, outputs)?;
        if self.failed {
            return Err(DispatchError::EngineFailed);
        }
        if n == 0 || self.kernel.is_none() {
            return Ok(0);
        }
        self.run_device(n, input, outputs)
    }

    /// Run only the host reference path; always returns `n`.
    pub fn process_reference(
        &self,
        n: usize,
        input: &[ComplexSample],
        outputs: &mut [&mut [f32]],
    ) -> Result<usize, DispatchError> {
        self.validate(n, input, outputs)?;
        Ok(self.reference.process(n, input, outputs))
    }

    /// Transform a whole batch in calls of at most
    /// [`max_items_per_call`](Self::max_items_per_call) items.
    ///
    /// Stops early if a call produces nothing; the returned outputs hold only
    /// the items actually produced.
    pub fn transform(&mut self, input: &[ComplexSample]) -> Result<Vec<Vec<f32>>, DispatchError> {
        let arity = self.variant.arity();
        let mut outputs = vec![vec![0.0f32; input.len()]; arity];
        let chunk = self.max_items_per_call().max(1);
        let mut produced = 0;

        while produced < input.len() {
            let n = chunk.min(input.len() - produced);
            let mut slots: Vec<&mut [f32]> = outputs
                .iter_mut()
                .map(|o| &mut o[produced..produced + n])
                .collect();
            let done = self.dispatch(n, &input[produced..produced + n], &mut slots)?;
            if done == 0 {
                break;
            }
            produced += done;
        }

        for out in &mut outputs {
            out.truncate(produced);
        }
        Ok(outputs)
    }

    fn validate(
        &self,
        n: usize,
        input: &[ComplexSample],
        outputs: &[&mut [f32]],
    ) -> Result<(), DispatchError> {
        if outputs.len() != self.variant.arity() {
            return Err(DispatchError::OutputArity {
                variant: self.variant.name,
                expected: self.variant.arity(),
                got: outputs.len(),
            });
        }
        if input.len() < n {
            return Err(DispatchError::InputTooShort {
                needed: n,
                got: input.len(),
            });
        }
        if let Some((slot, out)) = outputs.iter().enumerate().find(|(_, o)| o.len() < n) {
            return Err(DispatchError::OutputTooShort {
                slot,
                needed: n,
                got: out.len(),
            });
        }
        Ok(())
    }

    fn run_device(
        &mut self,
        n: usize,
        input: &[ComplexSample],
        outputs: &mut [&mut [f32]],
    ) -> Result<usize, DispatchError> {
        match self.pool.ensure_capacity(&self.backend, n) {
            Ok(true) => log::debug!("{} resized buffers to {} items", self.variant.name, n),
            Ok(false) => {}
            Err(e) => {
                log::error!("{} buffer allocation failed: {}", self.variant.name, e);
                self.failed = true;
                return Err(e.into());
            }
        }

        let Some(kernel) = self.kernel.as_mut() else {
            return Ok(0);
        };

        let input_buffer = self
            .pool
            .buffer(BufferRole::Input)
            .ok_or(BackendError::NotBound)?;
        self.backend.upload(input_buffer, &input[..n])?;

        let args = self.pool.args();
        self.backend.bind(kernel, &args)?;

        let geometry = WorkGroupGeometry::for_items(n, &self.caps);
        log::trace!("{} launching {}", self.variant.name, geometry);
        self.backend.launch(kernel, geometry)?;

        for (buffer, out) in args[1..].iter().zip(outputs.iter_mut()) {
            self.backend.download(buffer, &mut out[..n])?;
        }

        Ok(n)
    }
}

impl<B: ComputeBackend> Drop for TransformEngine<B> {
    fn drop(&mut self) {
        self.pool.release_all(&self.backend);
    }
}

/// Builder for [`TransformEngine`].
#[derive(Debug, Default)]
pub struct TransformEngineBuilder {
    max_items: Option<usize>,
    fallback: FallbackPolicy,
    verbose: bool,
}

impl TransformEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default per-call item count; `None` uses the 8192 fallback and `0`
    /// means "as large as constant memory allows".
    pub fn max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Log sizing and kernel decisions at info instead of debug level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build<B: ComputeBackend>(
        self,
        backend: B,
        variant: &'static TransformVariant,
    ) -> Result<TransformEngine<B>, DispatchError> {
        TransformEngine::with_options(backend, variant, self.max_items, self.fallback, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::compute::host::HostBackend;
    use crate::transform::{COMPLEX_TO_ARG, COMPLEX_TO_MAG_PHASE, FAST_ATAN2_MAX_ERROR};

    fn samples(n: usize) -> Vec<ComplexSample> {
        (0..n)
            .map(|i| ComplexSample::new((i as f32 * 0.37).cos() * 2.0, (i as f32 * 0.11).sin()))
            .collect()
    }

    #[test]
    fn test_dispatch_returns_requested_count() {
        let mut engine = TransformEngine::new(HostBackend::default(), &COMPLEX_TO_ARG).unwrap();
        for n in [1usize, 7, 64, 1000] {
            let input = samples(n);
            let mut phase = vec![0.0; n];
            let produced = engine.dispatch(n, &input, &mut [&mut phase[..]]).unwrap();
            assert_eq!(produced, n);
        }
    }

    #[test]
    fn test_device_matches_reference() {
        let mut engine =
            TransformEngine::new(HostBackend::default(), &COMPLEX_TO_MAG_PHASE).unwrap();
        let input = samples(513);
        let (mut mag, mut phase) = (vec![0.0; 513], vec![0.0; 513]);
        let (mut ref_mag, mut ref_phase) = (vec![0.0; 513], vec![0.0; 513]);

        engine
            .process_device(513, &input, &mut [&mut mag[..], &mut phase[..]])
            .unwrap();
        engine
            .process_reference(513, &input, &mut [&mut ref_mag[..], &mut ref_phase[..]])
            .unwrap();

        for i in 0..513 {
            assert!((mag[i] - ref_mag[i]).abs() < 1e-5);
            assert!((phase[i] - ref_phase[i]).abs() <= FAST_ATAN2_MAX_ERROR);
        }
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut engine = TransformEngineBuilder::new()
            .max_items(Some(16))
            .build(HostBackend::default(), &COMPLEX_TO_ARG)
            .unwrap();
        assert_eq!(engine.capacity(), 16);

        let input = samples(40);
        let mut phase = vec![0.0; 40];
        assert_eq!(engine.dispatch(40, &input, &mut [&mut phase[..]]).unwrap(), 40);
        assert_eq!(engine.capacity(), 40);
        assert_eq!(engine.resizes(), 1);
    }

    #[test]
    fn test_no_kernel_produces_nothing() {
        let mut engine =
            TransformEngine::new(HostBackend::default().without_kernels(), &COMPLEX_TO_ARG)
                .unwrap();
        assert!(!engine.has_kernel());
        let input = samples(8);
        let mut phase = vec![9.0; 8];
        assert_eq!(engine.dispatch(8, &input, &mut [&mut phase[..]]).unwrap(), 0);
        assert!(phase.iter().all(|&p| p == 9.0));
    }

    #[test]
    fn test_no_kernel_reference_fallback() {
        let mut engine = TransformEngineBuilder::new()
            .fallback(FallbackPolicy::Reference)
            .build(HostBackend::default().without_kernels(), &COMPLEX_TO_ARG)
            .unwrap();
        let input = vec![ComplexSample::new(3.0, 4.0); 4];
        let mut phase = vec![0.0; 4];
        assert_eq!(engine.dispatch(4, &input, &mut [&mut phase[..]]).unwrap(), 4);
        assert!(phase.iter().all(|p| (p - 0.9273).abs() < 1e-3));
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let mut engine =
            TransformEngine::new(HostBackend::default(), &COMPLEX_TO_MAG_PHASE).unwrap();
        let input = samples(4);
        let mut only = vec![0.0; 4];
        let result = engine.dispatch(4, &input, &mut [&mut only[..]]);
        assert!(matches!(
            result,
            Err(DispatchError::OutputArity {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_short_slices() {
        let mut engine = TransformEngine::new(HostBackend::default(), &COMPLEX_TO_ARG).unwrap();
        let input = samples(4);
        let mut phase = vec![0.0; 8];
        assert!(matches!(
            engine.dispatch(8, &input, &mut [&mut phase[..]]),
            Err(DispatchError::InputTooShort { needed: 8, got: 4 })
        ));

        let input = samples(8);
        let mut phase = vec![0.0; 4];
        assert!(matches!(
            engine.dispatch(8, &input, &mut [&mut phase[..]]),
            Err(DispatchError::OutputTooShort { slot: 0, .. })
        ));
    }

    #[test]
    fn test_allocation_failure_disables_engine() {
        let mut engine = TransformEngineBuilder::new()
            .max_items(Some(32))
            .build(HostBackend::with_max_items(64), &COMPLEX_TO_ARG)
            .unwrap();
        let input = samples(128);
        let mut phase = vec![0.0; 128];

        let result = engine.dispatch(128, &input, &mut [&mut phase[..]]);
        assert!(matches!(result, Err(DispatchError::Backend(_))));
        assert!(engine.is_failed());
        assert!(matches!(
            engine.dispatch(8, &input, &mut [&mut phase[..]]),
            Err(DispatchError::EngineFailed)
        ));
    }

    #[test]
    fn test_transform_chunks_by_max_items() {
        let mut engine = TransformEngineBuilder::new()
            .max_items(Some(100))
            .build(HostBackend::default(), &COMPLEX_TO_MAG_PHASE)
            .unwrap();
        let input = samples(350);
        let outputs = engine.transform(&input).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].len(), 350);
        assert_eq!(engine.capacity(), 100);
        assert_eq!(engine.resizes(), 0);
        for (m, s) in outputs[0].iter().zip(&input) {
            assert!((m - s.magnitude()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_drop_releases_buffers() {
        let backend = std::sync::Arc::new(HostBackend::default());
        {
            let _engine = TransformEngine::new(backend.clone(), &COMPLEX_TO_MAG_PHASE).unwrap();
            assert_eq!(backend.live_buffers(), 3);
        }
        assert_eq!(backend.live_buffers(), 0);
    }
}
