//! Integration tests for the wgpu backend.
//!
//! Every test returns early when no adapter is available.

use std::f32::consts::PI;

use complex_accel::gpu::compute::backend::BackendError;
use complex_accel::pipeline::{self, DynamicEngine, PipelineConfig};
use complex_accel::transform::synth::{generate_edge_batch, generate_tone};
use complex_accel::transform::{OutputKind, TransformKind, TransformVariant};
use complex_accel::{
    ComplexSample, ComputeBackend, DispatchError, GpuContext, TransformEngine,
    TransformEngineBuilder, WgpuBackend, COMPLEX_TO_ARG, COMPLEX_TO_MAG_PHASE,
    FAST_ATAN2_MAX_ERROR,
};

async fn create_gpu_context() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    GpuContext::new().await.ok()
}

fn angle_diff(a: f32, b: f32) -> f32 {
    let d = (a - b).abs();
    d.min(2.0 * PI - d)
}

#[tokio::test]
async fn test_gpu_engine_creation() {
    if let Some(ctx) = create_gpu_context().await {
        let backend = WgpuBackend::from_context(&ctx, None);
        let caps = backend.capabilities();
        let engine = TransformEngine::new(backend, &COMPLEX_TO_MAG_PHASE).unwrap();
        assert!(engine.has_kernel());
        let expected = ((caps.const_mem_budget / 8) as usize).clamp(1, 8192);
        assert_eq!(engine.max_items_per_call(), expected);
        assert_eq!(engine.capacity(), expected);
    }
}

#[tokio::test]
async fn test_gpu_three_four_five_and_origin() {
    if let Some(ctx) = create_gpu_context().await {
        let backend = WgpuBackend::from_context(&ctx, None);
        let mut engine = TransformEngine::new(backend, &COMPLEX_TO_MAG_PHASE).unwrap();
        let input = [
            ComplexSample::new(3.0, 4.0),
            ComplexSample::new(0.0, 0.0),
            ComplexSample::new(-1.0, 0.0),
        ];
        let out = engine.transform(&input).unwrap();

        assert!((out[0][0] - 5.0).abs() < 1e-5);
        assert!((out[1][0] - 4.0f32.atan2(3.0)).abs() < 1e-5);
        assert_eq!(out[0][1], 0.0);
        assert_eq!(out[1][1], 0.0);
        assert!(angle_diff(out[1][2], PI) < 1e-5);
    }
}

#[tokio::test]
async fn test_gpu_matches_reference() {
    if let Some(ctx) = create_gpu_context().await {
        for variant in [&COMPLEX_TO_ARG, &COMPLEX_TO_MAG_PHASE] {
            let backend = WgpuBackend::from_context(&ctx, None);
            let mut engine = TransformEngineBuilder::new()
                .max_items(Some(4096))
                .build(backend, variant)
                .unwrap();
            // Not a multiple of the work-group size, spanning several calls.
            let input = generate_edge_batch(10_007, 21);
            let device = engine.transform(&input).unwrap();
            assert_eq!(device[0].len(), input.len());

            let mut reference = vec![vec![0.0f32; input.len()]; variant.arity()];
            let mut slots: Vec<&mut [f32]> = reference.iter_mut().map(|o| &mut o[..]).collect();
            engine
                .process_reference(input.len(), &input, &mut slots)
                .unwrap();

            for (slot, kind) in variant.outputs.iter().enumerate() {
                for (d, r) in device[slot].iter().zip(&reference[slot]) {
                    match kind {
                        OutputKind::Magnitude => assert!((d - r).abs() <= 1e-4 * r.abs().max(1.0)),
                        OutputKind::Phase => {
                            assert!(angle_diff(*d, *r) <= 2.0 * FAST_ATAN2_MAX_ERROR)
                        }
                    }
                }
            }
        }
    }
}

#[tokio::test]
async fn test_gpu_resize_on_larger_request() {
    if let Some(ctx) = create_gpu_context().await {
        let backend = WgpuBackend::from_context(&ctx, None);
        let mut engine = TransformEngineBuilder::new()
            .max_items(Some(64))
            .build(backend, &COMPLEX_TO_ARG)
            .unwrap();
        let input = generate_tone(440.0, 48000, 256, 1.0);
        let mut phase = vec![0.0; 256];

        assert_eq!(engine.dispatch(256, &input, &mut [&mut phase[..]]).unwrap(), 256);
        assert_eq!(engine.capacity(), 256);
        assert_eq!(engine.resizes(), 1);
        for (p, s) in phase.iter().zip(&input) {
            assert!(angle_diff(*p, s.phase()) <= 2.0 * FAST_ATAN2_MAX_ERROR);
        }
    }
}

#[tokio::test]
async fn test_gpu_rejects_oversized_buffer() {
    if let Some(ctx) = create_gpu_context().await {
        let backend = WgpuBackend::from_context(&ctx, None);
        let limit = ctx.device.limits().max_storage_buffer_binding_size as usize;
        let too_many = limit / ComplexSample::SIZE + 1;
        let result = backend.allocate(complex_accel::transform::BufferRole::Input, too_many);
        assert!(matches!(result, Err(BackendError::BufferTooLarge { .. })));
    }
}

#[tokio::test]
async fn test_dynamic_engine_with_context() {
    let ctx = create_gpu_context().await;
    let mut engine = DynamicEngine::gpu_with_fallback(
        ctx.as_ref(),
        TransformKind::PhaseOnly,
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(engine.is_gpu(), ctx.is_some());

    let out = engine
        .transform(&[ComplexSample::new(0.0, 3.0)])
        .unwrap();
    assert!((out[0][0] - PI / 2.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_pipeline_helpers_fall_back_to_host() {
    let _ = env_logger::builder().is_test(true).try_init();
    let input = generate_edge_batch(300, 5);
    let (mag, phase) = pipeline::complex_to_mag_phase(&input, &PipelineConfig::default())
        .await
        .unwrap();
    assert_eq!(mag.len(), 300);
    assert_eq!(phase.len(), 300);
    assert_eq!(mag[0], 0.0);
    assert_eq!(phase[0], 0.0);
}

#[tokio::test]
async fn test_gpu_output_arity_checked_before_device() {
    if let Some(ctx) = create_gpu_context().await {
        let backend = WgpuBackend::from_context(&ctx, None);
        let mut engine = TransformEngine::new(backend, &COMPLEX_TO_ARG).unwrap();
        let mut a = vec![0.0; 4];
        let mut b = vec![0.0; 4];
        let input = [ComplexSample::default(); 4];
        assert!(matches!(
            engine.dispatch(4, &input, &mut [&mut a[..], &mut b[..]]),
            Err(DispatchError::OutputArity { .. })
        ));
    }
}

/// Phase-only variant whose shader does not compile.
static UNCOMPILABLE: TransformVariant = TransformVariant {
    kind: TransformKind::PhaseOnly,
    name: "Uncompilable",
    entry_point: "complex_to_arg",
    shader_source: "@compute @workgroup_size(64) fn complex_to_arg( {",
    outputs: &[OutputKind::Phase],
};

#[tokio::test]
async fn test_gpu_shader_error_leaves_kernel_absent() {
    if let Some(ctx) = create_gpu_context().await {
        let backend = WgpuBackend::from_context(&ctx, None);
        assert!(backend.compile_kernel(&UNCOMPILABLE).is_none());

        let mut engine = TransformEngine::new(backend, &UNCOMPILABLE).unwrap();
        assert!(!engine.has_kernel());
        let input = [ComplexSample::new(1.0, 1.0); 8];
        let mut phase = vec![0.0; 8];
        assert_eq!(engine.dispatch(8, &input, &mut [&mut phase[..]]).unwrap(), 0);
    }
}
