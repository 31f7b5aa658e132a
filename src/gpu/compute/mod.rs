//! GPU compute for elementwise complex transforms.
//!
//! This module provides the dispatch engine, its buffer pool and sizing
//! policy, and the wgpu and host backends it runs on.

mod params;
mod pipelines;

pub mod backend;
pub mod buffers;
pub mod engine;
pub mod geometry;
pub mod host;
pub mod sizing;
pub mod wgpu_backend;

pub use backend::{BackendError, ComputeBackend};
pub use buffers::BufferPool;
pub use engine::{DispatchError, FallbackPolicy, TransformEngine, TransformEngineBuilder};
pub use geometry::WorkGroupGeometry;
pub use host::HostBackend;
pub use sizing::{size_for_device, SizingDecision, DEFAULT_MAX_ITEMS};
pub use wgpu_backend::{WgpuBackend, DEFAULT_LOCAL_SIZE};
