//! Device buffer management for elementwise transforms.

use super::backend::{BackendError, ComputeBackend};
use crate::transform::{BufferRole, TransformVariant};

/// One device buffer per role of a transform, all sharing one capacity.
///
/// Capacity only grows. Growing releases every held buffer before any
/// replacement is allocated, so at most one buffer per role is ever live.
pub struct BufferPool<B: ComputeBackend> {
    roles: Vec<BufferRole>,
    buffers: Vec<B::Buffer>,
    capacity: usize,
    resizes: usize,
}

impl<B: ComputeBackend> BufferPool<B> {
    /// Allocate buffers for every role of `variant` sized to `capacity` items.
    pub fn new(
        backend: &B,
        variant: &TransformVariant,
        capacity: usize,
    ) -> Result<Self, BackendError> {
        let mut pool = Self {
            roles: variant.roles().collect(),
            buffers: Vec::new(),
            capacity: 0,
            resizes: 0,
        };
        pool.allocate_all(backend, capacity)?;
        Ok(pool)
    }

    /// Items each buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of times the pool has grown since creation.
    pub fn resizes(&self) -> usize {
        self.resizes
    }

    pub fn roles(&self) -> &[BufferRole] {
        &self.roles
    }

    /// Grow the pool to hold at least `n` items.
    ///
    /// Returns `true` if the buffers were replaced. On allocation failure the
    /// pool is left empty with zero capacity.
    pub fn ensure_capacity(&mut self, backend: &B, n: usize) -> Result<bool, BackendError> {
        if n <= self.capacity {
            return Ok(false);
        }

        log::debug!("Growing buffer pool from {} to {} items", self.capacity, n);
        self.release_all(backend);
        self.allocate_all(backend, n)?;
        self.resizes += 1;
        Ok(true)
    }

    /// Buffer held for `role`, if the variant uses that role.
    pub fn buffer(&self, role: BufferRole) -> Option<&B::Buffer> {
        self.roles
            .iter()
            .position(|&r| r == role)
            .and_then(|i| self.buffers.get(i))
    }

    /// All buffers in kernel-argument order.
    pub fn args(&self) -> Vec<&B::Buffer> {
        self.buffers.iter().collect()
    }

    /// Release every held buffer.
    pub fn release_all(&mut self, backend: &B) {
        for buffer in self.buffers.drain(..) {
            backend.release(buffer);
        }
        self.capacity = 0;
    }

    fn allocate_all(&mut self, backend: &B, capacity: usize) -> Result<(), BackendError> {
        debug_assert!(self.buffers.is_empty());

        for &role in &self.roles {
            match backend.allocate(role, capacity) {
                Ok(buffer) => self.buffers.push(buffer),
                Err(e) => {
                    self.release_all(backend);
                    return Err(e);
                }
            }
        }
        self.capacity = capacity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::compute::host::HostBackend;
    use crate::transform::{COMPLEX_TO_ARG, COMPLEX_TO_MAG_PHASE};

    #[test]
    fn test_allocates_one_buffer_per_role() {
        let backend = HostBackend::default();
        let pool = BufferPool::new(&backend, &COMPLEX_TO_MAG_PHASE, 128).unwrap();
        assert_eq!(pool.capacity(), 128);
        assert_eq!(pool.args().len(), 3);
        assert!(pool.buffer(BufferRole::Output1).is_some());
        assert_eq!(backend.live_buffers(), 3);

        let pool = BufferPool::new(&backend, &COMPLEX_TO_ARG, 128).unwrap();
        assert!(pool.buffer(BufferRole::Output1).is_none());
        assert_eq!(pool.args().len(), 2);
    }

    #[test]
    fn test_grows_only_when_needed() {
        let backend = HostBackend::default();
        let mut pool = BufferPool::new(&backend, &COMPLEX_TO_ARG, 64).unwrap();

        assert!(!pool.ensure_capacity(&backend, 64).unwrap());
        assert!(!pool.ensure_capacity(&backend, 10).unwrap());
        assert_eq!(pool.resizes(), 0);

        assert!(pool.ensure_capacity(&backend, 65).unwrap());
        assert_eq!(pool.capacity(), 65);
        assert_eq!(pool.resizes(), 1);

        assert!(!pool.ensure_capacity(&backend, 32).unwrap());
        assert_eq!(pool.capacity(), 65);
        assert_eq!(backend.live_buffers(), 2);
    }

    #[test]
    fn test_release_all_frees_buffers() {
        let backend = HostBackend::default();
        let mut pool = BufferPool::new(&backend, &COMPLEX_TO_MAG_PHASE, 16).unwrap();
        pool.release_all(&backend);
        assert_eq!(backend.live_buffers(), 0);
        assert!(pool.args().is_empty());
    }

    #[test]
    fn test_failed_growth_leaves_pool_empty() {
        let backend = HostBackend::with_max_items(100);
        let mut pool = BufferPool::new(&backend, &COMPLEX_TO_ARG, 50).unwrap();
        let result = pool.ensure_capacity(&backend, 200);
        assert!(matches!(result, Err(BackendError::BufferTooLarge { .. })));
        assert_eq!(pool.capacity(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }
}
