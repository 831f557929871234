//! Unique index allocation for registered devices.
//!
//! Hands out the smallest non-negative integer not currently in use and
//! takes it back on release, so device names stay dense and an index freed
//! by one device can be reused by the next.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::error::MbusError;

/// Smallest-available index allocator.
///
/// Safe to call from multiple threads; allocate and release are mutually
/// exclusive so index reuse cannot race a concurrent lookup.
#[derive(Debug, Default)]
pub struct IndexAllocator {
    inner: Mutex<AllocatorState>,
}

#[derive(Debug, Default)]
struct AllocatorState {
    /// Next never-allocated index; everything below it is either live or in
    /// `free`.
    next: u32,
    /// Released indices below `next`, available for reuse.
    free: BTreeSet<u32>,
}

impl IndexAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the smallest currently-unused index.
    ///
    /// Fails with [`MbusError::AllocationFailed`] only once the entire u32
    /// space is live, which is practically unreachable.
    pub fn allocate(&self) -> Result<u32, MbusError> {
        let mut state = self.inner.lock();
        if let Some(&index) = state.free.iter().next() {
            state.free.remove(&index);
            return Ok(index);
        }
        if state.next == u32::MAX {
            return Err(MbusError::AllocationFailed);
        }
        let index = state.next;
        state.next += 1;
        Ok(index)
    }

    /// Return an index to the free pool.
    ///
    /// Releasing an index that is not currently allocated is a caller
    /// contract violation; it is logged and ignored.
    pub fn release(&self, index: u32) {
        let mut state = self.inner.lock();
        if index >= state.next {
            log::debug!("release of never-allocated index {index} ignored");
        } else if !state.free.insert(index) {
            log::debug!("double release of index {index} ignored");
        }
    }

    /// Number of indices currently allocated.
    pub fn in_use(&self) -> usize {
        let state = self.inner.lock();
        state.next as usize - state.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_allocates_dense_indices() {
        let ida = IndexAllocator::new();
        for expected in 0..8 {
            assert_eq!(ida.allocate().unwrap(), expected);
        }
        assert_eq!(ida.in_use(), 8);
    }

    #[test]
    fn test_release_then_allocate_reuses_smallest() {
        let ida = IndexAllocator::new();
        for _ in 0..5 {
            ida.allocate().unwrap();
        }
        ida.release(3);
        ida.release(1);
        assert_eq!(ida.allocate().unwrap(), 1);
        assert_eq!(ida.allocate().unwrap(), 3);
        assert_eq!(ida.allocate().unwrap(), 5);
    }

    #[test]
    fn test_release_unallocated_is_ignored() {
        let ida = IndexAllocator::new();
        ida.release(10);
        assert_eq!(ida.allocate().unwrap(), 0);
        assert_eq!(ida.in_use(), 1);
    }

    #[test]
    fn test_concurrent_allocation_yields_distinct_indices() {
        let ida = Arc::new(IndexAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ida = ida.clone();
            handles.push(std::thread::spawn(move || {
                (0..100)
                    .map(|_| ida.allocate().unwrap())
                    .collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(*all.last().unwrap(), 799);
    }
}
