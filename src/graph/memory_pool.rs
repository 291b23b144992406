//! Memory Pool
//!
//! Bump allocator with a free list, used to pack aliased transient
//! resources into one backing allocation. Freed blocks are recycled
//! first-fit; `coalesce` merges adjacent free blocks after churn.

use rustc_hash::FxHashMap;

use super::types::ResourceHandle;

#[derive(Clone, Copy, Debug)]
struct Block {
    offset: u64,
    size: u64,
}

/// Offset allocator over one fixed-size span.
pub struct MemoryPool {
    total_size: u64,
    cursor: u64,
    free: Vec<Block>,
    live: FxHashMap<ResourceHandle, Block>,
    used: u64,
    peak: u64,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

impl MemoryPool {
    /// Creates a pool spanning `total_size` bytes.
    #[must_use]
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            cursor: 0,
            free: Vec::new(),
            live: FxHashMap::default(),
            used: 0,
            peak: 0,
        }
    }

    /// Allocates `size` bytes for `resource` at the given power-of-two
    /// alignment; returns the offset, or `None` when the pool is exhausted.
    pub fn allocate(
        &mut self,
        resource: ResourceHandle,
        size: u64,
        alignment: u64,
    ) -> Option<u64> {
        debug_assert!(!self.live.contains_key(&resource), "double allocate");

        // First fit from the free list.
        let reuse = self.free.iter().position(|b| {
            let aligned = align_up(b.offset, alignment);
            aligned + size <= b.offset + b.size
        });
        let block = if let Some(index) = reuse {
            let candidate = self.free.remove(index);
            let aligned = align_up(candidate.offset, alignment);
            // Return any leading slack to the free list.
            if aligned > candidate.offset {
                self.free.push(Block {
                    offset: candidate.offset,
                    size: aligned - candidate.offset,
                });
            }
            let tail = candidate.offset + candidate.size - (aligned + size);
            if tail > 0 {
                self.free.push(Block {
                    offset: aligned + size,
                    size: tail,
                });
            }
            Block {
                offset: aligned,
                size,
            }
        } else {
            let aligned = align_up(self.cursor, alignment);
            if aligned + size > self.total_size {
                return None;
            }
            self.cursor = aligned + size;
            Block {
                offset: aligned,
                size,
            }
        };

        self.used += block.size;
        self.peak = self.peak.max(self.used);
        self.live.insert(resource, block);
        Some(block.offset)
    }

    /// Releases the block held by `resource`.
    pub fn free(&mut self, resource: ResourceHandle) {
        if let Some(block) = self.live.remove(&resource) {
            self.used -= block.size;
            self.free.push(block);
        }
    }

    /// Merges adjacent free blocks.
    pub fn coalesce(&mut self) {
        if self.free.len() < 2 {
            return;
        }
        self.free.sort_by_key(|b| b.offset);
        let mut merged: Vec<Block> = Vec::with_capacity(self.free.len());
        for block in self.free.drain(..) {
            match merged.last_mut() {
                Some(last) if last.offset + last.size == block.offset => {
                    last.size += block.size;
                }
                _ => merged.push(block),
            }
        }
        self.free = merged;
    }

    /// Bytes currently allocated.
    #[must_use]
    pub fn used_size(&self) -> u64 {
        self.used
    }

    /// High-water mark of allocated bytes.
    #[must_use]
    pub fn peak_usage(&self) -> u64 {
        self.peak
    }

    /// Total pool span.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_blocks_are_reused() {
        let mut pool = MemoryPool::new(1024);
        let a = ResourceHandle::new(0);
        let b = ResourceHandle::new(1);
        let offset_a = pool.allocate(a, 512, 16).unwrap();
        pool.free(a);
        let offset_b = pool.allocate(b, 256, 16).unwrap();
        assert_eq!(offset_a, offset_b);
        assert_eq!(pool.used_size(), 256);
        assert_eq!(pool.peak_usage(), 512);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut pool = MemoryPool::new(100);
        assert!(pool.allocate(ResourceHandle::new(0), 64, 16).is_some());
        assert!(pool.allocate(ResourceHandle::new(1), 64, 16).is_none());
    }

    #[test]
    fn coalesce_merges_neighbors() {
        let mut pool = MemoryPool::new(1024);
        let handles: Vec<_> = (0..4).map(ResourceHandle::new).collect();
        for h in &handles {
            pool.allocate(*h, 128, 16).unwrap();
        }
        for h in &handles {
            pool.free(*h);
        }
        pool.coalesce();
        // One merged 512-byte block can now serve a large request.
        assert!(pool.allocate(ResourceHandle::new(9), 512, 16).is_some());
    }

    #[test]
    fn alignment_is_respected() {
        let mut pool = MemoryPool::new(1024);
        pool.allocate(ResourceHandle::new(0), 10, 16).unwrap();
        let offset = pool.allocate(ResourceHandle::new(1), 16, 256).unwrap();
        assert_eq!(offset % 256, 0);
    }
}
