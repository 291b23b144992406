//! Graph Compilation Cache
//!
//! Caches compiled schedules keyed by the graph's structure, resource, and
//! viewport hashes, so rebuilding an identical graph replays the previous
//! scheduling decision instead of recomputing it. LRU-bounded.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::Xxh3;

use super::pass::RenderPass;
use super::resource::{Describe, ResourceInfo};
use super::scheduler::SchedulingResult;
use super::types::ViewContext;

/// Identity of one graph build.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GraphCacheKey {
    /// Hash of passes and their dependencies/accesses.
    pub structure_hash: u64,
    /// Hash of resource descriptors and placement.
    pub resource_hash: u64,
    /// Hash of the active view set.
    pub viewport_hash: u64,
}

impl GraphCacheKey {
    /// Computes the key from the builder's template tables.
    #[must_use]
    pub fn compute(
        resources: &[ResourceInfo],
        passes: &[RenderPass],
        active_views: &[ViewContext],
    ) -> Self {
        let mut structure = Xxh3::new();
        for pass in passes {
            structure.update(pass.name.as_bytes());
            structure.update(&[pass.kind as u8, pass.scope as usize as u8]);
            structure.update(&[u8::from(pass.iterate_all_views)]);
            for dep in &pass.dependencies {
                structure.update(&dep.index().to_le_bytes());
            }
            for access in pass.reads.iter().chain(pass.writes.iter()) {
                structure.update(&access.resource.index().to_le_bytes());
                structure.update(&(access.state as u32).to_le_bytes());
            }
        }

        let mut resource = Xxh3::new();
        for info in resources {
            resource.update(&info.compatibility_hash().to_le_bytes());
            resource.update(&[info.lifetime as usize as u8, info.scope as usize as u8]);
        }

        let mut viewport = Xxh3::new();
        for view in active_views {
            viewport.update(&view.index.index().to_le_bytes());
            viewport.update(&view.surface_index.to_le_bytes());
            viewport.update(&view.viewport.width.to_le_bytes());
            viewport.update(&view.viewport.height.to_le_bytes());
        }

        Self {
            structure_hash: structure.digest(),
            resource_hash: resource.digest(),
            viewport_hash: viewport.digest(),
        }
    }

    /// Single combined lookup hash.
    #[must_use]
    pub fn combined(&self) -> u64 {
        let mut h = Xxh3::new();
        h.update(&self.structure_hash.to_le_bytes());
        h.update(&self.resource_hash.to_le_bytes());
        h.update(&self.viewport_hash.to_le_bytes());
        h.digest()
    }
}

/// A cached compilation artifact.
#[derive(Clone, Debug)]
pub struct CachedCompilation {
    pub schedule: SchedulingResult,
}

/// LRU-bounded schedule cache.
pub struct GraphCache {
    entries: FxHashMap<u64, CachedCompilation>,
    lru: VecDeque<u64>,
    max_entries: usize,
}

impl GraphCache {
    /// Creates a cache bounded to `max_entries` compilations.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            lru: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Looks up a compilation, refreshing its LRU position.
    pub fn get(&mut self, key: &GraphCacheKey) -> Option<&CachedCompilation> {
        let hash = key.combined();
        if self.entries.contains_key(&hash) {
            self.touch(hash);
            self.entries.get(&hash)
        } else {
            None
        }
    }

    /// Whether a compilation for `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &GraphCacheKey) -> bool {
        self.entries.contains_key(&key.combined())
    }

    /// Stores a compilation, evicting the least recently used entry when
    /// the bound is exceeded.
    pub fn insert(&mut self, key: &GraphCacheKey, compilation: CachedCompilation) {
        let hash = key.combined();
        if self.entries.insert(hash, compilation).is_none() {
            self.lru.push_back(hash);
        } else {
            self.touch(hash);
        }
        while self.entries.len() > self.max_entries {
            if let Some(oldest) = self.lru.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Drops the compilation for `key`, if cached.
    pub fn invalidate(&mut self, key: &GraphCacheKey) {
        let hash = key.combined();
        self.entries.remove(&hash);
        self.lru.retain(|h| *h != hash);
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    /// Number of cached compilations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, hash: u64) {
        self.lru.retain(|h| *h != hash);
        self.lru.push_back(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> GraphCacheKey {
        GraphCacheKey {
            structure_hash: n,
            resource_hash: n.wrapping_mul(31),
            viewport_hash: 7,
        }
    }

    fn compilation() -> CachedCompilation {
        CachedCompilation {
            schedule: SchedulingResult::default(),
        }
    }

    #[test]
    fn lru_evicts_oldest() {
        let mut cache = GraphCache::new(2);
        cache.insert(&key(1), compilation());
        cache.insert(&key(2), compilation());
        // Touch key 1 so key 2 becomes the eviction victim.
        assert!(cache.get(&key(1)).is_some());
        cache.insert(&key(3), compilation());
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn invalidate_removes_entry() {
        let mut cache = GraphCache::new(4);
        cache.insert(&key(1), compilation());
        cache.invalidate(&key(1));
        assert!(cache.is_empty());
    }
}
