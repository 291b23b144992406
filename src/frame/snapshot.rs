//! Frame Snapshot
//!
//! Immutable per-frame blob published at the SnapshotBuild phase and read
//! by parallel work. The payload is a typed blackboard: producers insert
//! values under string keys during snapshot build; consumers read them
//! concurrently afterwards. Once published the snapshot never mutates.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Read-only world state for one frame.
pub struct FrameSnapshot {
    frame_index: u64,
    entries: FxHashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl FrameSnapshot {
    /// Creates an empty snapshot for `frame_index`.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            entries: FxHashMap::default(),
        }
    }

    /// Frame this snapshot captures.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Publishes one typed value. Build-time only; the publishing module
    /// owns the snapshot until it hands it to the context.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &'static str, value: T) {
        self.entries.insert(key, Arc::new(value));
    }

    /// Reads a typed value; `None` when absent or of a different type.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    /// Number of published entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_respects_type() {
        let mut snapshot = FrameSnapshot::new(3);
        snapshot.insert("entity_count", 42u32);
        assert_eq!(snapshot.get::<u32>("entity_count"), Some(&42));
        assert!(snapshot.get::<u64>("entity_count").is_none());
        assert!(snapshot.get::<u32>("missing").is_none());
    }
}
