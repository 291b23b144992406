//! Asset Dependency Graph
//!
//! Directed acyclic graph over asset keys. An edge `A -> B` means "A depends
//! on B". Two indices are kept consistent at all times: the forward map
//! (dependencies of A, in insertion order) and the reverse map (dependents
//! of B). Insertion order matters — cascaded release walks dependencies
//! deterministically in the order they were registered.

use rustc_hash::{FxHashMap, FxHashSet};

use super::key::AssetKey;

/// Forward/reverse dependency indices with cycle rejection.
///
/// The graph itself is policy-free: [`DependencyGraph::add_edge`] refuses
/// duplicates and reports nothing else. The loader layers the debug-abort /
/// release-no-op cycle policy on top via [`DependencyGraph::would_create_cycle`].
#[derive(Default)]
pub struct DependencyGraph {
    forward: FxHashMap<AssetKey, Vec<AssetKey>>,
    reverse: FxHashMap<AssetKey, Vec<AssetKey>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if inserting `from -> to` would close a cycle.
    ///
    /// Walks forward edges from `to` looking for `from`. A self-edge is
    /// always a cycle.
    #[must_use]
    pub fn would_create_cycle(&self, from: AssetKey, to: AssetKey) -> bool {
        if from == to {
            return true;
        }
        let mut visited = FxHashSet::default();
        let mut stack = vec![to];
        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = self.forward.get(&current) {
                stack.extend(deps.iter().copied());
            }
        }
        false
    }

    /// Inserts the edge `from -> to`, keeping both indices consistent.
    ///
    /// Returns `false` without modification if the edge already exists.
    /// Callers must have rejected cycles beforehand.
    pub fn add_edge(&mut self, from: AssetKey, to: AssetKey) -> bool {
        let deps = self.forward.entry(from).or_default();
        if deps.contains(&to) {
            return false;
        }
        deps.push(to);
        self.reverse.entry(to).or_default().push(from);
        true
    }

    /// Dependencies of `key` in registration order.
    #[must_use]
    pub fn dependencies_of(&self, key: AssetKey) -> &[AssetKey] {
        self.forward.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Dependents of `key` in registration order.
    #[must_use]
    pub fn dependents_of(&self, key: AssetKey) -> &[AssetKey] {
        self.reverse.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Whether any dependent still references `key`.
    #[must_use]
    pub fn has_dependents(&self, key: AssetKey) -> bool {
        !self.dependents_of(key).is_empty()
    }

    /// Removes `key` and all its outgoing edges.
    ///
    /// Returns the former dependencies in registration order so the caller
    /// can cascade releases deterministically. Incoming edges are left to
    /// their owners; eviction requires `dependents_of(key)` to already be
    /// empty.
    pub fn remove_vertex(&mut self, key: AssetKey) -> Vec<AssetKey> {
        let deps = self.forward.remove(&key).unwrap_or_default();
        for dep in &deps {
            if let Some(dependents) = self.reverse.get_mut(dep) {
                dependents.retain(|d| *d != key);
                if dependents.is_empty() {
                    self.reverse.remove(dep);
                }
            }
        }
        self.reverse.remove(&key);
        deps
    }

    /// Drops every edge in the graph.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}
