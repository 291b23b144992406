//! Resource State Tracker
//!
//! Plans state transitions per `(resource, view)` slot. A transition is
//! recorded only when the requested state differs from the current one;
//! the current state updates on every request either way.

use rustc_hash::FxHashMap;

use super::resource::ResourceState;
use super::types::{PassHandle, ResourceHandle, ViewIndex};

/// One planned state transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transition {
    pub resource: ResourceHandle,
    pub from: ResourceState,
    pub to: ResourceState,
    pub at_pass: PassHandle,
    pub view: ViewIndex,
}

/// Single-threaded transition planner owned by the executor.
#[derive(Default)]
pub struct ResourceStateTracker {
    current: FxHashMap<(ResourceHandle, ViewIndex), ResourceState>,
    planned: Vec<Transition>,
}

impl ResourceStateTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the state of a `(resource, view)` slot without planning a
    /// transition.
    pub fn set_initial_state(
        &mut self,
        resource: ResourceHandle,
        state: ResourceState,
        view: ViewIndex,
    ) {
        self.current.insert((resource, view), state);
    }

    /// Requests that `resource` be in `new_state` at `pass` for `view`.
    ///
    /// Returns the planned transition, or `None` when the slot is already
    /// in the requested state.
    pub fn request_transition(
        &mut self,
        resource: ResourceHandle,
        new_state: ResourceState,
        pass: PassHandle,
        view: ViewIndex,
    ) -> Option<Transition> {
        let slot = (resource, view);
        let from = self
            .current
            .get(&slot)
            .copied()
            .unwrap_or(ResourceState::Undefined);
        if from == new_state {
            return None;
        }
        self.current.insert(slot, new_state);
        let transition = Transition {
            resource,
            from,
            to: new_state,
            at_pass: pass,
            view,
        };
        self.planned.push(transition);
        Some(transition)
    }

    /// Current state of a slot, `Undefined` when never seeded.
    #[must_use]
    pub fn current_state(&self, resource: ResourceHandle, view: ViewIndex) -> ResourceState {
        self.current
            .get(&(resource, view))
            .copied()
            .unwrap_or(ResourceState::Undefined)
    }

    /// All transitions planned so far, in request order.
    #[must_use]
    pub fn planned_transitions(&self) -> &[Transition] {
        &self.planned
    }

    /// Clears the tracker for a new frame.
    pub fn reset(&mut self) {
        self.current.clear();
        self.planned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_state_request_plans_nothing() {
        let mut tracker = ResourceStateTracker::new();
        let r = ResourceHandle::new(0);
        let v = ViewIndex::new(0);
        tracker.set_initial_state(r, ResourceState::Common, v);
        assert!(
            tracker
                .request_transition(r, ResourceState::Common, PassHandle::new(0), v)
                .is_none()
        );
        assert!(tracker.planned_transitions().is_empty());
    }

    #[test]
    fn transitions_are_tracked_per_view() {
        let mut tracker = ResourceStateTracker::new();
        let r = ResourceHandle::new(0);
        for view in 0..2 {
            let v = ViewIndex::new(view);
            tracker.set_initial_state(r, ResourceState::Undefined, v);
            let t = tracker
                .request_transition(r, ResourceState::RenderTarget, PassHandle::new(1), v)
                .unwrap();
            assert_eq!(t.from, ResourceState::Undefined);
        }
        assert_eq!(tracker.planned_transitions().len(), 2);
        assert_eq!(
            tracker.current_state(r, ViewIndex::new(1)),
            ResourceState::RenderTarget
        );
    }
}
