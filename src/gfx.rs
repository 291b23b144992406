//! Graphics Layer
//!
//! The injected graphics capability object. The core never reaches for a
//! process-global: the orchestrator owns one [`GraphicsLayer`] and passes it
//! through the frame context. It carries:
//!
//! - the surface list (presentation targets with simulated record/submit/
//!   present costs),
//! - the active view set consumed by the render graph builder,
//! - the deferred reclamation queue drained as GPU frames complete,
//! - an abstract descriptor-table allocator reference.
//!
//! No GPU backend lives here; fence polling is a frame-counter placeholder
//! a backend would replace with real fence queries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::graph::types::{ResourceHandle, ViewContext, ViewIndex};

/// A rendering surface with simulated per-frame costs.
#[derive(Clone, Debug)]
pub struct RenderSurface {
    pub name: String,
    /// Simulated command recording time.
    pub record_cost: Duration,
    /// Simulated submission time.
    pub submit_cost: Duration,
    /// Simulated presentation time.
    pub present_cost: Duration,
}

impl RenderSurface {
    /// Creates a surface with the default simulated costs.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_cost: Duration::from_micros(800),
            submit_cost: Duration::from_micros(200),
            present_cost: Duration::from_micros(300),
        }
    }
}

/// One deferred reclamation scheduled by the executor.
#[derive(Clone, Debug)]
pub struct PendingReclaim {
    /// Frame the resource was last used in.
    pub frame_index: u64,
    /// Graph handle of the resource (local to that frame's graph).
    pub resource: ResourceHandle,
    /// Debug name carried for diagnostics.
    pub debug_name: String,
}

/// Abstract reference to the global descriptor-table allocator.
///
/// Only publication epochs and allocation counters are modeled; a real
/// backend supplies the heap.
#[derive(Default, Debug)]
pub struct DescriptorAllocator {
    published_epoch: AtomicU64,
}

impl DescriptorAllocator {
    /// Publishes the bindless tables for this frame; returns the new epoch.
    pub fn publish(&self) -> u64 {
        self.published_epoch.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Epoch of the most recent publication.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.published_epoch.load(Ordering::Relaxed)
    }
}

/// Injected graphics capability shared across phases.
#[derive(Default)]
pub struct GraphicsLayer {
    surfaces: RwLock<Vec<RenderSurface>>,
    views: RwLock<Vec<ViewContext>>,
    reclaims: Mutex<Vec<PendingReclaim>>,
    /// Highest frame index whose GPU work is known complete.
    completed_frame: AtomicU64,
    presented_frames: AtomicU64,
    descriptors: DescriptorAllocator,
}

impl GraphicsLayer {
    /// Creates an empty layer (no surfaces, no views).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Surfaces ───────────────────────────────────────────────────────────

    /// Adds a presentation surface.
    pub fn add_surface(&self, surface: RenderSurface) {
        self.surfaces.write().push(surface);
    }

    /// Removes all surfaces.
    pub fn clear_surfaces(&self) {
        self.surfaces.write().clear();
    }

    /// Snapshot of the surface list.
    #[must_use]
    pub fn surfaces(&self) -> Vec<RenderSurface> {
        self.surfaces.read().clone()
    }

    /// Number of configured surfaces.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.read().len()
    }

    /// Presents every surface for `frame_index`; returns the summed
    /// simulated record+submit+present cost.
    pub fn present_all(&self, frame_index: u64) -> Duration {
        let surfaces = self.surfaces.read();
        let mut total = Duration::ZERO;
        for surface in surfaces.iter() {
            total += surface.record_cost + surface.submit_cost + surface.present_cost;
            log::trace!("presented surface '{}' (frame {frame_index})", surface.name);
        }
        self.presented_frames.fetch_add(1, Ordering::Relaxed);
        total
    }

    /// Number of frames presented so far.
    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames.load(Ordering::Relaxed)
    }

    // ── Views ──────────────────────────────────────────────────────────────

    /// Adds a view to the active set; returns its index.
    pub fn add_view(&self, mut view: ViewContext) -> ViewIndex {
        let mut views = self.views.write();
        let index = ViewIndex::new(views.len() as u32);
        view.index = index;
        views.push(view);
        index
    }

    /// Removes all views.
    pub fn clear_views(&self) {
        self.views.write().clear();
    }

    /// Snapshot of the active view set, in view order.
    #[must_use]
    pub fn views(&self) -> Vec<ViewContext> {
        self.views.read().clone()
    }

    /// Number of active views.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.read().len()
    }

    // ── Fences & deferred reclamation ──────────────────────────────────────

    /// Polls GPU completion at the start of `current_frame`.
    ///
    /// Placeholder model: work submitted in frame `n` completes before
    /// frame `n + 1` begins.
    pub fn poll_fences(&self, current_frame: u64) {
        let completed = current_frame.saturating_sub(1);
        self.completed_frame.fetch_max(completed, Ordering::Relaxed);
    }

    /// Queues a frame-local resource for reclamation once the GPU finishes
    /// `frame_index`.
    pub fn schedule_reclaim(&self, reclaim: PendingReclaim) {
        log::trace!(
            "scheduled reclaim of '{}' after frame {}",
            reclaim.debug_name,
            reclaim.frame_index
        );
        self.reclaims.lock().push(reclaim);
    }

    /// Drains reclaims whose frame has completed on the GPU.
    pub fn drain_completed_reclaims(&self) -> Vec<PendingReclaim> {
        let completed = self.completed_frame.load(Ordering::Relaxed);
        let mut queue = self.reclaims.lock();
        let (done, pending): (Vec<_>, Vec<_>) = queue
            .drain(..)
            .partition(|r| r.frame_index <= completed);
        *queue = pending;
        done
    }

    /// Number of reclaims still waiting on GPU completion.
    #[must_use]
    pub fn pending_reclaim_count(&self) -> usize {
        self.reclaims.lock().len()
    }

    // ── Descriptors ────────────────────────────────────────────────────────

    /// The abstract descriptor-table allocator.
    #[must_use]
    pub fn descriptors(&self) -> &DescriptorAllocator {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reclaims_drain_only_after_fence_completes() {
        let gfx = GraphicsLayer::new();
        gfx.schedule_reclaim(PendingReclaim {
            frame_index: 5,
            resource: ResourceHandle::new(0),
            debug_name: "scratch".into(),
        });
        gfx.poll_fences(5);
        assert!(gfx.drain_completed_reclaims().is_empty());
        gfx.poll_fences(6);
        assert_eq!(gfx.drain_completed_reclaims().len(), 1);
        assert_eq!(gfx.pending_reclaim_count(), 0);
    }

    #[test]
    fn views_are_indexed_in_insertion_order() {
        let gfx = GraphicsLayer::new();
        let a = gfx.add_view(ViewContext::named("main"));
        let b = gfx.add_view(ViewContext::named("shadow"));
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(gfx.views()[1].name, "shadow");
    }
}
