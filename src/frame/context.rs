//! Frame Context
//!
//! The controlled accessor passed to every module invocation. What a
//! module may touch depends on the current phase:
//!
//! - `can_mutate_state()` — true outside the parallel phase;
//! - `snapshot()` — available only during the parallel phase, after a
//!   snapshot was published at SnapshotBuild;
//! - `render_graph_builder()` — available only during the frame-graph
//!   phase (and, read-only, during parallel work when the builder was
//!   explicitly marked thread-safe);
//! - surfaces and views may be added during FrameStart only; from the
//!   frame-graph phase onward they are read-only.

use std::sync::Arc;

use crate::content::AssetLoader;
use crate::gfx::{GraphicsLayer, RenderSurface};
use crate::graph::{RenderGraphBuilder, ViewContext, ViewIndex};
use crate::tasks::TaskPool;

use super::phase::FramePhase;
use super::snapshot::FrameSnapshot;

/// Engine configuration properties.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineProps {
    /// Target frames per second; `0` means uncapped.
    pub target_fps: u32,
}

/// Per-phase accessor object handed to modules.
pub struct FrameContext {
    frame_index: u64,
    props: EngineProps,
    current_phase: FramePhase,
    pool: Arc<TaskPool>,
    graphics: Arc<GraphicsLayer>,
    loader: Option<Arc<AssetLoader>>,
    snapshot: Option<Arc<FrameSnapshot>>,
    builder: Option<RenderGraphBuilder>,
}

impl FrameContext {
    /// Creates a context for one frame. Orchestrator-side API; embedders
    /// driving the module manager directly construct contexts the same way.
    #[must_use]
    pub fn new(
        frame_index: u64,
        props: EngineProps,
        pool: Arc<TaskPool>,
        graphics: Arc<GraphicsLayer>,
        loader: Option<Arc<AssetLoader>>,
    ) -> Self {
        Self {
            frame_index,
            props,
            current_phase: FramePhase::FrameStart,
            pool,
            graphics,
            loader,
            snapshot: None,
            builder: None,
        }
    }

    /// Index of the frame being processed.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Engine configuration.
    #[inline]
    #[must_use]
    pub fn props(&self) -> EngineProps {
        self.props
    }

    /// The phase currently being dispatched.
    #[inline]
    #[must_use]
    pub fn current_phase(&self) -> FramePhase {
        self.current_phase
    }

    /// The shared task pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<TaskPool> {
        &self.pool
    }

    /// The injected graphics capability.
    #[must_use]
    pub fn graphics(&self) -> &Arc<GraphicsLayer> {
        &self.graphics
    }

    /// The asset loader, when one was attached to the orchestrator.
    #[must_use]
    pub fn loader(&self) -> Option<&Arc<AssetLoader>> {
        self.loader.as_ref()
    }

    // ========================================================================
    // Access predicates
    // ========================================================================

    /// Whether modules may mutate authoritative state in this phase.
    #[must_use]
    pub fn can_mutate_state(&self) -> bool {
        self.current_phase != FramePhase::ParallelWork
    }

    /// Whether the published snapshot is readable in this phase.
    #[must_use]
    pub fn has_snapshot_access(&self) -> bool {
        self.current_phase == FramePhase::ParallelWork && self.snapshot.is_some()
    }

    /// The published snapshot; parallel phase only.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Arc<FrameSnapshot>> {
        if self.has_snapshot_access() {
            self.snapshot.as_ref()
        } else {
            None
        }
    }

    /// Publishes the frame snapshot. Honored during SnapshotBuild only.
    pub fn publish_snapshot(&mut self, snapshot: FrameSnapshot) {
        if self.current_phase == FramePhase::SnapshotBuild {
            self.snapshot = Some(Arc::new(snapshot));
        } else {
            log::warn!(
                "snapshot publication ignored outside SnapshotBuild (phase {})",
                self.current_phase
            );
        }
    }

    /// The render graph builder; frame-graph phase only.
    #[must_use]
    pub fn render_graph_builder(&mut self) -> Option<&mut RenderGraphBuilder> {
        if self.current_phase == FramePhase::FrameGraph {
            self.builder.as_mut()
        } else {
            None
        }
    }

    /// Shared read access to the builder during the parallel phase.
    ///
    /// Only available when the builder was explicitly marked thread-safe;
    /// a single-threaded builder is never exposed to pool workers.
    #[must_use]
    pub fn shared_builder(&self) -> Option<&RenderGraphBuilder> {
        if self.current_phase == FramePhase::ParallelWork {
            self.builder.as_ref().filter(|b| b.is_thread_safe())
        } else {
            None
        }
    }

    // ========================================================================
    // Surfaces & views
    // ========================================================================

    /// Adds a presentation surface. FrameStart only; ignored with a
    /// warning elsewhere.
    pub fn add_surface(&mut self, surface: RenderSurface) {
        if self.current_phase == FramePhase::FrameStart {
            self.graphics.add_surface(surface);
        } else {
            log::warn!(
                "surface registration ignored outside FrameStart (phase {})",
                self.current_phase
            );
        }
    }

    /// Adds a view to the active set. FrameStart only.
    pub fn add_view(&mut self, view: ViewContext) -> Option<ViewIndex> {
        if self.current_phase == FramePhase::FrameStart {
            Some(self.graphics.add_view(view))
        } else {
            log::warn!(
                "view registration ignored outside FrameStart (phase {})",
                self.current_phase
            );
            None
        }
    }

    /// Snapshot of the active view set.
    #[must_use]
    pub fn views(&self) -> Vec<ViewContext> {
        self.graphics.views()
    }

    // ========================================================================
    // Orchestrator-side plumbing
    // ========================================================================

    /// Advances the context to `phase`. Orchestrator-side API.
    pub fn set_phase(&mut self, phase: FramePhase) {
        self.current_phase = phase;
    }

    /// Installs the frame's builder ahead of the frame-graph phase.
    pub fn install_builder(&mut self, builder: RenderGraphBuilder) {
        self.builder = Some(builder);
    }

    /// Reclaims the builder after the frame-graph phase.
    pub fn take_builder(&mut self) -> Option<RenderGraphBuilder> {
        self.builder.take()
    }
}
