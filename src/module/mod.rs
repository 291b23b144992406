//! Engine Module Protocol
//!
//! Modules are the engine's unit of participation: each declares a name,
//! an execution priority, and the set of frame phases it takes part in,
//! then implements the matching hooks. All hooks default to no-ops.
//!
//! # Dispatch modalities
//!
//! | Modality | Hooks | Contract |
//! |----------|-------|----------|
//! | Ordered | `on_frame_start` … `on_present` | sequential, priority order, may mutate state |
//! | Parallel | `on_parallel_work` | concurrent on the task pool, snapshot reads only |
//! | Async | `on_async_work` | ticked once per frame for multi-frame pipelines |
//! | Detached | `on_detached_work` | fire-and-forget background services |
//!
//! The parallel hook takes `&self` — a module cannot mutate itself there,
//! matching the frame context's `can_mutate_state()` rule at the type
//! level.

pub mod manager;

pub use manager::{ModuleManager, ParallelDispatch};

use crate::errors::Result;
use crate::frame::context::FrameContext;
use crate::frame::phase::ModulePhases;

/// Module execution priority; lower values run first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ModulePriority(pub u32);

impl ModulePriority {
    /// System-critical modules (input, core systems).
    pub const CRITICAL: Self = Self(0);
    /// High-priority gameplay modules.
    pub const HIGH: Self = Self(100);
    /// Standard gameplay modules.
    pub const NORMAL: Self = Self(500);
    /// Non-critical modules (debug, profiling).
    pub const LOW: Self = Self(800);
    /// Background services.
    pub const BACKGROUND: Self = Self(900);
}

impl std::fmt::Display for ModulePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::CRITICAL => f.write_str("Critical"),
            Self::HIGH => f.write_str("High"),
            Self::NORMAL => f.write_str("Normal"),
            Self::LOW => f.write_str("Low"),
            Self::BACKGROUND => f.write_str("Background"),
            Self(value) => write!(f, "{value}"),
        }
    }
}

impl Default for ModulePriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// A registered engine module.
///
/// Implement the hooks for the phases declared in `supported_phases`;
/// everything else stays a no-op.
#[allow(unused_variables)]
pub trait EngineModule: Send + Sync {
    /// Module name for diagnostics and lookup.
    fn name(&self) -> &str;

    /// Execution priority; lower runs first. Ties break by registration
    /// order.
    fn priority(&self) -> ModulePriority {
        ModulePriority::NORMAL
    }

    /// Phases this module participates in.
    fn supported_phases(&self) -> ModulePhases;

    /// One-time setup before the first frame.
    fn initialize(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Teardown after the last frame; runs in reverse registration order.
    fn shutdown(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    // ── Ordered phases ─────────────────────────────────────────────────────

    /// Epoch advance; surfaces and views may be registered here.
    fn on_frame_start(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Input sampling.
    fn on_input(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Fixed timestep simulation.
    fn on_fixed_simulation(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Variable gameplay logic.
    fn on_gameplay(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Network packet application and reconciliation.
    fn on_network_reconciliation(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Random seed management for determinism.
    fn on_random_seed_management(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Structural scene changes.
    fn on_scene_mutation(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Transform hierarchy updates.
    fn on_transform_propagation(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Snapshot construction; publish via `ctx.publish_snapshot`.
    fn on_snapshot_build(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Integration of parallel results.
    fn on_post_parallel(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Render graph contribution via `ctx.render_graph_builder()`.
    fn on_frame_graph(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Bindless descriptor table publication.
    fn on_descriptor_publication(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// GPU resource state planning.
    fn on_resource_transitions(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Command list recording.
    fn on_command_record(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    /// Final presentation.
    fn on_present(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    // ── Parallel phase ─────────────────────────────────────────────────────

    /// Concurrent work over the immutable snapshot. No mutable access to
    /// authoritative state.
    fn on_parallel_work(&self, ctx: &FrameContext) -> Result<()> {
        Ok(())
    }

    // ── Async phase ────────────────────────────────────────────────────────

    /// Multi-frame pipeline tick (asset streaming, compilation, ...).
    fn on_async_work(&mut self, ctx: &mut FrameContext) -> Result<()> {
        Ok(())
    }

    // ── Detached phase ─────────────────────────────────────────────────────

    /// Fire-and-forget background service tick; errors are logged only.
    fn on_detached_work(&self, ctx: &FrameContext) -> Result<()> {
        Ok(())
    }
}
