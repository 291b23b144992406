//! # Cadence Engine
//!
//! A cooperative frame-orchestration kernel: a phased game loop with
//! priority-ordered module dispatch, a dependency-aware asset cache over
//! mountable content containers, and a per-frame render graph that is
//! expanded per view, validated, scheduled across queues, and executed
//! against an abstract command recorder.
//!
//! # Architecture
//!
//! - [`frame`] — the fixed 20-phase sequence, the controlled
//!   [`FrameContext`](frame::FrameContext), frame snapshots, pacing, and
//!   the [`FrameOrchestrator`](frame::FrameOrchestrator)
//! - [`module`] — the [`EngineModule`](module::EngineModule) protocol and
//!   the priority-ordered [`ModuleManager`](module::ModuleManager)
//! - [`content`] — the [`AssetLoader`](content::AssetLoader): packed and
//!   loose-cooked mounts, refcounted caching, the dependency DAG, and
//!   eviction events
//! - [`graph`] — the render graph: builder, per-view expansion, shared
//!   read-only promotion, validator, scheduler, lifetime/alias analysis,
//!   state tracking, and the executor
//! - [`tasks`] — the work-stealing task pool and cancellation tokens
//! - [`gfx`] — the injected graphics capability (surfaces, views, fences,
//!   deferred reclamation)
//! - [`io`] — explicit little-endian binary readers and writers
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence::frame::{EngineProps, FrameOrchestrator};
//! use cadence::gfx::{GraphicsLayer, RenderSurface};
//! use cadence::module::ModuleManager;
//! use cadence::tasks::TaskPool;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(TaskPool::new(0)?);
//! let graphics = Arc::new(GraphicsLayer::new());
//! graphics.add_surface(RenderSurface::new("main"));
//!
//! let mut manager = ModuleManager::new();
//! manager.register(Box::new(MyGameModule::new()));
//!
//! let mut orchestrator = FrameOrchestrator::new(
//!     manager,
//!     pool,
//!     graphics,
//!     EngineProps { target_fps: 60 },
//! );
//! orchestrator.run(600)?;
//! ```

pub mod content;
pub mod errors;
pub mod frame;
pub mod gfx;
pub mod graph;
pub mod io;
pub mod module;
pub mod tasks;

pub use errors::{EngineError, Result};
