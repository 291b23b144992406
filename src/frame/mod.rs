//! Frame System
//!
//! The per-frame phase sequence, the controlled frame context handed to
//! modules, the immutable snapshot, frame metrics, and the orchestrator
//! that drives it all.

pub mod context;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod snapshot;

pub use context::{EngineProps, FrameContext};
pub use metrics::{FrameBudget, FrameMetrics};
pub use orchestrator::{CompletionEvent, FrameOrchestrator};
pub use phase::{FramePhase, ModulePhases, PHASE_SEQUENCE};
pub use snapshot::FrameSnapshot;
