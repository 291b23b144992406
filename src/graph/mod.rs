//! Render Graph
//!
//! A per-frame declarative graph of passes over tracked GPU-style
//! resources. Modules declare resources and passes through the
//! [`RenderGraphBuilder`] during the frame-graph phase; `build()` expands
//! the declaration over the active view set, applies optimization
//! strategies, schedules across three queue types, analyzes lifetimes and
//! alias opportunities, and validates the result. The [`GraphExecutor`]
//! then plans state transitions and runs the batches against an abstract
//! command recorder.

pub mod builder;
pub mod cache;
pub mod executor;
pub mod expansion;
pub mod graph;
pub mod lifetime;
pub mod memory_pool;
pub mod optimize;
pub mod pass;
pub mod profiler;
pub mod resource;
pub mod scheduler;
pub mod state_tracker;
pub mod types;
pub mod validator;

pub use builder::RenderGraphBuilder;
pub use cache::{CachedCompilation, GraphCache, GraphCacheKey};
pub use executor::{
    CommandLog, CommandRecorder, ExecutionContext, ExecutionReport, GraphExecutor, NullRecorder,
    RecordedCommand,
};
pub use expansion::ResourceSlot;
pub use graph::RenderGraph;
pub use lifetime::{
    AliasAnalysisResult, AliasCandidate, LifetimeAnalysis, ResourceLifetimeInfo, ResourceUsage,
};
pub use memory_pool::MemoryPool;
pub use optimize::{AnalysisPass, BuildContext, GraphOptimization, SharedReadOnlyPromotion};
pub use pass::{PassBuilder, PassKind, RenderPass, ResourceAccess};
pub use profiler::PassCostProfiler;
pub use resource::{
    BufferDesc, BufferUsage, Describe, ResourceDesc, ResourceInfo, ResourceState, TextureDesc,
    TextureFormat, TextureUsage,
};
pub use scheduler::{GraphScheduler, SchedulePassDesc, SchedulingResult};
pub use state_tracker::{ResourceStateTracker, Transition};
pub use types::{
    PassCost, PassHandle, PassPriority, PassScope, QueueType, ResourceHandle, ResourceLifetime,
    ResourceScope, ViewContext, ViewIndex, Viewport,
};
pub use validator::{
    GraphValidator, Severity, ValidationError, ValidationErrorKind, ValidationResult,
    ValidatorConfig,
};
