//! Frame Phases
//!
//! The fixed per-frame phase sequence the orchestrator traverses, and the
//! bitset modules use to declare participation.
//!
//! # Phase Overview
//!
//! | Group | Phases | Dispatch |
//! |-------|--------|----------|
//! | Frame setup | `FrameStart` | ordered |
//! | Simulation | `Input` … `TransformPropagation` | ordered |
//! | Snapshot | `SnapshotBuild` | ordered, publishes the frame snapshot |
//! | Parallel | `ParallelWork` | barrier over the task pool |
//! | Render prep | `PostParallel` … `CommandRecord` | ordered |
//! | Presentation | `Present` | ordered, synchronous per surface |
//! | Frame close | `AsyncPoll` … `FrameEnd` | orchestrator-internal + async tick |

use bitflags::bitflags;

/// One step of the fixed per-frame sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FramePhase {
    /// Epoch advance, fence polling of previously submitted work.
    FrameStart = 0,
    /// Input sampling.
    Input,
    /// Fixed timestep simulation.
    FixedSimulation,
    /// Variable gameplay logic.
    Gameplay,
    /// Network packet application and reconciliation.
    NetworkReconciliation,
    /// Random seed management for determinism.
    RandomSeedManagement,
    /// Structural scene changes (spawn/despawn, reparent).
    SceneMutation,
    /// Transform hierarchy updates.
    TransformPropagation,
    /// Publishes the immutable frame snapshot.
    SnapshotBuild,
    /// Barrier over all modules declaring parallel work.
    ParallelWork,
    /// Integration of parallel results.
    PostParallel,
    /// Render graph builder collection.
    FrameGraph,
    /// Global descriptor/bindless table publication.
    DescriptorTablePublication,
    /// Resource state transition planning.
    ResourceStateTransitions,
    /// Command list recording.
    CommandRecord,
    /// Synchronous presentation per surface.
    Present,
    /// Multi-frame pipelines ticked.
    AsyncPoll,
    /// Per-frame time budget adaptation.
    BudgetAdapt,
    /// Deferred destruction queue drain.
    DeferredDestruction,
    /// Metrics and frame time accounting.
    FrameEnd,
}

/// The full sequence in execution order.
pub const PHASE_SEQUENCE: [FramePhase; 20] = [
    FramePhase::FrameStart,
    FramePhase::Input,
    FramePhase::FixedSimulation,
    FramePhase::Gameplay,
    FramePhase::NetworkReconciliation,
    FramePhase::RandomSeedManagement,
    FramePhase::SceneMutation,
    FramePhase::TransformPropagation,
    FramePhase::SnapshotBuild,
    FramePhase::ParallelWork,
    FramePhase::PostParallel,
    FramePhase::FrameGraph,
    FramePhase::DescriptorTablePublication,
    FramePhase::ResourceStateTransitions,
    FramePhase::CommandRecord,
    FramePhase::Present,
    FramePhase::AsyncPoll,
    FramePhase::BudgetAdapt,
    FramePhase::DeferredDestruction,
    FramePhase::FrameEnd,
];

impl FramePhase {
    /// Phase name (for diagnostics).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrameStart => "FrameStart",
            Self::Input => "Input",
            Self::FixedSimulation => "FixedSimulation",
            Self::Gameplay => "Gameplay",
            Self::NetworkReconciliation => "NetworkReconciliation",
            Self::RandomSeedManagement => "RandomSeedManagement",
            Self::SceneMutation => "SceneMutation",
            Self::TransformPropagation => "TransformPropagation",
            Self::SnapshotBuild => "SnapshotBuild",
            Self::ParallelWork => "ParallelWork",
            Self::PostParallel => "PostParallel",
            Self::FrameGraph => "FrameGraph",
            Self::DescriptorTablePublication => "DescriptorTablePublication",
            Self::ResourceStateTransitions => "ResourceStateTransitions",
            Self::CommandRecord => "CommandRecord",
            Self::Present => "Present",
            Self::AsyncPoll => "AsyncPoll",
            Self::BudgetAdapt => "BudgetAdapt",
            Self::DeferredDestruction => "DeferredDestruction",
            Self::FrameEnd => "FrameEnd",
        }
    }

    /// The participation bit modules declare for this phase, if the phase
    /// dispatches to modules at all.
    #[must_use]
    pub const fn module_bit(self) -> Option<ModulePhases> {
        match self {
            Self::FrameStart => Some(ModulePhases::FRAME_START),
            Self::Input => Some(ModulePhases::INPUT),
            Self::FixedSimulation => Some(ModulePhases::FIXED_SIMULATION),
            Self::Gameplay => Some(ModulePhases::GAMEPLAY),
            Self::NetworkReconciliation => Some(ModulePhases::NETWORK_RECONCILIATION),
            Self::RandomSeedManagement => Some(ModulePhases::RANDOM_SEED_MANAGEMENT),
            Self::SceneMutation => Some(ModulePhases::SCENE_MUTATION),
            Self::TransformPropagation => Some(ModulePhases::TRANSFORM_PROPAGATION),
            Self::SnapshotBuild => Some(ModulePhases::SNAPSHOT_BUILD),
            Self::ParallelWork => Some(ModulePhases::PARALLEL_WORK),
            Self::PostParallel => Some(ModulePhases::POST_PARALLEL),
            Self::FrameGraph => Some(ModulePhases::FRAME_GRAPH),
            Self::DescriptorTablePublication => Some(ModulePhases::DESCRIPTOR_PUBLICATION),
            Self::ResourceStateTransitions => Some(ModulePhases::RESOURCE_TRANSITIONS),
            Self::CommandRecord => Some(ModulePhases::COMMAND_RECORD),
            Self::Present => Some(ModulePhases::PRESENT),
            Self::AsyncPoll => Some(ModulePhases::ASYNC_WORK),
            Self::BudgetAdapt | Self::DeferredDestruction | Self::FrameEnd => None,
        }
    }
}

impl std::fmt::Display for FramePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Frame phases a module participates in.
    ///
    /// The low bits are the ordered phases (sequential, deterministic);
    /// parallel, async, and detached work live in their own bit ranges so
    /// the dispatch modality is visible in the mask itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModulePhases: u32 {
        // Ordered phases: sequential, may mutate authoritative state.
        const FRAME_START = 1 << 0;
        const INPUT = 1 << 1;
        const FIXED_SIMULATION = 1 << 2;
        const GAMEPLAY = 1 << 3;
        const NETWORK_RECONCILIATION = 1 << 4;
        const RANDOM_SEED_MANAGEMENT = 1 << 5;
        const SCENE_MUTATION = 1 << 6;
        const TRANSFORM_PROPAGATION = 1 << 7;
        const SNAPSHOT_BUILD = 1 << 8;
        const POST_PARALLEL = 1 << 9;
        const FRAME_GRAPH = 1 << 10;
        const DESCRIPTOR_PUBLICATION = 1 << 11;
        const RESOURCE_TRANSITIONS = 1 << 12;
        const COMMAND_RECORD = 1 << 13;
        const PRESENT = 1 << 14;

        // Parallel phase: concurrent, snapshot-only.
        const PARALLEL_WORK = 1 << 16;

        // Async phase: multi-frame pipelines ticked once per frame.
        const ASYNC_WORK = 1 << 20;

        // Detached phase: fire-and-forget background services.
        const DETACHED_WORK = 1 << 24;

        // Common combinations.
        const CORE_GAMEPLAY = Self::INPUT.bits()
            | Self::FIXED_SIMULATION.bits()
            | Self::GAMEPLAY.bits()
            | Self::SCENE_MUTATION.bits()
            | Self::TRANSFORM_PROPAGATION.bits();
        const RENDERING = Self::SNAPSHOT_BUILD.bits()
            | Self::PARALLEL_WORK.bits()
            | Self::POST_PARALLEL.bits()
            | Self::FRAME_GRAPH.bits()
            | Self::COMMAND_RECORD.bits()
            | Self::PRESENT.bits();
    }
}
