//! Module Manager
//!
//! Owns the registered modules and dispatches them per phase. Modules are
//! kept sorted by priority (stable, so registration order breaks ties).
//! Every invocation runs inside an error boundary: a returned error or a
//! panic is logged against the module and phase and never propagates —
//! one misbehaving module cannot take the frame down.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use crate::errors::Result;
use crate::frame::context::FrameContext;
use crate::frame::phase::{FramePhase, ModulePhases};
use crate::tasks::TaskPool;

use super::EngineModule;

/// Outcome of one parallel-phase barrier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelDispatch {
    /// Tasks launched onto the pool.
    pub jobs: usize,
    /// Wall-clock span of the barrier.
    pub span: Duration,
}

/// Ordered module registry and phase dispatcher.
#[derive(Default)]
pub struct ModuleManager {
    modules: Vec<Box<dyn EngineModule>>,
}

impl ModuleManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module and re-sorts by priority (ascending, stable).
    pub fn register(&mut self, module: Box<dyn EngineModule>) {
        log::info!(
            "registering module '{}' (priority {}, phases {:#x})",
            module.name(),
            module.priority(),
            module.supported_phases().bits()
        );
        self.modules.push(module);
        self.modules.sort_by_key(|m| m.priority());
    }

    /// Number of registered modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Module names in execution order.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name().to_string()).collect()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initializes all modules sequentially; failures are isolated.
    pub fn initialize_all(&mut self, ctx: &mut FrameContext) {
        log::info!("initializing {} modules", self.modules.len());
        for module in &mut self.modules {
            let name = module.name().to_string();
            Self::run_isolated(&name, "Initialize", || module.initialize(ctx));
        }
    }

    /// Shuts down all modules in reverse order; failures are isolated.
    pub fn shutdown_all(&mut self, ctx: &mut FrameContext) {
        log::info!("shutting down {} modules", self.modules.len());
        for module in self.modules.iter_mut().rev() {
            let name = module.name().to_string();
            Self::run_isolated(&name, "Shutdown", || module.shutdown(ctx));
        }
    }

    // ========================================================================
    // Phase dispatch
    // ========================================================================

    /// Sequentially invokes every module participating in `phase`.
    pub fn execute_ordered(&mut self, phase: FramePhase, ctx: &mut FrameContext) {
        let Some(bit) = phase.module_bit() else {
            return;
        };
        debug_assert!(
            bit != ModulePhases::PARALLEL_WORK,
            "parallel work goes through execute_parallel_work"
        );
        for module in &mut self.modules {
            if !module.supported_phases().contains(bit) {
                continue;
            }
            let name = module.name().to_string();
            log::trace!("[{phase}] executing module '{name}'");
            Self::run_isolated(&name, phase.name(), || {
                dispatch_ordered(module.as_mut(), phase, ctx)
            });
        }
    }

    /// Runs the parallel barrier: one pool task per participating module,
    /// all joined before returning.
    pub fn execute_parallel_work(
        &self,
        pool: &TaskPool,
        ctx: &FrameContext,
    ) -> ParallelDispatch {
        let participants: Vec<&dyn EngineModule> = self
            .modules
            .iter()
            .filter(|m| m.supported_phases().contains(ModulePhases::PARALLEL_WORK))
            .map(|m| &**m)
            .collect();
        let jobs = participants.len();
        if jobs == 0 {
            return ParallelDispatch::default();
        }

        let started = Instant::now();
        pool.scope(|scope| {
            for module in participants {
                scope.spawn(move |_| {
                    Self::run_isolated(module.name(), "ParallelWork", || {
                        module.on_parallel_work(ctx)
                    });
                });
            }
        });
        let span = started.elapsed();
        log::trace!("parallel work: {jobs} task(s) in {span:?}");
        ParallelDispatch { jobs, span }
    }

    /// Sequentially ticks async-work modules (multi-frame pipelines).
    /// Returns the number ticked.
    pub fn execute_async_work(&mut self, ctx: &mut FrameContext) -> usize {
        let mut ticked = 0;
        for module in &mut self.modules {
            if !module
                .supported_phases()
                .contains(ModulePhases::ASYNC_WORK)
            {
                continue;
            }
            let name = module.name().to_string();
            Self::run_isolated(&name, "AsyncWork", || module.on_async_work(ctx));
            ticked += 1;
        }
        ticked
    }

    /// Dispatches detached background work onto the pool. Fire-and-forget
    /// from the modules' perspective; the phase barrier still joins before
    /// the frame advances.
    pub fn execute_detached_work(&self, pool: &TaskPool, ctx: &FrameContext) {
        let participants: Vec<&dyn EngineModule> = self
            .modules
            .iter()
            .filter(|m| m.supported_phases().contains(ModulePhases::DETACHED_WORK))
            .map(|m| &**m)
            .collect();
        if participants.is_empty() {
            return;
        }
        pool.scope(|scope| {
            for module in participants {
                scope.spawn(move |_| {
                    Self::run_isolated(module.name(), "DetachedWork", || {
                        module.on_detached_work(ctx)
                    });
                });
            }
        });
    }

    /// Error boundary around one module invocation: logs `Err` returns and
    /// converts panics into logged diagnostics.
    fn run_isolated(module: &str, phase: &str, f: impl FnOnce() -> Result<()>) {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("[{phase}] module '{module}' failed: {e}");
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                log::error!("[{phase}] module '{module}' panicked: {message}");
            }
        }
    }
}

/// Routes an ordered phase to the matching module hook.
fn dispatch_ordered(
    module: &mut dyn EngineModule,
    phase: FramePhase,
    ctx: &mut FrameContext,
) -> Result<()> {
    match phase {
        FramePhase::FrameStart => module.on_frame_start(ctx),
        FramePhase::Input => module.on_input(ctx),
        FramePhase::FixedSimulation => module.on_fixed_simulation(ctx),
        FramePhase::Gameplay => module.on_gameplay(ctx),
        FramePhase::NetworkReconciliation => module.on_network_reconciliation(ctx),
        FramePhase::RandomSeedManagement => module.on_random_seed_management(ctx),
        FramePhase::SceneMutation => module.on_scene_mutation(ctx),
        FramePhase::TransformPropagation => module.on_transform_propagation(ctx),
        FramePhase::SnapshotBuild => module.on_snapshot_build(ctx),
        FramePhase::PostParallel => module.on_post_parallel(ctx),
        FramePhase::FrameGraph => module.on_frame_graph(ctx),
        FramePhase::DescriptorTablePublication => module.on_descriptor_publication(ctx),
        FramePhase::ResourceStateTransitions => module.on_resource_transitions(ctx),
        FramePhase::CommandRecord => module.on_command_record(ctx),
        FramePhase::Present => module.on_present(ctx),
        FramePhase::AsyncPoll => module.on_async_work(ctx),
        FramePhase::ParallelWork
        | FramePhase::BudgetAdapt
        | FramePhase::DeferredDestruction
        | FramePhase::FrameEnd => Ok(()),
    }
}
