//! Frame Orchestrator
//!
//! Drives the per-frame phase sequence for a requested number of frames,
//! integrating the module manager, the render graph pipeline, the graphics
//! layer, and the asset loader. Applies pacing toward the target frame
//! rate after present and signals a completion event when the loop exits.
//!
//! # Failure semantics
//!
//! Module errors never abort a frame (the manager isolates them). An error
//! in the orchestrator's own control flow terminates the loop early with
//! the completion event set and modules shut down in reverse order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::content::AssetLoader;
use crate::errors::Result;
use crate::gfx::GraphicsLayer;
use crate::graph::{
    CommandRecorder, GraphCache, GraphExecutor, GraphValidator, NullRecorder, PassCostProfiler,
    RenderGraph, RenderGraphBuilder,
};
use crate::module::ModuleManager;
use crate::tasks::{CancelToken, TaskPool};

use super::context::{EngineProps, FrameContext};
use super::metrics::{FrameBudget, FrameMetrics};
use super::phase::FramePhase;

/// Completion signal: poll with `triggered()` or block on `wait()`.
#[derive(Clone, Default)]
pub struct CompletionEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CompletionEvent {
    fn set(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock() = true;
        condvar.notify_all();
    }

    /// Whether the orchestrator has finished.
    #[must_use]
    pub fn triggered(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Blocks until the orchestrator finishes.
    pub fn wait(&self) {
        let (flag, condvar) = &*self.inner;
        let mut guard = flag.lock();
        while !*guard {
            condvar.wait(&mut guard);
        }
    }
}

/// The cooperative frame loop.
pub struct FrameOrchestrator {
    manager: ModuleManager,
    pool: Arc<TaskPool>,
    graphics: Arc<GraphicsLayer>,
    loader: Option<Arc<AssetLoader>>,
    props: EngineProps,

    frame_index: u64,
    stop: CancelToken,
    completed: CompletionEvent,

    profiler: Arc<Mutex<PassCostProfiler>>,
    validator: GraphValidator,
    graph_cache: GraphCache,
    executor: GraphExecutor,
    recorder: Box<dyn CommandRecorder>,

    budget: FrameBudget,
    metrics: Vec<FrameMetrics>,
    /// Deterministic stand-in for ordered-phase work, used by pacing tests.
    synthetic_phase_cost: Option<Duration>,

    current_graph: Option<RenderGraph>,
    last_report: Option<crate::graph::ExecutionReport>,
}

impl FrameOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        manager: ModuleManager,
        pool: Arc<TaskPool>,
        graphics: Arc<GraphicsLayer>,
        props: EngineProps,
    ) -> Self {
        let target = (props.target_fps > 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(props.target_fps)));
        Self {
            manager,
            pool,
            graphics,
            loader: None,
            props,
            frame_index: 0,
            stop: CancelToken::new(),
            completed: CompletionEvent::default(),
            profiler: Arc::new(Mutex::new(PassCostProfiler::new())),
            validator: GraphValidator::new(),
            graph_cache: GraphCache::new(16),
            executor: GraphExecutor::new(),
            recorder: Box::new(NullRecorder),
            budget: FrameBudget::new(target),
            metrics: Vec::new(),
            synthetic_phase_cost: None,
            current_graph: None,
            last_report: None,
        }
    }

    /// Attaches the asset loader (pumped during AsyncPoll, stopped at
    /// shutdown).
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<AssetLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replaces the command recorder the executor records into.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Box<dyn CommandRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Replaces the graph validator configuration.
    #[must_use]
    pub fn with_validator(mut self, validator: GraphValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Installs a fixed sleep standing in for ordered-phase work. Used by
    /// pacing tests to make pre-present time deterministic.
    pub fn set_synthetic_phase_cost(&mut self, cost: Duration) {
        self.synthetic_phase_cost = Some(cost);
    }

    /// The completion event; clones share the signal.
    #[must_use]
    pub fn completed(&self) -> CompletionEvent {
        self.completed.clone()
    }

    /// Requests cooperative termination at the next frame boundary.
    pub fn stop(&self) {
        self.stop.cancel();
        self.pool.cancel_all();
    }

    /// Metrics of every completed frame.
    #[must_use]
    pub fn metrics(&self) -> &[FrameMetrics] {
        &self.metrics
    }

    /// Metrics of the most recent frame.
    #[must_use]
    pub fn last_metrics(&self) -> Option<&FrameMetrics> {
        self.metrics.last()
    }

    /// Execution report of the most recent graph run.
    #[must_use]
    pub fn last_report(&self) -> Option<&crate::graph::ExecutionReport> {
        self.last_report.as_ref()
    }

    /// The shared pass-cost profiler.
    #[must_use]
    pub fn profiler(&self) -> &Arc<Mutex<PassCostProfiler>> {
        &self.profiler
    }

    /// Frames completed so far.
    #[must_use]
    pub fn frames_completed(&self) -> u64 {
        self.frame_index
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Runs `frame_count` frames (or until [`FrameOrchestrator::stop`]),
    /// then shuts modules down and triggers the completion event.
    pub fn run(&mut self, frame_count: u32) -> Result<()> {
        let outcome = self.run_inner(frame_count);
        self.finalize();
        outcome
    }

    fn run_inner(&mut self, frame_count: u32) -> Result<()> {
        log::info!(
            "frame loop starting: {frame_count} frame(s), target {} fps",
            self.props.target_fps
        );
        let mut ctx = self.make_context(0);
        self.manager.initialize_all(&mut ctx);
        drop(ctx);

        for _ in 0..frame_count {
            if self.stop.is_canceled() {
                log::info!("frame loop stopping early (cooperative cancel)");
                break;
            }
            self.run_frame()?;
        }
        Ok(())
    }

    fn finalize(&mut self) {
        let mut ctx = self.make_context(self.frame_index);
        self.manager.shutdown_all(&mut ctx);
        drop(ctx);
        if let Some(loader) = &self.loader {
            loader.stop();
        }
        self.completed.set();
        log::info!("frame loop complete after {} frame(s)", self.frame_index);
    }

    fn make_context(&self, frame_index: u64) -> FrameContext {
        FrameContext::new(
            frame_index,
            self.props,
            Arc::clone(&self.pool),
            Arc::clone(&self.graphics),
            self.loader.clone(),
        )
    }

    fn run_frame(&mut self) -> Result<()> {
        let frame_start = Instant::now();
        self.frame_index += 1;
        let frame = self.frame_index;
        log::debug!("frame {frame} begin");

        let mut ctx = self.make_context(frame);

        // FrameStart: epoch advance, fence polling, deferred reclaim drain.
        ctx.set_phase(FramePhase::FrameStart);
        self.graphics.poll_fences(frame);
        let drained = self.graphics.drain_completed_reclaims();
        if !drained.is_empty() {
            log::debug!("reclaimed {} deferred resource(s)", drained.len());
        }
        self.manager.execute_ordered(FramePhase::FrameStart, &mut ctx);

        if let Some(cost) = self.synthetic_phase_cost {
            std::thread::sleep(cost);
        }

        // Ordered simulation phases through snapshot publication.
        for phase in [
            FramePhase::Input,
            FramePhase::FixedSimulation,
            FramePhase::Gameplay,
            FramePhase::NetworkReconciliation,
            FramePhase::RandomSeedManagement,
            FramePhase::SceneMutation,
            FramePhase::TransformPropagation,
            FramePhase::SnapshotBuild,
        ] {
            ctx.set_phase(phase);
            self.manager.execute_ordered(phase, &mut ctx);
        }

        // Parallel barrier over the immutable snapshot.
        ctx.set_phase(FramePhase::ParallelWork);
        let dispatch = self.manager.execute_parallel_work(&self.pool, &ctx);

        ctx.set_phase(FramePhase::PostParallel);
        self.manager
            .execute_ordered(FramePhase::PostParallel, &mut ctx);

        // Frame graph collection and compilation.
        ctx.set_phase(FramePhase::FrameGraph);
        let builder = RenderGraphBuilder::new(frame, self.graphics.views())
            .with_profiler(Arc::clone(&self.profiler))
            .with_validator(self.validator.clone());
        ctx.install_builder(builder);
        self.manager.execute_ordered(FramePhase::FrameGraph, &mut ctx);
        if let Some(builder) = ctx.take_builder() {
            if builder.pass_count() > 0 {
                let graph = builder.build_with_cache(&mut self.graph_cache);
                if !graph.is_valid() {
                    log::error!(
                        "frame {frame}: graph failed validation, execution skipped"
                    );
                }
                self.current_graph = Some(graph);
            }
        }

        // Descriptor table publication.
        ctx.set_phase(FramePhase::DescriptorTablePublication);
        let epoch = self.graphics.descriptors().publish();
        log::trace!("descriptor tables published (epoch {epoch})");
        self.manager
            .execute_ordered(FramePhase::DescriptorTablePublication, &mut ctx);

        // Resource state transition planning.
        ctx.set_phase(FramePhase::ResourceStateTransitions);
        if let Some(graph) = self.current_graph.as_ref().filter(|g| g.is_valid()) {
            let transitions = self.executor.plan_transitions(graph);
            log::trace!("planned {} state transition(s)", transitions.len());
        }
        self.manager
            .execute_ordered(FramePhase::ResourceStateTransitions, &mut ctx);

        // Command recording: module hooks, then graph execution.
        ctx.set_phase(FramePhase::CommandRecord);
        self.manager
            .execute_ordered(FramePhase::CommandRecord, &mut ctx);
        if let Some(graph) = self.current_graph.as_mut() {
            if graph.is_valid() {
                match self
                    .executor
                    .execute(graph, self.recorder.as_mut(), Some(self.graphics.as_ref()))
                {
                    Ok(report) => self.last_report = Some(report),
                    Err(e) => log::error!("frame {frame}: graph execution failed: {e}"),
                }
            }
        }

        // Present, synchronous per surface.
        ctx.set_phase(FramePhase::Present);
        self.manager.execute_ordered(FramePhase::Present, &mut ctx);
        let present_cost = self.graphics.present_all(frame);
        log::trace!("present cost {present_cost:?}");

        // Pacing toward the target frame rate.
        let (pacing_sleep, over_budget) = self.pace(frame_start);

        // Async pipelines tick; background-load callbacks drain.
        ctx.set_phase(FramePhase::AsyncPoll);
        let async_ready = self.manager.execute_async_work(&mut ctx);
        if let Some(loader) = &self.loader {
            let drained = loader.pump_completions();
            if drained > 0 {
                log::debug!("drained {drained} background-load callback(s)");
            }
        }
        self.manager.execute_detached_work(&self.pool, &ctx);

        // Budget adaptation.
        ctx.set_phase(FramePhase::BudgetAdapt);
        let elapsed_so_far = frame_start.elapsed();
        self.budget.adapt(elapsed_so_far);
        if self.budget.is_over(elapsed_so_far) {
            log::debug!("frame {frame} exceeds the adapted budget");
        }

        // Deferred destruction: the frame's graph (and with it all pass
        // executors and descriptors) goes away; its frame-local resources
        // were queued on the graphics layer during execution.
        ctx.set_phase(FramePhase::DeferredDestruction);
        self.current_graph = None;

        // Frame end: metrics and the fairness yield.
        ctx.set_phase(FramePhase::FrameEnd);
        let frame_cpu_time = frame_start.elapsed();
        self.metrics.push(FrameMetrics {
            frame_index: frame,
            frame_cpu_time,
            parallel_span: dispatch.span,
            parallel_jobs: dispatch.jobs,
            async_ready,
            pacing_sleep,
            over_budget,
        });
        self.pool.yield_now();
        log::debug!("frame {frame} end ({frame_cpu_time:?})");
        Ok(())
    }

    /// Sleeps toward the pacing target. Over-budget frames are logged,
    /// never clamped.
    fn pace(&self, frame_start: Instant) -> (Duration, bool) {
        if self.props.target_fps == 0 {
            return (Duration::ZERO, false);
        }
        let desired = Duration::from_secs_f64(1.0 / f64::from(self.props.target_fps));
        let elapsed = frame_start.elapsed();
        if elapsed < desired {
            let sleep = desired - elapsed;
            std::thread::sleep(sleep);
            (sleep, false)
        } else {
            log::warn!(
                "frame {} over budget: {elapsed:?} against a {desired:?} target",
                self.frame_index
            );
            (Duration::ZERO, true)
        }
    }
}
