//! Render Graph Executor
//!
//! Executes a built graph for the current frame: plans resource state
//! transitions, walks the level-set batches in order, invokes pass
//! executors per view, feeds measured costs back to the profiler, and
//! schedules deferred reclamation of frame-local resources.
//!
//! Commands are recorded into an abstract [`CommandRecorder`]; the
//! [`CommandLog`] implementation captures everything for inspection, and
//! a real backend would translate calls into GPU command lists. GPU
//! durations use the CPU measurement as a placeholder until a backend
//! recorder reports timestamp queries through
//! [`CommandRecorder::gpu_time_us`].

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};
use crate::gfx::{GraphicsLayer, PendingReclaim};

use super::graph::RenderGraph;
use super::state_tracker::{ResourceStateTracker, Transition};
use super::types::{PassHandle, QueueType, ResourceHandle, ResourceLifetime, ViewContext, ViewIndex};

// ============================================================================
// Command recording
// ============================================================================

/// Abstract sink for recorded graph commands.
///
/// All methods default to no-ops so backends implement only what they
/// consume.
pub trait CommandRecorder: Send {
    /// A new batch begins; `width` is the number of passes in it.
    fn begin_batch(&mut self, batch_index: usize, width: usize) {
        let _ = (batch_index, width);
    }

    /// A resource state transition is issued.
    fn transition(&mut self, transition: &Transition) {
        let _ = transition;
    }

    /// Recording for one pass begins.
    fn begin_pass(
        &mut self,
        pass: PassHandle,
        name: &str,
        queue: QueueType,
        view: Option<ViewIndex>,
    ) {
        let _ = (pass, name, queue, view);
    }

    /// Recording for one pass ends.
    fn end_pass(&mut self, pass: PassHandle) {
        let _ = pass;
    }

    /// Backend timestamp hook: measured GPU time for `pass`, if available.
    /// `None` keeps the CPU-duration placeholder.
    fn gpu_time_us(&mut self, pass: PassHandle) -> Option<u32> {
        let _ = pass;
        None
    }
}

/// Recorder that discards everything.
#[derive(Default)]
pub struct NullRecorder;

impl CommandRecorder for NullRecorder {}

/// A shared recorder handle records through its mutex, so callers can keep
/// a clone for inspection while the executor drives the other.
impl<R: CommandRecorder> CommandRecorder for std::sync::Arc<parking_lot::Mutex<R>> {
    fn begin_batch(&mut self, batch_index: usize, width: usize) {
        self.lock().begin_batch(batch_index, width);
    }

    fn transition(&mut self, transition: &Transition) {
        self.lock().transition(transition);
    }

    fn begin_pass(
        &mut self,
        pass: PassHandle,
        name: &str,
        queue: QueueType,
        view: Option<ViewIndex>,
    ) {
        self.lock().begin_pass(pass, name, queue, view);
    }

    fn end_pass(&mut self, pass: PassHandle) {
        self.lock().end_pass(pass);
    }

    fn gpu_time_us(&mut self, pass: PassHandle) -> Option<u32> {
        self.lock().gpu_time_us(pass)
    }
}

/// One captured recorder call.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    BeginBatch {
        batch_index: usize,
        width: usize,
    },
    Transition(Transition),
    BeginPass {
        pass: PassHandle,
        name: String,
        queue: QueueType,
        view: Option<ViewIndex>,
    },
    EndPass(PassHandle),
}

/// Recorder that captures every call in order, for tests and diagnostics.
#[derive(Default)]
pub struct CommandLog {
    pub commands: Vec<RecordedCommand>,
}

impl CommandLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of passes in recorded begin order.
    #[must_use]
    pub fn pass_sequence(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginPass { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl CommandRecorder for CommandLog {
    fn begin_batch(&mut self, batch_index: usize, width: usize) {
        self.commands.push(RecordedCommand::BeginBatch {
            batch_index,
            width,
        });
    }

    fn transition(&mut self, transition: &Transition) {
        self.commands.push(RecordedCommand::Transition(*transition));
    }

    fn begin_pass(
        &mut self,
        pass: PassHandle,
        name: &str,
        queue: QueueType,
        view: Option<ViewIndex>,
    ) {
        self.commands.push(RecordedCommand::BeginPass {
            pass,
            name: name.to_string(),
            queue,
            view,
        });
    }

    fn end_pass(&mut self, pass: PassHandle) {
        self.commands.push(RecordedCommand::EndPass(pass));
    }
}

// ============================================================================
// Execution context
// ============================================================================

/// Per-invocation context handed to pass executors.
pub struct ExecutionContext<'a> {
    /// Frame being executed.
    pub frame_index: u64,
    /// Handle of the executing pass.
    pub pass: PassHandle,
    /// Name of the executing pass.
    pub pass_name: &'a str,
    /// The view this invocation serves; `None` for shared passes.
    pub view: Option<ViewContext>,
    /// Recorder to emit commands into.
    pub recorder: &'a mut dyn CommandRecorder,
}

/// Outcome summary of one graph execution, exposed for diagnostics.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Width of each executed batch.
    pub batch_widths: Vec<usize>,
    /// All planned state transitions, in request order.
    pub planned_transitions: Vec<Transition>,
    /// Passes executed, with the view each invocation served.
    pub executed: Vec<(PassHandle, Option<ViewIndex>)>,
    /// Frame-local resources queued for deferred reclamation.
    pub reclaims_scheduled: usize,
}

// ============================================================================
// Executor
// ============================================================================

/// Executes built graphs; owns the state tracker.
#[derive(Default)]
pub struct GraphExecutor {
    tracker: ResourceStateTracker,
}

impl GraphExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans state transitions for the whole graph.
    ///
    /// Every live resource starts `Undefined`; passes then request their
    /// declared read/write states in execution order. Per-view passes
    /// replicate transitions per view.
    pub fn plan_transitions(&mut self, graph: &RenderGraph) -> Vec<Transition> {
        use super::resource::ResourceState;

        self.tracker.reset();
        for (index, slot) in graph.resources().iter().enumerate() {
            if slot.retired {
                continue;
            }
            let handle = ResourceHandle::new(index as u32);
            self.tracker.set_initial_state(
                handle,
                ResourceState::Undefined,
                slot.view.unwrap_or_default(),
            );
        }

        for &handle in graph.execution_order() {
            let Some(pass) = graph.pass(handle) else {
                continue;
            };
            let view = graph.pass_view(handle).unwrap_or_default();
            for access in pass.reads.iter().chain(pass.writes.iter()) {
                self.tracker
                    .request_transition(access.resource, access.state, handle, view);
            }
        }
        self.tracker.planned_transitions().to_vec()
    }

    /// Executes the graph: batches in level order, passes per view,
    /// profiler feedback, and deferred reclamation.
    ///
    /// Refuses an empty schedule and a graph with validation errors. Pass
    /// executor failures are logged and isolated; they do not abort the
    /// frame.
    pub fn execute(
        &mut self,
        graph: &mut RenderGraph,
        recorder: &mut dyn CommandRecorder,
        graphics: Option<&GraphicsLayer>,
    ) -> Result<ExecutionReport> {
        if graph.pass_count() > 0 && graph.execution_order().is_empty() {
            return Err(EngineError::EmptySchedule(
                "scheduler produced no order (circular dependency?)".into(),
            ));
        }
        if !graph.is_valid() {
            return Err(EngineError::GraphValidationFailed {
                errors: graph.validation().error_count(),
                warnings: graph.validation().warning_count(),
            });
        }

        let planned = self.plan_transitions(graph);
        let mut transitions_by_pass: FxHashMap<PassHandle, Vec<Transition>> =
            FxHashMap::default();
        for t in &planned {
            transitions_by_pass.entry(t.at_pass).or_default().push(*t);
        }

        let batches = graph.batches();
        let mut report = ExecutionReport {
            batch_widths: batches.iter().map(Vec::len).collect(),
            planned_transitions: planned,
            ..ExecutionReport::default()
        };

        let frame_index = graph.frame_index();
        for (batch_index, batch) in batches.iter().enumerate() {
            recorder.begin_batch(batch_index, batch.len());
            log::trace!("executing batch {batch_index} ({} passes)", batch.len());

            // Sequential inside the batch; recorded order is batch order.
            for &handle in batch {
                if let Some(transitions) = transitions_by_pass.get(&handle) {
                    for t in transitions {
                        recorder.transition(t);
                    }
                }

                let view_index = graph.pass_view(handle);
                let view_ctx = view_index.and_then(|v| {
                    graph.views().iter().find(|vc| vc.index == v).cloned()
                });
                let queue = graph.queue_of(handle).unwrap_or(QueueType::Graphics);
                let Some(pass) = graph.pass(handle) else {
                    continue;
                };
                let (name, executor, memory_bytes) = (
                    pass.name.clone(),
                    pass.executor.clone(),
                    pass.estimated_cost.memory_bytes,
                );

                recorder.begin_pass(handle, &name, queue, view_index);
                let started = Instant::now();
                if let Some(executor) = executor {
                    let mut ctx = ExecutionContext {
                        frame_index,
                        pass: handle,
                        pass_name: &name,
                        view: view_ctx,
                        recorder: &mut *recorder,
                    };
                    let mut callable = executor.lock();
                    if let Err(e) = (*callable)(&mut ctx) {
                        log::error!("pass '{name}' failed: {e}");
                    }
                }
                let cpu_us = started.elapsed().as_micros() as u32;
                let gpu_us = recorder.gpu_time_us(handle).unwrap_or(cpu_us);
                recorder.end_pass(handle);

                {
                    let mut profiler = graph.profiler().lock();
                    profiler.begin_pass(&name);
                    profiler.record_cpu_time(cpu_us);
                    profiler.record_gpu_time(gpu_us);
                    profiler.record_memory(memory_bytes);
                    profiler.end_pass();
                }
                report.executed.push((handle, view_index));
            }
        }

        if let Some(gfx) = graphics {
            for (index, slot) in graph.resources().iter().enumerate() {
                if slot.retired || slot.info.lifetime != ResourceLifetime::FrameLocal {
                    continue;
                }
                gfx.schedule_reclaim(PendingReclaim {
                    frame_index,
                    resource: ResourceHandle::new(index as u32),
                    debug_name: slot.info.name.clone(),
                });
                report.reclaims_scheduled += 1;
            }
        }

        log::debug!(
            "executed {} passes in {} batches (frame {frame_index})",
            report.executed.len(),
            report.batch_widths.len()
        );
        Ok(report)
    }

    /// Planned transitions of the most recent plan/execute call.
    #[must_use]
    pub fn planned_transitions(&self) -> &[Transition] {
        self.tracker.planned_transitions()
    }
}
