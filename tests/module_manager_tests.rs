//! Module Manager Tests
//!
//! Tests for:
//! - Priority ordering with stable tie-breaking
//! - Per-module error and panic isolation
//! - Parallel barrier dispatch with snapshot-only access
//! - Initialize/shutdown ordering

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use cadence::errors::{EngineError, Result};
use cadence::frame::{
    EngineProps, FrameContext, FramePhase, FrameSnapshot, ModulePhases,
};
use cadence::gfx::GraphicsLayer;
use cadence::module::{EngineModule, ModuleManager, ModulePriority};
use cadence::tasks::TaskPool;

type Trace = Arc<Mutex<Vec<String>>>;

struct TracingModule {
    name: String,
    priority: ModulePriority,
    phases: ModulePhases,
    trace: Trace,
    fail_gameplay: bool,
    panic_gameplay: bool,
}

impl TracingModule {
    fn new(name: &str, priority: ModulePriority, trace: &Trace) -> Self {
        Self {
            name: name.into(),
            priority,
            phases: ModulePhases::GAMEPLAY | ModulePhases::PARALLEL_WORK,
            trace: Arc::clone(trace),
            fail_gameplay: false,
            panic_gameplay: false,
        }
    }

    fn log(&self, what: &str) {
        self.trace.lock().push(format!("{}:{what}", self.name));
    }
}

impl EngineModule for TracingModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ModulePriority {
        self.priority
    }

    fn supported_phases(&self) -> ModulePhases {
        self.phases
    }

    fn initialize(&mut self, _ctx: &mut FrameContext) -> Result<()> {
        self.log("init");
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut FrameContext) -> Result<()> {
        self.log("shutdown");
        Ok(())
    }

    fn on_gameplay(&mut self, _ctx: &mut FrameContext) -> Result<()> {
        if self.panic_gameplay {
            panic!("{} exploded", self.name);
        }
        if self.fail_gameplay {
            return Err(EngineError::ModuleFailure {
                module: self.name.clone(),
                phase: "Gameplay",
                message: "synthetic failure".into(),
            });
        }
        self.log("gameplay");
        Ok(())
    }

    fn on_parallel_work(&self, ctx: &FrameContext) -> Result<()> {
        assert!(!ctx.can_mutate_state());
        let snapshot_frame = ctx.snapshot().map(|s| s.frame_index());
        self.trace
            .lock()
            .push(format!("{}:parallel@{snapshot_frame:?}", self.name));
        Ok(())
    }
}

fn make_context(pool: &Arc<TaskPool>) -> FrameContext {
    FrameContext::new(
        1,
        EngineProps::default(),
        Arc::clone(pool),
        Arc::new(GraphicsLayer::new()),
        None,
    )
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn modules_run_in_priority_order_with_stable_ties() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    manager.register(Box::new(TracingModule::new(
        "late",
        ModulePriority::LOW,
        &trace,
    )));
    manager.register(Box::new(TracingModule::new(
        "first",
        ModulePriority::CRITICAL,
        &trace,
    )));
    manager.register(Box::new(TracingModule::new(
        "mid-a",
        ModulePriority::NORMAL,
        &trace,
    )));
    manager.register(Box::new(TracingModule::new(
        "mid-b",
        ModulePriority::NORMAL,
        &trace,
    )));

    let mut ctx = make_context(&pool);
    ctx.set_phase(FramePhase::Gameplay);
    manager.execute_ordered(FramePhase::Gameplay, &mut ctx);

    assert_eq!(
        trace.lock().as_slice(),
        &[
            "first:gameplay",
            "mid-a:gameplay",
            "mid-b:gameplay",
            "late:gameplay"
        ]
    );
}

#[test]
fn modules_not_declaring_a_phase_are_skipped() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    let mut input_only = TracingModule::new("input-only", ModulePriority::NORMAL, &trace);
    input_only.phases = ModulePhases::INPUT;
    manager.register(Box::new(input_only));
    manager.register(Box::new(TracingModule::new(
        "player",
        ModulePriority::NORMAL,
        &trace,
    )));

    let mut ctx = make_context(&pool);
    ctx.set_phase(FramePhase::Gameplay);
    manager.execute_ordered(FramePhase::Gameplay, &mut ctx);

    assert_eq!(trace.lock().as_slice(), &["player:gameplay"]);
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn failing_module_does_not_halt_the_phase() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    let mut failing = TracingModule::new("failing", ModulePriority::CRITICAL, &trace);
    failing.fail_gameplay = true;
    manager.register(Box::new(failing));
    manager.register(Box::new(TracingModule::new(
        "survivor",
        ModulePriority::NORMAL,
        &trace,
    )));

    let mut ctx = make_context(&pool);
    ctx.set_phase(FramePhase::Gameplay);
    manager.execute_ordered(FramePhase::Gameplay, &mut ctx);

    assert_eq!(trace.lock().as_slice(), &["survivor:gameplay"]);
}

#[test]
fn panicking_module_is_contained() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    let mut bomb = TracingModule::new("bomb", ModulePriority::CRITICAL, &trace);
    bomb.panic_gameplay = true;
    manager.register(Box::new(bomb));
    manager.register(Box::new(TracingModule::new(
        "survivor",
        ModulePriority::NORMAL,
        &trace,
    )));

    let mut ctx = make_context(&pool);
    ctx.set_phase(FramePhase::Gameplay);
    manager.execute_ordered(FramePhase::Gameplay, &mut ctx);

    assert_eq!(trace.lock().as_slice(), &["survivor:gameplay"]);
}

// ============================================================================
// Parallel Barrier
// ============================================================================

#[test]
fn parallel_work_dispatches_every_participant_and_joins() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(4).unwrap());
    let mut manager = ModuleManager::new();
    for name in ["pw-a", "pw-b", "pw-c"] {
        manager.register(Box::new(TracingModule::new(
            name,
            ModulePriority::NORMAL,
            &trace,
        )));
    }

    let mut ctx = make_context(&pool);
    ctx.set_phase(FramePhase::SnapshotBuild);
    ctx.publish_snapshot(FrameSnapshot::new(1));
    ctx.set_phase(FramePhase::ParallelWork);
    let dispatch = manager.execute_parallel_work(&pool, &ctx);

    assert_eq!(dispatch.jobs, 3);
    let mut entries = trace.lock().clone();
    entries.sort();
    assert_eq!(
        entries,
        vec![
            "pw-a:parallel@Some(1)",
            "pw-b:parallel@Some(1)",
            "pw-c:parallel@Some(1)"
        ]
    );
}

#[test]
fn parallel_work_without_snapshot_sees_none() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    manager.register(Box::new(TracingModule::new(
        "pw",
        ModulePriority::NORMAL,
        &trace,
    )));

    let mut ctx = make_context(&pool);
    ctx.set_phase(FramePhase::ParallelWork);
    manager.execute_parallel_work(&pool, &ctx);

    assert_eq!(trace.lock().as_slice(), &["pw:parallel@None"]);
}

// ============================================================================
// Lifecycle Ordering
// ============================================================================

#[test]
fn shutdown_runs_in_reverse_priority_order() {
    let trace: Trace = Arc::default();
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    manager.register(Box::new(TracingModule::new(
        "second",
        ModulePriority::NORMAL,
        &trace,
    )));
    manager.register(Box::new(TracingModule::new(
        "first",
        ModulePriority::CRITICAL,
        &trace,
    )));

    let mut ctx = make_context(&pool);
    manager.initialize_all(&mut ctx);
    manager.shutdown_all(&mut ctx);

    assert_eq!(
        trace.lock().as_slice(),
        &["first:init", "second:init", "second:shutdown", "first:shutdown"]
    );
}

// ============================================================================
// Detached Work
// ============================================================================

#[test]
fn detached_work_runs_on_the_pool() {
    struct Detached {
        hits: Arc<AtomicUsize>,
    }
    impl EngineModule for Detached {
        fn name(&self) -> &str {
            "detached"
        }
        fn supported_phases(&self) -> ModulePhases {
            ModulePhases::DETACHED_WORK
        }
        fn on_detached_work(&self, _ctx: &FrameContext) -> Result<()> {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    let hits = Arc::new(AtomicUsize::new(0));
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut manager = ModuleManager::new();
    manager.register(Box::new(Detached {
        hits: Arc::clone(&hits),
    }));

    let ctx = make_context(&pool);
    manager.execute_detached_work(&pool, &ctx);
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}
