//! Render Passes
//!
//! The pass record stored by the graph, and the fluent [`PassBuilder`]
//! modules use to configure one. Builders for compute and copy passes are
//! returned detached and committed with `RenderGraphBuilder::add_pass`;
//! raster passes take a configuration closure instead.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::errors::Result;

use super::executor::ExecutionContext;
use super::resource::ResourceState;
use super::types::{
    PassCost, PassHandle, PassPriority, PassScope, QueueType, ResourceHandle, ViewIndex,
};

/// Kind of work a pass records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PassKind {
    /// Rasterization work on the graphics queue.
    Raster,
    /// Compute shader work.
    Compute,
    /// Resource transfer work.
    Copy,
}

/// One declared resource access with its target state.
#[derive(Clone, Copy, Debug)]
pub struct ResourceAccess {
    pub resource: ResourceHandle,
    pub state: ResourceState,
}

/// Synchronous command-recording callable invoked by the executor.
///
/// Executors only record commands; they must not block or spawn. The
/// callable is shared between per-view clones of a pass, which execute
/// sequentially in view order.
pub type PassExecutor =
    Arc<Mutex<Box<dyn FnMut(&mut ExecutionContext<'_>) -> Result<()> + Send>>>;

/// A fully configured pass as stored in the graph.
pub struct RenderPass {
    pub name: String,
    pub kind: PassKind,
    pub scope: PassScope,
    pub priority: PassPriority,
    /// Queue the author pinned the pass to, if any; the scheduler may still
    /// rebalance unpinned passes.
    pub queue: Option<QueueType>,
    pub estimated_cost: PassCost,
    /// Explicit dependencies on other passes.
    pub dependencies: SmallVec<[PassHandle; 4]>,
    pub reads: SmallVec<[ResourceAccess; 8]>,
    pub writes: SmallVec<[ResourceAccess; 4]>,
    /// Clone this pass for every active view.
    pub iterate_all_views: bool,
    pub executor: Option<PassExecutor>,
}

impl RenderPass {
    fn new(name: String, kind: PassKind) -> Self {
        Self {
            name,
            kind,
            scope: PassScope::Shared,
            priority: PassPriority::Normal,
            queue: None,
            estimated_cost: PassCost::default(),
            dependencies: SmallVec::new(),
            reads: SmallVec::new(),
            writes: SmallVec::new(),
            iterate_all_views: false,
            executor: None,
        }
    }

    /// Whether the pass touches `resource` (read or write).
    #[must_use]
    pub fn touches(&self, resource: ResourceHandle) -> bool {
        self.reads.iter().any(|a| a.resource == resource)
            || self.writes.iter().any(|a| a.resource == resource)
    }

    /// Whether the pass writes `resource`.
    #[must_use]
    pub fn writes_resource(&self, resource: ResourceHandle) -> bool {
        self.writes.iter().any(|a| a.resource == resource)
    }

    /// Clones this pass for one view. The executor callable is shared; all
    /// other fields are copied. Accesses and dependencies still reference
    /// template handles and are remapped by expansion.
    #[must_use]
    pub(crate) fn clone_for_view(&self, view: ViewIndex) -> Self {
        Self {
            name: format!("{}#v{}", self.name, view.index()),
            kind: self.kind,
            scope: self.scope,
            priority: self.priority,
            queue: self.queue,
            estimated_cost: self.estimated_cost,
            dependencies: self.dependencies.clone(),
            reads: self.reads.clone(),
            writes: self.writes.clone(),
            iterate_all_views: self.iterate_all_views,
            executor: self.executor.clone(),
        }
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .field("deps", &self.dependencies.len())
            .finish()
    }
}

/// Fluent configuration for one pass.
pub struct PassBuilder {
    pass: RenderPass,
}

impl PassBuilder {
    pub(crate) fn new(name: impl Into<String>, kind: PassKind) -> Self {
        Self {
            pass: RenderPass::new(name.into(), kind),
        }
    }

    /// Sets the scheduling priority.
    #[must_use]
    pub fn set_priority(mut self, priority: PassPriority) -> Self {
        self.pass.priority = priority;
        self
    }

    /// Sets the view scope.
    #[must_use]
    pub fn set_scope(mut self, scope: PassScope) -> Self {
        self.pass.scope = scope;
        self
    }

    /// Pins the pass to a queue.
    #[must_use]
    pub fn set_queue(mut self, queue: QueueType) -> Self {
        self.pass.queue = Some(queue);
        self
    }

    /// Declares the estimated cost used until the profiler has samples.
    #[must_use]
    pub fn set_estimated_cost(mut self, cost: PassCost) -> Self {
        self.pass.estimated_cost = cost;
        self
    }

    /// Adds explicit dependencies on other passes.
    #[must_use]
    pub fn depends_on(mut self, passes: &[PassHandle]) -> Self {
        for p in passes {
            if !self.pass.dependencies.contains(p) {
                self.pass.dependencies.push(*p);
            }
        }
        self
    }

    /// Declares a read with an explicit target state.
    #[must_use]
    pub fn read(mut self, resource: ResourceHandle, state: ResourceState) -> Self {
        self.pass.reads.push(ResourceAccess { resource, state });
        self
    }

    /// Declares a shader-resource read (the common default).
    #[must_use]
    pub fn reads(self, resource: ResourceHandle) -> Self {
        self.read(resource, ResourceState::AllShaderResource)
    }

    /// Declares a write with an explicit target state.
    #[must_use]
    pub fn write(mut self, resource: ResourceHandle, state: ResourceState) -> Self {
        self.pass.writes.push(ResourceAccess { resource, state });
        self
    }

    /// Declares a render-target write (the common default).
    #[must_use]
    pub fn outputs(self, resource: ResourceHandle) -> Self {
        self.write(resource, ResourceState::RenderTarget)
    }

    /// Clones this pass for every active view, remapping per-view resources.
    #[must_use]
    pub fn iterate_all_views(mut self) -> Self {
        self.pass.iterate_all_views = true;
        self
    }

    /// Installs the command-recording callable.
    #[must_use]
    pub fn set_executor(
        mut self,
        executor: impl FnMut(&mut ExecutionContext<'_>) -> Result<()> + Send + 'static,
    ) -> Self {
        self.pass.executor = Some(Arc::new(Mutex::new(Box::new(executor))));
        self
    }

    pub(crate) fn into_pass(self) -> RenderPass {
        self.pass
    }

    /// Name of the pass under construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.pass.name
    }
}
