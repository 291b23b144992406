//! Built Render Graph
//!
//! The immutable-ish product of `RenderGraphBuilder::build`: expanded
//! resource and pass tables, the schedule, and every analysis result. The
//! graph owns its passes and descriptors for the frame's duration and is
//! re-keyed — handles issued by the builder are meaningless here.

use std::sync::Arc;

use parking_lot::Mutex;

use super::expansion::{ExpansionOutput, ResourceSlot};
use super::lifetime::{AliasAnalysisResult, AliasCandidate, LifetimeAnalysis, ResourceLifetimeInfo};
use super::pass::RenderPass;
use super::profiler::PassCostProfiler;
use super::scheduler::SchedulingResult;
use super::types::{PassHandle, QueueType, ResourceHandle, ViewContext, ViewIndex};
use super::validator::{GraphValidator, ValidationResult};

/// A compiled, executable render graph for one frame.
pub struct RenderGraph {
    frame_index: u64,
    views: Vec<ViewContext>,
    resources: Vec<ResourceSlot>,
    passes: Vec<RenderPass>,
    pass_views: Vec<Option<ViewIndex>>,
    /// Template pass each expanded pass came from (diagnostics).
    pass_bases: Vec<PassHandle>,
    /// Template handles of declared surface targets.
    surface_targets: Vec<(ResourceHandle, u32)>,
    schedule: SchedulingResult,
    validation: ValidationResult,
    alias_analysis: AliasAnalysisResult,
    lifetimes: LifetimeAnalysis,
    profiler: Arc<Mutex<PassCostProfiler>>,
    validator: GraphValidator,
}

impl RenderGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        frame_index: u64,
        expansion: ExpansionOutput,
        surface_targets: Vec<(ResourceHandle, u32)>,
        schedule: SchedulingResult,
        validation: ValidationResult,
        alias_analysis: AliasAnalysisResult,
        lifetimes: LifetimeAnalysis,
        profiler: Arc<Mutex<PassCostProfiler>>,
        validator: GraphValidator,
    ) -> Self {
        Self {
            frame_index,
            views: expansion.active_views,
            resources: expansion.resources,
            passes: expansion.passes,
            pass_views: expansion.pass_views,
            pass_bases: expansion.pass_bases,
            surface_targets,
            schedule,
            validation,
            alias_analysis,
            lifetimes,
            profiler,
            validator,
        }
    }

    /// Frame this graph was built for.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Active views, in view order.
    #[must_use]
    pub fn views(&self) -> &[ViewContext] {
        &self.views
    }

    /// Number of active views.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Whether validation produced no error-severity findings.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    /// Full validation result.
    #[must_use]
    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    /// Human-readable validation report.
    #[must_use]
    pub fn validation_report(&self) -> String {
        self.validator
            .generate_report(&self.validation, self.frame_index)
    }

    /// Scheduled execution order.
    #[must_use]
    pub fn execution_order(&self) -> &[PassHandle] {
        &self.schedule.execution_order
    }

    /// Queue assignment parallel to the execution order.
    #[must_use]
    pub fn queue_assignments(&self) -> &[QueueType] {
        &self.schedule.queue_assignments
    }

    /// Queue assigned to one pass.
    #[must_use]
    pub fn queue_of(&self, pass: PassHandle) -> Option<QueueType> {
        self.schedule
            .execution_order
            .iter()
            .position(|h| *h == pass)
            .and_then(|i| self.schedule.queue_assignments.get(i).copied())
    }

    /// Estimated frame time in milliseconds.
    #[must_use]
    pub fn estimated_frame_time_ms(&self) -> f32 {
        self.schedule.estimated_frame_time_ms
    }

    /// The full scheduling result.
    #[must_use]
    pub fn schedule(&self) -> &SchedulingResult {
        &self.schedule
    }

    /// Level-set batches: passes grouped by dependency depth, preserving
    /// the refined execution order inside each batch.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<PassHandle>> {
        let mut batches: Vec<Vec<PassHandle>> = Vec::new();
        for handle in &self.schedule.execution_order {
            let level = self.schedule.levels.get(handle).copied().unwrap_or(0) as usize;
            while batches.len() <= level {
                batches.push(Vec::new());
            }
            batches[level].push(*handle);
        }
        batches
    }

    /// Number of passes in the graph (clones included).
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// A pass by handle.
    #[must_use]
    pub fn pass(&self, handle: PassHandle) -> Option<&RenderPass> {
        self.passes.get(handle.index() as usize)
    }

    /// The view an expanded pass serves; `None` for shared passes.
    #[must_use]
    pub fn pass_view(&self, handle: PassHandle) -> Option<ViewIndex> {
        self.pass_views
            .get(handle.index() as usize)
            .copied()
            .flatten()
    }

    /// Template pass an expanded pass came from.
    #[must_use]
    pub fn pass_base(&self, handle: PassHandle) -> Option<PassHandle> {
        self.pass_bases.get(handle.index() as usize).copied()
    }

    /// Number of resource slots, retired clones included.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of live (non-retired) resource slots.
    #[must_use]
    pub fn live_resource_count(&self) -> usize {
        self.resources.iter().filter(|s| !s.retired).count()
    }

    /// A resource slot by handle.
    #[must_use]
    pub fn resource(&self, handle: ResourceHandle) -> Option<&ResourceSlot> {
        self.resources.get(handle.index() as usize)
    }

    /// Finds a live resource slot by debug name.
    #[must_use]
    pub fn find_resource(&self, name: &str) -> Option<(ResourceHandle, &ResourceSlot)> {
        self.resources
            .iter()
            .enumerate()
            .find(|(_, s)| !s.retired && s.info.name == name)
            .map(|(i, s)| (ResourceHandle::new(i as u32), s))
    }

    /// Finds a pass handle by name.
    #[must_use]
    pub fn find_pass(&self, name: &str) -> Option<PassHandle> {
        self.passes
            .iter()
            .position(|p| p.name == name)
            .map(|i| PassHandle::new(i as u32))
    }

    /// Lifetime info of a resource, if it had any usage.
    #[must_use]
    pub fn lifetime_info(&self, handle: ResourceHandle) -> Option<&ResourceLifetimeInfo> {
        self.lifetimes.info(handle)
    }

    /// Alias candidates discovered by the analysis.
    #[must_use]
    pub fn alias_candidates(&self) -> &[AliasCandidate] {
        &self.alias_analysis.candidates
    }

    /// Declared surface targets as `(template handle, surface index)`.
    #[must_use]
    pub fn surface_targets(&self) -> &[(ResourceHandle, u32)] {
        &self.surface_targets
    }

    /// Shared profiler fed by the executor.
    #[must_use]
    pub fn profiler(&self) -> &Arc<Mutex<PassCostProfiler>> {
        &self.profiler
    }

    pub(crate) fn resources(&self) -> &[ResourceSlot] {
        &self.resources
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("frame_index", &self.frame_index)
            .field("passes", &self.passes.len())
            .field("resources", &self.resources.len())
            .field("views", &self.views.len())
            .field("valid", &self.is_valid())
            .finish()
    }
}
