//! Render Graph Builder
//!
//! Fluent per-frame API for declaring resources and passes. `build()`
//! consumes the builder and runs the full compilation pipeline:
//!
//! 1. per-view expansion over the active view set,
//! 2. optimization strategies (shared read-only promotion built in),
//! 3. topological + cost-aware scheduling,
//! 4. lifetime/alias analysis,
//! 5. validation.
//!
//! Handles returned by the builder are valid only until `build()`; the
//! built graph re-keys passes and resources internally.
//!
//! The builder is single-owner per frame. When it must be reachable from
//! the parallel phase, enable [`RenderGraphBuilder::set_thread_safe`]
//! first (default off): all mutation goes through one internal mutex, so
//! `&self` registration from pool workers is safe.

use std::sync::Arc;

use parking_lot::Mutex;

use super::cache::{CachedCompilation, GraphCache, GraphCacheKey};
use super::expansion::{ExpansionOutput, expand};
use super::graph::RenderGraph;
use super::lifetime::LifetimeAnalysis;
use super::optimize::{AnalysisPass, BuildContext, GraphOptimization, SharedReadOnlyPromotion};
use super::pass::{PassBuilder, PassKind, RenderPass};
use super::profiler::PassCostProfiler;
use super::resource::{
    BufferDesc, ResourceDesc, ResourceInfo, TextureDesc, TextureFormat, TextureUsage,
};
use super::scheduler::{GraphScheduler, SchedulePassDesc, SchedulingResult};
use super::types::{
    PassHandle, PassScope, ResourceHandle, ResourceLifetime, ResourceScope, ViewContext,
};
use super::validator::{
    GraphValidator, Severity, ValidationError, ValidationErrorKind, ValidationResult,
};

/// Which views of the frame's view list are active for this build.
#[derive(Clone, Default)]
enum ViewConfig {
    /// All views (the default).
    #[default]
    All,
    /// A single view by position.
    Single(usize),
    /// Views matching a predicate.
    Filter(Arc<dyn Fn(&ViewContext) -> bool + Send + Sync>),
}

#[derive(Default)]
struct BuilderState {
    resources: Vec<ResourceInfo>,
    surface_targets: Vec<(ResourceHandle, u32)>,
    passes: Vec<RenderPass>,
    view_config: ViewConfig,
}

/// Per-frame declarative graph builder.
pub struct RenderGraphBuilder {
    frame_index: u64,
    views: Vec<ViewContext>,
    state: Mutex<BuilderState>,
    thread_safe: bool,
    profiler: Arc<Mutex<PassCostProfiler>>,
    validator: GraphValidator,
    optimizations: Vec<Box<dyn GraphOptimization + Send + Sync>>,
    analyses: Vec<Box<dyn AnalysisPass + Send + Sync>>,
}

impl RenderGraphBuilder {
    /// Creates a builder for one frame over the given view list.
    #[must_use]
    pub fn new(frame_index: u64, views: Vec<ViewContext>) -> Self {
        Self {
            frame_index,
            views,
            state: Mutex::new(BuilderState::default()),
            thread_safe: false,
            profiler: Arc::new(Mutex::new(PassCostProfiler::new())),
            validator: GraphValidator::new(),
            optimizations: vec![Box::new(SharedReadOnlyPromotion)],
            analyses: Vec::new(),
        }
    }

    /// Attaches a shared profiler whose smoothed costs drive scheduling.
    #[must_use]
    pub fn with_profiler(mut self, profiler: Arc<Mutex<PassCostProfiler>>) -> Self {
        self.profiler = profiler;
        self
    }

    /// Replaces the validator (carries strictness configuration).
    #[must_use]
    pub fn with_validator(mut self, validator: GraphValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Registers an additional optimization strategy.
    pub fn add_optimization(&mut self, optimization: Box<dyn GraphOptimization + Send + Sync>) {
        self.optimizations.push(optimization);
    }

    /// Registers an additional analysis pass.
    pub fn add_analysis(&mut self, analysis: Box<dyn AnalysisPass + Send + Sync>) {
        self.analyses.push(analysis);
    }

    /// Declares the builder safe to share during the parallel phase.
    pub fn set_thread_safe(&mut self, thread_safe: bool) {
        self.thread_safe = thread_safe;
    }

    /// Whether parallel-phase sharing was opted into.
    #[must_use]
    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    /// Frame this builder collects for.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Declares a texture resource.
    pub fn create_texture(
        &self,
        name: impl Into<String>,
        desc: TextureDesc,
        lifetime: ResourceLifetime,
        scope: ResourceScope,
    ) -> ResourceHandle {
        let mut state = self.state.lock();
        let handle = ResourceHandle::new(state.resources.len() as u32);
        state.resources.push(ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Texture(desc),
            lifetime,
            scope,
        });
        handle
    }

    /// Declares a buffer resource.
    pub fn create_buffer(
        &self,
        name: impl Into<String>,
        desc: BufferDesc,
        lifetime: ResourceLifetime,
        scope: ResourceScope,
    ) -> ResourceHandle {
        let mut state = self.state.lock();
        let handle = ResourceHandle::new(state.resources.len() as u32);
        state.resources.push(ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Buffer(desc),
            lifetime,
            scope,
        });
        handle
    }

    /// Declares the presentation target of one surface.
    pub fn create_surface_target(
        &self,
        name: impl Into<String>,
        surface_index: u32,
    ) -> ResourceHandle {
        let mut state = self.state.lock();
        let handle = ResourceHandle::new(state.resources.len() as u32);
        state.resources.push(ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Texture(TextureDesc::d2(
                1920,
                1080,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET,
            )),
            lifetime: ResourceLifetime::External,
            scope: ResourceScope::PerView,
        });
        state.surface_targets.push((handle, surface_index));
        handle
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Adds a raster pass configured by `config`.
    pub fn add_raster_pass(
        &self,
        name: impl Into<String>,
        config: impl FnOnce(PassBuilder) -> PassBuilder,
    ) -> PassHandle {
        let builder = config(PassBuilder::new(name, PassKind::Raster));
        self.add_pass(builder)
    }

    /// Starts a compute pass; commit it with [`RenderGraphBuilder::add_pass`].
    #[must_use]
    pub fn add_compute_pass(&self, name: impl Into<String>) -> PassBuilder {
        PassBuilder::new(name, PassKind::Compute)
    }

    /// Starts a copy pass; commit it with [`RenderGraphBuilder::add_pass`].
    #[must_use]
    pub fn add_copy_pass(&self, name: impl Into<String>) -> PassBuilder {
        PassBuilder::new(name, PassKind::Copy)
    }

    /// Commits a configured pass and returns its (build-local) handle.
    pub fn add_pass(&self, builder: PassBuilder) -> PassHandle {
        let mut state = self.state.lock();
        let handle = PassHandle::new(state.passes.len() as u32);
        state.passes.push(builder.into_pass());
        handle
    }

    /// Number of committed passes.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.state.lock().passes.len()
    }

    /// Number of declared resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.state.lock().resources.len()
    }

    // ========================================================================
    // View configuration
    // ========================================================================

    /// Activates every view in the frame's view list.
    pub fn iterate_all_views(&self) -> &Self {
        self.state.lock().view_config = ViewConfig::All;
        self
    }

    /// Restricts the build to one view by position.
    pub fn restrict_to_view(&self, view_index: usize) -> &Self {
        self.state.lock().view_config = ViewConfig::Single(view_index);
        self
    }

    /// Restricts the build to views matching `filter`.
    pub fn restrict_to_views(
        &self,
        filter: impl Fn(&ViewContext) -> bool + Send + Sync + 'static,
    ) -> &Self {
        self.state.lock().view_config = ViewConfig::Filter(Arc::new(filter));
        self
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Compiles the declared graph: expansion, optimization, scheduling,
    /// lifetime analysis, and validation.
    #[must_use]
    pub fn build(self) -> RenderGraph {
        self.build_inner(None)
    }

    /// Like [`RenderGraphBuilder::build`], but consults `cache` for a
    /// previously compiled schedule of an identical graph and stores the
    /// fresh compilation on miss.
    #[must_use]
    pub fn build_with_cache(self, cache: &mut GraphCache) -> RenderGraph {
        self.build_inner(Some(cache))
    }

    fn build_inner(mut self, cache: Option<&mut GraphCache>) -> RenderGraph {
        let state = std::mem::take(&mut self.state).into_inner();
        let active_views: Vec<ViewContext> = match &state.view_config {
            ViewConfig::All => self.views.clone(),
            ViewConfig::Single(index) => self.views.get(*index).cloned().into_iter().collect(),
            ViewConfig::Filter(filter) => {
                self.views.iter().filter(|v| filter(v)).cloned().collect()
            }
        };

        let cache_key = cache
            .as_ref()
            .map(|_| GraphCacheKey::compute(&state.resources, &state.passes, &active_views));

        let had_per_view_pass = state
            .passes
            .iter()
            .any(|p| p.iterate_all_views || p.scope == PassScope::PerView);
        let surface_targets = state.surface_targets.clone();

        // 1. Per-view expansion.
        let mut expansion = expand(state.resources, state.passes, active_views);

        // 2. Optimization strategies + analyses.
        let mut diagnostics = Vec::new();
        let mut analysis_findings = Vec::new();
        {
            let active_view_count = expansion.active_views.len();
            let mut ctx = BuildContext {
                resources: &mut expansion.resources,
                passes: &mut expansion.passes,
                active_view_count,
            };
            for optimization in &self.optimizations {
                optimization.apply(&mut ctx, &mut diagnostics);
            }
            for analysis in &self.analyses {
                analysis.run(&ctx, &mut analysis_findings);
            }
        }
        for note in &diagnostics {
            log::debug!("graph optimization: {note}");
        }

        // 3. Scheduling (possibly replayed from the cache).
        let schedule_inputs = Self::schedule_inputs(&expansion);
        let mut cache = cache;
        let cached = match (&cache_key, cache.as_mut()) {
            (Some(key), Some(c)) => c.get(key).cloned(),
            _ => None,
        };
        let schedule = if let Some(cached) = cached {
            log::debug!("graph cache hit for frame {}", self.frame_index);
            cached.schedule
        } else {
            let profiler = self.profiler.lock();
            let fresh = GraphScheduler::new().schedule(&schedule_inputs, &profiler);
            drop(profiler);
            if let (Some(key), Some(c)) = (&cache_key, cache.as_mut()) {
                c.insert(
                    key,
                    CachedCompilation {
                        schedule: fresh.clone(),
                    },
                );
            }
            fresh
        };

        // 4. Lifetime & alias analysis.
        let mut lifetimes = LifetimeAnalysis::new();
        for (index, slot) in expansion.resources.iter().enumerate() {
            if !slot.retired {
                lifetimes.add_resource(ResourceHandle::new(index as u32), &slot.info);
            }
        }
        for (index, pass) in expansion.passes.iter().enumerate() {
            let handle = PassHandle::new(index as u32);
            let view = expansion.pass_views[index].unwrap_or_default();
            for access in &pass.reads {
                lifetimes.add_usage(access.resource, handle, access.state, false, view);
            }
            for access in &pass.writes {
                lifetimes.add_usage(access.resource, handle, access.state, true, view);
            }
        }
        let topo = schedule
            .execution_order
            .iter()
            .enumerate()
            .map(|(i, h)| (*h, i as u32))
            .collect();
        lifetimes.set_topological_order(topo);
        lifetimes.analyze_lifetimes();
        let alias_analysis = lifetimes.validate_and_collect();

        // 5. Validation.
        let mut validation = ValidationResult::new();
        for finding in analysis_findings {
            validation.add(finding);
        }
        self.validate(
            &expansion,
            &schedule,
            &lifetimes,
            had_per_view_pass,
            &mut validation,
        );
        for hazard in &alias_analysis.hazards {
            validation.add(hazard.clone());
        }
        if !validation.is_valid() {
            log::error!(
                "{}",
                self.validator
                    .generate_report(&validation, self.frame_index)
            );
        }

        RenderGraph::assemble(
            self.frame_index,
            expansion,
            surface_targets,
            schedule,
            validation,
            alias_analysis,
            lifetimes,
            self.profiler,
            self.validator,
        )
    }

    fn schedule_inputs(expansion: &ExpansionOutput) -> Vec<SchedulePassDesc> {
        expansion
            .passes
            .iter()
            .enumerate()
            .map(|(index, pass)| SchedulePassDesc {
                handle: PassHandle::new(index as u32),
                name: pass.name.clone(),
                declared_cost: pass.estimated_cost,
                pinned_queue: pass.queue,
                reads: pass.reads.iter().map(|a| a.resource).collect(),
                writes: pass.writes.iter().map(|a| a.resource).collect(),
                explicit_deps: pass.dependencies.to_vec(),
            })
            .collect()
    }

    /// Structural and semantic checks over the expanded graph.
    fn validate(
        &self,
        expansion: &ExpansionOutput,
        schedule: &SchedulingResult,
        lifetimes: &LifetimeAnalysis,
        had_per_view_pass: bool,
        out: &mut ValidationResult,
    ) {
        let config = self.validator.config();
        let resources = &expansion.resources;

        if schedule.cycle_detected {
            out.add(ValidationError::new(
                ValidationErrorKind::CircularDependency,
                "cycle in explicit dependencies or resource-hazard ordering",
            ));
        }

        if had_per_view_pass && expansion.active_views.is_empty() {
            out.add(ValidationError::new(
                ValidationErrorKind::ViewContextMissing,
                "per-view passes declared but the active view set is empty",
            ));
        }

        for (pass, missing) in &expansion.dangling_deps {
            let name = expansion
                .passes
                .get(pass.index() as usize)
                .map_or("?", |p| p.name.as_str());
            out.add(
                ValidationError::new(
                    ValidationErrorKind::InvalidDependencyOrder,
                    format!("pass '{name}' declares a dependency on unknown {missing}"),
                )
                .with_passes(&[*pass]),
            );
        }

        // Which live resources are ever written.
        let mut written = vec![false; resources.len()];
        for pass in &expansion.passes {
            for access in &pass.writes {
                if let Some(slot) = written.get_mut(access.resource.index() as usize) {
                    *slot = true;
                }
            }
        }

        for (index, pass) in expansion.passes.iter().enumerate() {
            let handle = PassHandle::new(index as u32);
            let pass_view = expansion.pass_views[index];

            for (access, is_write) in pass
                .reads
                .iter()
                .map(|a| (a, false))
                .chain(pass.writes.iter().map(|a| (a, true)))
            {
                let slot = resources.get(access.resource.index() as usize);
                let Some(slot) = slot.filter(|s| !s.retired) else {
                    out.add(
                        ValidationError::new(
                            ValidationErrorKind::ResourceNotFound,
                            format!(
                                "pass '{}' references unknown or retired {}",
                                pass.name, access.resource
                            ),
                        )
                        .with_passes(&[handle])
                        .with_resources(&[access.resource]),
                    );
                    continue;
                };

                let state_ok = if is_write {
                    access.state.is_write()
                } else {
                    access.state.read_class().is_some()
                };
                if !state_ok || !slot.info.desc.supports_state(access.state) {
                    out.add(
                        ValidationError::new(
                            ValidationErrorKind::InvalidResourceState,
                            format!(
                                "pass '{}' requests {:?} on '{}', which its usage flags do \
                                 not permit",
                                pass.name, access.state, slot.info.name
                            ),
                        )
                        .with_passes(&[handle])
                        .with_resources(&[access.resource]),
                    );
                }

                if is_write && pass_view.is_none() && slot.view.is_some() {
                    out.add(
                        ValidationError::new(
                            ValidationErrorKind::ViewScopeViolation,
                            format!(
                                "shared pass '{}' writes per-view resource '{}' without view \
                                 iteration",
                                pass.name, slot.info.name
                            ),
                        )
                        .with_passes(&[handle])
                        .with_resources(&[access.resource]),
                    );
                }
                if is_write
                    && pass_view.is_some()
                    && slot.view.is_none()
                    && slot.info.scope == ResourceScope::Shared
                {
                    out.add(
                        ValidationError::new(
                            ValidationErrorKind::ViewScopeViolation,
                            format!(
                                "per-view pass '{}' writes shared resource '{}'",
                                pass.name, slot.info.name
                            ),
                        )
                        .with_passes(&[handle])
                        .with_resources(&[access.resource]),
                    );
                }
            }
        }

        // Reads of transient resources nothing produces, and reads that
        // precede the first write.
        for (index, slot) in resources.iter().enumerate() {
            if slot.retired || slot.info.lifetime != ResourceLifetime::Transient {
                continue;
            }
            let handle = ResourceHandle::new(index as u32);
            let Some(info) = lifetimes.info(handle) else {
                continue;
            };
            if !written[index] {
                if info.usages.iter().any(|u| !u.is_write) {
                    out.add(
                        ValidationError::new(
                            ValidationErrorKind::MissingDependency,
                            format!(
                                "transient resource '{}' is read but never produced",
                                slot.info.name
                            ),
                        )
                        .with_resources(&[handle]),
                    );
                }
                continue;
            }
            let first_write = info
                .usages
                .iter()
                .filter(|u| u.is_write)
                .map(|u| schedule.topo_index(u.pass))
                .min()
                .flatten();
            if let Some(first_write) = first_write {
                for usage in info.usages.iter().filter(|u| !u.is_write) {
                    if let Some(read_index) = schedule.topo_index(usage.pass) {
                        if read_index < first_write {
                            out.add(
                                ValidationError::new(
                                    ValidationErrorKind::ResourceLifetimeViolation,
                                    format!(
                                        "'{}' is read at schedule index {read_index} before \
                                         its first write at {first_write}",
                                        slot.info.name
                                    ),
                                )
                                .with_passes(&[usage.pass])
                                .with_resources(&[handle]),
                            );
                        }
                    }
                }
            }
        }

        if config.performance_warnings {
            use super::resource::Describe;
            let total_memory: u64 = resources
                .iter()
                .filter(|s| !s.retired && s.info.lifetime != ResourceLifetime::External)
                .map(|s| s.info.memory_requirement())
                .sum();
            if total_memory > config.memory_pressure_threshold {
                out.add(
                    ValidationError::new(
                        ValidationErrorKind::MemoryPressure,
                        format!(
                            "graph resources require {total_memory} bytes, above the \
                             {}-byte threshold",
                            config.memory_pressure_threshold
                        ),
                    )
                    .with_severity(Severity::Warning),
                );
            }

            let pass_count = expansion.passes.len();
            if pass_count > 3 && !schedule.cycle_detected {
                let max_width = schedule.max_level_width();
                if max_width == 1 {
                    out.add(ValidationError::new(
                        ValidationErrorKind::SuboptimalScheduling,
                        format!(
                            "all {pass_count} passes serialize into single-pass batches"
                        ),
                    ));
                }
            }
        }
    }
}

impl std::fmt::Debug for RenderGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RenderGraphBuilder")
            .field("frame_index", &self.frame_index)
            .field("views", &self.views.len())
            .field("resources", &state.resources.len())
            .field("passes", &state.passes.len())
            .field("thread_safe", &self.thread_safe)
            .finish()
    }
}
