//! Render Graph Scheduler
//!
//! Computes an execution order over the union of explicit pass dependencies
//! and resource hazards, refines it with profiled costs, assigns submission
//! queues, and estimates frame time.
//!
//! # Determinism
//!
//! Hazard edges are derived by iterating passes in increasing handle order
//! while tracking the last writer of each resource, and the topological
//! sort breaks ties by handle. Two builds of the same graph against the
//! same profiler state therefore schedule identically.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::profiler::PassCostProfiler;
use super::types::{PassCost, PassHandle, QueueType, ResourceHandle};

/// Flat description of one pass as the scheduler sees it.
#[derive(Clone, Debug)]
pub struct SchedulePassDesc {
    pub handle: PassHandle,
    pub name: String,
    pub declared_cost: PassCost,
    pub pinned_queue: Option<QueueType>,
    pub reads: Vec<ResourceHandle>,
    pub writes: Vec<ResourceHandle>,
    pub explicit_deps: Vec<PassHandle>,
}

/// Output of scheduling.
#[derive(Clone, Debug, Default)]
pub struct SchedulingResult {
    /// Passes in execution order. Empty when a cycle was detected.
    pub execution_order: Vec<PassHandle>,
    /// Queue per pass, parallel to `execution_order`.
    pub queue_assignments: Vec<QueueType>,
    /// Estimated frame time in milliseconds.
    pub estimated_frame_time_ms: f32,
    /// Union dependency adjacency: pass -> its dependencies.
    pub dependency_graph: FxHashMap<PassHandle, Vec<PassHandle>>,
    /// Dependency depth of each pass (roots are level 0).
    pub levels: FxHashMap<PassHandle, u32>,
    /// A cycle was found in the union dependency graph.
    pub cycle_detected: bool,
}

impl SchedulingResult {
    /// Position of `pass` in the execution order, if scheduled.
    #[must_use]
    pub fn topo_index(&self, pass: PassHandle) -> Option<u32> {
        self.execution_order
            .iter()
            .position(|h| *h == pass)
            .map(|i| i as u32)
    }

    /// Width of the widest dependency level.
    #[must_use]
    pub fn max_level_width(&self) -> usize {
        let mut widths: FxHashMap<u32, usize> = FxHashMap::default();
        for level in self.levels.values() {
            *widths.entry(*level).or_insert(0) += 1;
        }
        widths.values().copied().max().unwrap_or(0)
    }
}

/// Topological + cost-aware scheduler over three queue types.
#[derive(Default)]
pub struct GraphScheduler;

impl GraphScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Schedules `passes` (which must be sorted by increasing handle).
    #[must_use]
    pub fn schedule(
        &self,
        passes: &[SchedulePassDesc],
        profiler: &PassCostProfiler,
    ) -> SchedulingResult {
        let mut result = SchedulingResult::default();
        if passes.is_empty() {
            log::warn!("no passes to schedule");
            return result;
        }

        result.dependency_graph = build_union_dependencies(passes);

        let Some((order, levels)) = topological_sort(passes, &result.dependency_graph) else {
            log::error!("circular dependency detected in pass graph");
            result.cycle_detected = true;
            return result;
        };
        result.levels = levels;
        result.execution_order = order;

        cost_aware_refine(passes, &result.levels, profiler, &mut result.execution_order);

        result.queue_assignments =
            assign_queues(passes, &result.execution_order, profiler);

        result.estimated_frame_time_ms =
            estimate_frame_time(passes, &result.execution_order, profiler);

        log::debug!(
            "scheduled {} passes, estimated frame time {:.2} ms",
            result.execution_order.len(),
            result.estimated_frame_time_ms
        );
        if log::log_enabled!(log::Level::Trace) {
            for (i, handle) in result.execution_order.iter().enumerate() {
                log::trace!(
                    "  [{i}] {handle} queue={}",
                    result.queue_assignments[i].tag()
                );
            }
        }
        result
    }

    /// Longest-path analysis from roots using updated costs; returns the
    /// passes along the critical path in execution order.
    #[must_use]
    pub fn analyze_critical_path(
        &self,
        passes: &[SchedulePassDesc],
        profiler: &PassCostProfiler,
    ) -> Vec<PassHandle> {
        let deps = build_union_dependencies(passes);
        let Some((order, _)) = topological_sort(passes, &deps) else {
            return Vec::new();
        };
        let by_handle: FxHashMap<PassHandle, &SchedulePassDesc> =
            passes.iter().map(|p| (p.handle, p)).collect();
        let cost_of = |h: PassHandle| -> f32 {
            let desc = by_handle[&h];
            profiler
                .updated_cost(&desc.name, desc.declared_cost)
                .cpu_us as f32
        };

        let mut longest: FxHashMap<PassHandle, f32> = FxHashMap::default();
        for h in &order {
            let own = cost_of(*h);
            let best_dep = deps
                .get(h)
                .into_iter()
                .flatten()
                .map(|d| longest.get(d).copied().unwrap_or(0.0))
                .fold(0.0f32, f32::max);
            longest.insert(*h, best_dep + own);
        }

        let Some((&end, _)) = longest
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(a.0)))
        else {
            return Vec::new();
        };

        // Backtrack along the most expensive dependency chain.
        let mut path = vec![end];
        let mut current = end;
        while let Some(dep_list) = deps.get(&current) {
            let Some(&best) = dep_list.iter().max_by(|a, b| {
                let la = longest.get(*a).copied().unwrap_or(0.0);
                let lb = longest.get(*b).copied().unwrap_or(0.0);
                la.total_cmp(&lb).then(b.cmp(a))
            }) else {
                break;
            };
            path.push(best);
            current = best;
        }
        path.reverse();
        path
    }
}

// ============================================================================
// Dependency construction
// ============================================================================

/// Union of explicit dependencies and deterministic resource hazards.
///
/// Passes are visited in increasing handle order; a read or write of a
/// resource depends on the last recorded writer, and writes then take over
/// as the last writer.
fn build_union_dependencies(
    passes: &[SchedulePassDesc],
) -> FxHashMap<PassHandle, Vec<PassHandle>> {
    let mut graph: FxHashMap<PassHandle, Vec<PassHandle>> = FxHashMap::default();
    for p in passes {
        let deps = graph.entry(p.handle).or_default();
        for d in &p.explicit_deps {
            if !deps.contains(d) {
                deps.push(*d);
            }
        }
    }

    let mut last_writer: FxHashMap<ResourceHandle, PassHandle> = FxHashMap::default();
    for p in passes {
        for r in &p.reads {
            if let Some(&writer) = last_writer.get(r) {
                if writer != p.handle {
                    let deps = graph.entry(p.handle).or_default();
                    if !deps.contains(&writer) {
                        deps.push(writer);
                    }
                }
            }
        }
        for w in &p.writes {
            if let Some(&writer) = last_writer.get(w) {
                if writer != p.handle {
                    let deps = graph.entry(p.handle).or_default();
                    if !deps.contains(&writer) {
                        deps.push(writer);
                    }
                }
            }
            last_writer.insert(*w, p.handle);
        }
    }
    graph
}

/// Kahn's algorithm with handle-ordered tie breaking; also assigns levels
/// (distance from roots). Returns `None` on a cycle.
fn topological_sort(
    passes: &[SchedulePassDesc],
    deps: &FxHashMap<PassHandle, Vec<PassHandle>>,
) -> Option<(Vec<PassHandle>, FxHashMap<PassHandle, u32>)> {
    let mut in_degree: FxHashMap<PassHandle, usize> = FxHashMap::default();
    let mut dependents: FxHashMap<PassHandle, Vec<PassHandle>> = FxHashMap::default();
    for p in passes {
        in_degree.entry(p.handle).or_insert(0);
    }
    for (pass, dep_list) in deps {
        *in_degree.entry(*pass).or_insert(0) += dep_list.len();
        for dep in dep_list {
            dependents.entry(*dep).or_default().push(*pass);
        }
    }

    let mut ready: BTreeSet<PassHandle> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(h, _)| *h)
        .collect();
    let mut levels: FxHashMap<PassHandle, u32> = ready.iter().map(|h| (*h, 0)).collect();
    let mut order = Vec::with_capacity(passes.len());

    while let Some(&current) = ready.iter().next() {
        ready.remove(&current);
        order.push(current);
        let current_level = levels.get(&current).copied().unwrap_or(0);
        if let Some(deps_of_current) = dependents.get(&current) {
            for &dependent in deps_of_current {
                let Some(degree) = in_degree.get_mut(&dependent) else {
                    continue;
                };
                *degree -= 1;
                let level = levels.entry(dependent).or_insert(0);
                *level = (*level).max(current_level + 1);
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if order.len() == passes.len() {
        Some((order, levels))
    } else {
        None
    }
}

/// Within each level, stable-sorts passes by updated cost: GPU time
/// descending, then CPU time descending, then handle ascending.
fn cost_aware_refine(
    passes: &[SchedulePassDesc],
    levels: &FxHashMap<PassHandle, u32>,
    profiler: &PassCostProfiler,
    order: &mut Vec<PassHandle>,
) {
    if order.is_empty() {
        return;
    }
    let by_handle: FxHashMap<PassHandle, &SchedulePassDesc> =
        passes.iter().map(|p| (p.handle, p)).collect();
    let cost_of = |h: PassHandle| -> PassCost {
        let desc = by_handle[&h];
        profiler.updated_cost(&desc.name, desc.declared_cost)
    };

    let max_level = levels.values().copied().max().unwrap_or(0);
    let mut groups: Vec<Vec<PassHandle>> = vec![Vec::new(); max_level as usize + 1];
    for h in order.iter() {
        let level = levels.get(h).copied().unwrap_or(0);
        groups[level as usize].push(*h);
    }

    let mut refined = Vec::with_capacity(order.len());
    for group in &mut groups {
        group.sort_by(|a, b| {
            let ca = cost_of(*a);
            let cb = cost_of(*b);
            cb.gpu_us
                .cmp(&ca.gpu_us)
                .then(cb.cpu_us.cmp(&ca.cpu_us))
                .then(a.cmp(b))
        });
        refined.extend_from_slice(group);
    }
    *order = refined;
}

// ============================================================================
// Queue assignment
// ============================================================================

const COPY_MEMORY_THRESHOLD: u64 = 8 * 1024 * 1024;
const COPY_FOLD_THRESHOLD: u64 = 4 * 1024 * 1024;
const COPY_SPILL_THRESHOLD: u64 = 16 * 1024 * 1024;
const COMPUTE_SPILL_FACTOR: f32 = 1.2;

fn classify(cost: &PassCost) -> QueueType {
    let copy_like =
        cost.memory_bytes > COPY_MEMORY_THRESHOLD && cost.gpu_us < cost.cpu_us.saturating_mul(2);
    let compute_like = cost.gpu_us > cost.cpu_us.saturating_mul(2);
    if copy_like {
        QueueType::Copy
    } else if compute_like {
        QueueType::Compute
    } else {
        QueueType::Graphics
    }
}

/// Classifies each pass and balances accumulated queue load: preferred
/// queues spill when they would run more than 20 % ahead of an eligible
/// alternative, small copies fold into graphics, and saturated graphics
/// work may migrate to an idle compute or copy queue.
fn assign_queues(
    passes: &[SchedulePassDesc],
    order: &[PassHandle],
    profiler: &PassCostProfiler,
) -> Vec<QueueType> {
    let by_handle: FxHashMap<PassHandle, &SchedulePassDesc> =
        passes.iter().map(|p| (p.handle, p)).collect();

    let mut gfx_ms = 0.0f32;
    let mut cmp_ms = 0.0f32;
    let mut cpy_ms = 0.0f32;
    let mut assignments = Vec::with_capacity(order.len());

    for h in order {
        let desc = by_handle[h];
        let cost = profiler.updated_cost(&desc.name, desc.declared_cost);
        let chosen = if let Some(pinned) = desc.pinned_queue {
            pinned
        } else {
            match classify(&cost) {
                QueueType::Graphics => {
                    let mut chosen = QueueType::Graphics;
                    let mut min_ms = gfx_ms;
                    if cost.gpu_us as f32 > cost.cpu_us as f32 * 1.5 && cmp_ms < min_ms {
                        min_ms = cmp_ms;
                        chosen = QueueType::Compute;
                    }
                    if cost.memory_bytes > COPY_SPILL_THRESHOLD && cpy_ms < min_ms {
                        chosen = QueueType::Copy;
                    }
                    chosen
                }
                QueueType::Compute => {
                    let predicted = cmp_ms + cost.gpu_us as f32 / 1000.0;
                    if predicted > gfx_ms * COMPUTE_SPILL_FACTOR {
                        QueueType::Graphics
                    } else {
                        QueueType::Compute
                    }
                }
                QueueType::Copy => {
                    if cost.memory_bytes < COPY_FOLD_THRESHOLD {
                        QueueType::Graphics
                    } else {
                        QueueType::Copy
                    }
                }
            }
        };

        let duration_ms = cost.duration_ms();
        match chosen {
            QueueType::Graphics => gfx_ms += duration_ms,
            QueueType::Compute => cmp_ms += duration_ms,
            QueueType::Copy => cpy_ms += duration_ms,
        }
        assignments.push(chosen);
    }

    log::trace!("queue load: gfx={gfx_ms:.3}ms cmp={cmp_ms:.3}ms cpy={cpy_ms:.3}ms");
    assignments
}

fn estimate_frame_time(
    passes: &[SchedulePassDesc],
    order: &[PassHandle],
    profiler: &PassCostProfiler,
) -> f32 {
    let by_handle: FxHashMap<PassHandle, &SchedulePassDesc> =
        passes.iter().map(|p| (p.handle, p)).collect();
    order
        .iter()
        .map(|h| {
            let desc = by_handle[h];
            profiler
                .updated_cost(&desc.name, desc.declared_cost)
                .duration_ms()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(id: u32, deps: &[u32]) -> SchedulePassDesc {
        SchedulePassDesc {
            handle: PassHandle::new(id),
            name: format!("pass{id}"),
            declared_cost: PassCost {
                cpu_us: 100,
                gpu_us: 100,
                memory_bytes: 0,
            },
            pinned_queue: None,
            reads: Vec::new(),
            writes: Vec::new(),
            explicit_deps: deps.iter().map(|d| PassHandle::new(*d)).collect(),
        }
    }

    #[test]
    fn chain_schedules_in_order() {
        let passes = vec![desc(0, &[]), desc(1, &[0]), desc(2, &[1])];
        let result = GraphScheduler::new().schedule(&passes, &PassCostProfiler::new());
        assert_eq!(
            result.execution_order,
            vec![PassHandle::new(0), PassHandle::new(1), PassHandle::new(2)]
        );
        assert!(!result.cycle_detected);
    }

    #[test]
    fn cycle_returns_empty_order() {
        let passes = vec![desc(0, &[1]), desc(1, &[0])];
        let result = GraphScheduler::new().schedule(&passes, &PassCostProfiler::new());
        assert!(result.cycle_detected);
        assert!(result.execution_order.is_empty());
    }

    #[test]
    fn hazard_edge_orders_writer_before_reader() {
        let resource = ResourceHandle::new(0);
        let mut writer = desc(0, &[]);
        writer.writes.push(resource);
        let mut reader = desc(1, &[]);
        reader.reads.push(resource);
        let result =
            GraphScheduler::new().schedule(&[writer, reader], &PassCostProfiler::new());
        assert_eq!(
            result.execution_order,
            vec![PassHandle::new(0), PassHandle::new(1)]
        );
        assert_eq!(result.levels[&PassHandle::new(1)], 1);
    }

    #[test]
    fn copy_classification_follows_thresholds() {
        assert_eq!(
            classify(&PassCost {
                cpu_us: 1000,
                gpu_us: 500,
                memory_bytes: 16 * 1024 * 1024,
            }),
            QueueType::Copy
        );
        assert_eq!(
            classify(&PassCost {
                cpu_us: 100,
                gpu_us: 500,
                memory_bytes: 0,
            }),
            QueueType::Compute
        );
        assert_eq!(
            classify(&PassCost {
                cpu_us: 100,
                gpu_us: 150,
                memory_bytes: 0,
            }),
            QueueType::Graphics
        );
    }
}
