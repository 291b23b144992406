//! Lifetime & Alias Analysis
//!
//! Derives per-resource usage intervals from declared pass accesses and the
//! scheduler's topological indices, then enumerates resource pairs for
//! hazards and alias candidates:
//!
//! - transient + overlapping lifetimes → overlap hazard (error)
//! - differing scopes + overlap → scope conflict (warning)
//! - overlapping write windows → write-conflict hazard (error)
//! - transient, disjoint, incompatible descriptors → incompatibility (warning)
//! - transient, disjoint, compatible → alias candidate with
//!   `combined_memory = max(|A|, |B|)`

use rustc_hash::FxHashMap;

use super::resource::{Describe, ResourceInfo, ResourceState};
use super::types::{PassHandle, ResourceHandle, ResourceLifetime, ResourceScope, ViewIndex};
use super::validator::{Severity, ValidationError, ValidationErrorKind};

/// One recorded access of a resource by a pass.
#[derive(Clone, Copy, Debug)]
pub struct ResourceUsage {
    pub pass: PassHandle,
    pub state: ResourceState,
    pub is_write: bool,
    pub view: ViewIndex,
}

/// Usage interval and conflict summary for one resource.
#[derive(Clone, Debug)]
pub struct ResourceLifetimeInfo {
    /// First pass using the resource (by topological index).
    pub first_usage: PassHandle,
    /// Last pass using the resource.
    pub last_usage: PassHandle,
    /// Topological index of the first usage.
    pub first_index: u32,
    /// Topological index of the last usage.
    pub last_index: u32,
    /// All usages in registration order.
    pub usages: Vec<ResourceUsage>,
    /// Estimated memory footprint.
    pub memory_requirement: u64,
    /// Two writes recorded in the same pass and view.
    pub has_write_conflicts: bool,
    /// Resources this one may alias with.
    pub aliases: Vec<ResourceHandle>,
}

impl ResourceLifetimeInfo {
    /// Whether this interval overlaps another.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.last_index < other.first_index || other.last_index < self.first_index)
    }
}

/// An aliasing opportunity between two disjoint transient resources.
#[derive(Clone, Debug)]
pub struct AliasCandidate {
    pub resource_a: ResourceHandle,
    pub resource_b: ResourceHandle,
    /// Memory needed if both share one allocation.
    pub combined_memory: u64,
    pub description: String,
}

/// Output of [`LifetimeAnalysis::validate_and_collect`].
#[derive(Default, Debug)]
pub struct AliasAnalysisResult {
    pub hazards: Vec<ValidationError>,
    pub candidates: Vec<AliasCandidate>,
}

struct ResourceMeta {
    name: String,
    lifetime: ResourceLifetime,
    scope: ResourceScope,
    compatibility_hash: u64,
    memory_requirement: u64,
    is_texture: bool,
}

/// Accumulates resources and usages, then analyzes lifetimes.
#[derive(Default)]
pub struct LifetimeAnalysis {
    resources: FxHashMap<ResourceHandle, ResourceMeta>,
    usages: FxHashMap<ResourceHandle, Vec<ResourceUsage>>,
    topo: FxHashMap<PassHandle, u32>,
    infos: FxHashMap<ResourceHandle, ResourceLifetimeInfo>,
}

impl LifetimeAnalysis {
    /// Creates an empty analysis.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource descriptor.
    pub fn add_resource(&mut self, handle: ResourceHandle, info: &ResourceInfo) {
        self.resources.insert(
            handle,
            ResourceMeta {
                name: info.name.clone(),
                lifetime: info.lifetime,
                scope: info.scope,
                compatibility_hash: info.compatibility_hash(),
                memory_requirement: info.memory_requirement(),
                is_texture: matches!(info.desc, super::resource::ResourceDesc::Texture(_)),
            },
        );
    }

    /// Records one access.
    pub fn add_usage(
        &mut self,
        resource: ResourceHandle,
        pass: PassHandle,
        state: ResourceState,
        is_write: bool,
        view: ViewIndex,
    ) {
        self.usages.entry(resource).or_default().push(ResourceUsage {
            pass,
            state,
            is_write,
            view,
        });
    }

    /// Supplies the topological index of each pass.
    pub fn set_topological_order(&mut self, order: FxHashMap<PassHandle, u32>) {
        self.topo = order;
    }

    /// Populates [`ResourceLifetimeInfo`] for every used resource.
    pub fn analyze_lifetimes(&mut self) {
        self.infos.clear();
        for (handle, usages) in &self.usages {
            let Some(meta) = self.resources.get(handle) else {
                continue;
            };
            let mut first: Option<(u32, PassHandle)> = None;
            let mut last: Option<(u32, PassHandle)> = None;
            for u in usages {
                let index = self.topo.get(&u.pass).copied().unwrap_or(0);
                if first.is_none_or(|(fi, _)| index < fi) {
                    first = Some((index, u.pass));
                }
                if last.is_none_or(|(li, _)| index > li) {
                    last = Some((index, u.pass));
                }
            }
            let Some(((first_index, first_usage), (last_index, last_usage))) = first.zip(last)
            else {
                continue;
            };

            // Two writes landing in the same pass and view are a conflict
            // regardless of scheduling.
            let mut has_write_conflicts = false;
            let mut seen_writes: FxHashMap<(PassHandle, ViewIndex), u32> = FxHashMap::default();
            for u in usages.iter().filter(|u| u.is_write) {
                let count = seen_writes.entry((u.pass, u.view)).or_insert(0);
                *count += 1;
                if *count > 1 {
                    has_write_conflicts = true;
                }
            }

            self.infos.insert(
                *handle,
                ResourceLifetimeInfo {
                    first_usage,
                    last_usage,
                    first_index,
                    last_index,
                    usages: usages.clone(),
                    memory_requirement: meta.memory_requirement,
                    has_write_conflicts,
                    aliases: Vec::new(),
                },
            );
        }
    }

    /// Lifetime info for one resource, if it had any usage.
    #[must_use]
    pub fn info(&self, handle: ResourceHandle) -> Option<&ResourceLifetimeInfo> {
        self.infos.get(&handle)
    }

    /// Enumerates pairs for hazards and alias candidates.
    ///
    /// Pairs are visited in increasing handle order so results are
    /// deterministic.
    pub fn validate_and_collect(&mut self) -> AliasAnalysisResult {
        let mut result = AliasAnalysisResult::default();

        let mut handles: Vec<ResourceHandle> = self.infos.keys().copied().collect();
        handles.sort_unstable();

        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                self.analyze_pair(a, b, &mut result);
            }
        }

        // Publish discovered alias partners back into the lifetime infos.
        for candidate in &result.candidates {
            if let Some(info) = self.infos.get_mut(&candidate.resource_a) {
                info.aliases.push(candidate.resource_b);
            }
            if let Some(info) = self.infos.get_mut(&candidate.resource_b) {
                info.aliases.push(candidate.resource_a);
            }
        }
        result
    }

    fn analyze_pair(&self, a: ResourceHandle, b: ResourceHandle, out: &mut AliasAnalysisResult) {
        let (Some(meta_a), Some(meta_b)) = (self.resources.get(&a), self.resources.get(&b))
        else {
            return;
        };
        let (Some(info_a), Some(info_b)) = (self.infos.get(&a), self.infos.get(&b)) else {
            return;
        };

        let both_transient = meta_a.lifetime == ResourceLifetime::Transient
            && meta_b.lifetime == ResourceLifetime::Transient;
        let overlap = info_a.overlaps(info_b);

        if overlap {
            if both_transient {
                out.hazards.push(
                    ValidationError::new(
                        ValidationErrorKind::ResourceAliasHazard,
                        format!(
                            "transient resources '{}' and '{}' have overlapping lifetimes \
                             [{}, {}] vs [{}, {}]",
                            meta_a.name,
                            meta_b.name,
                            info_a.first_index,
                            info_a.last_index,
                            info_b.first_index,
                            info_b.last_index
                        ),
                    )
                    .with_resources(&[a, b]),
                );
                if self.has_co_scheduled_writes(info_a, info_b) {
                    out.hazards.push(
                        ValidationError::new(
                            ValidationErrorKind::ResourceAliasHazard,
                            format!(
                                "write conflict: '{}' and '{}' are both written inside \
                                 their co-scheduled window",
                                meta_a.name, meta_b.name
                            ),
                        )
                        .with_resources(&[a, b]),
                    );
                }
            }
            if meta_a.scope != meta_b.scope {
                out.hazards.push(
                    ValidationError::new(
                        ValidationErrorKind::ResourceAliasHazard,
                        format!(
                            "scope conflict: '{}' ({:?}) overlaps '{}' ({:?})",
                            meta_a.name, meta_a.scope, meta_b.name, meta_b.scope
                        ),
                    )
                    .with_severity(Severity::Warning)
                    .with_resources(&[a, b]),
                );
            }
            return;
        }

        if !both_transient {
            return;
        }

        let compatible = meta_a.is_texture == meta_b.is_texture
            && meta_a.compatibility_hash == meta_b.compatibility_hash;
        if compatible {
            out.candidates.push(AliasCandidate {
                resource_a: a,
                resource_b: b,
                combined_memory: meta_a.memory_requirement.max(meta_b.memory_requirement),
                description: format!(
                    "'{}' [{}, {}] and '{}' [{}, {}] can share one allocation",
                    meta_a.name,
                    info_a.first_index,
                    info_a.last_index,
                    meta_b.name,
                    info_b.first_index,
                    info_b.last_index
                ),
            });
        } else {
            out.hazards.push(
                ValidationError::new(
                    ValidationErrorKind::ResourceAliasHazard,
                    format!(
                        "'{}' and '{}' have disjoint lifetimes but incompatible descriptors",
                        meta_a.name, meta_b.name
                    ),
                )
                .with_severity(Severity::Warning)
                .with_resources(&[a, b]),
            );
        }
    }

    /// Whether both resources have write usages at the same topological
    /// index — writes that a batch could schedule side by side.
    fn has_co_scheduled_writes(
        &self,
        a: &ResourceLifetimeInfo,
        b: &ResourceLifetimeInfo,
    ) -> bool {
        let write_indices = |info: &ResourceLifetimeInfo| -> Vec<u32> {
            info.usages
                .iter()
                .filter(|u| u.is_write)
                .filter_map(|u| self.topo.get(&u.pass).copied())
                .collect()
        };
        let a_writes = write_indices(a);
        write_indices(b).iter().any(|i| a_writes.contains(i))
    }

    /// Flags inconsistent integration state: more reclaims pending than
    /// resources were ever active this frame.
    #[must_use]
    pub fn integration_check(
        pending_reclaims: usize,
        active_resources: usize,
    ) -> Option<ValidationError> {
        (pending_reclaims > active_resources).then(|| {
            ValidationError::new(
                ValidationErrorKind::SuboptimalScheduling,
                format!(
                    "{pending_reclaims} pending reclaims exceed {active_resources} active \
                     resources"
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resource::{ResourceDesc, TextureDesc, TextureFormat, TextureUsage};

    fn transient(name: &str, width: u32) -> ResourceInfo {
        ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Texture(TextureDesc::d2(
                width,
                1080,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
            )),
            lifetime: ResourceLifetime::Transient,
            scope: ResourceScope::Shared,
        }
    }

    fn analysis_with(intervals: &[(u32, &ResourceInfo, u32, u32)]) -> LifetimeAnalysis {
        let mut analysis = LifetimeAnalysis::new();
        let mut topo = FxHashMap::default();
        for (id, info, first, last) in intervals {
            let handle = ResourceHandle::new(*id);
            analysis.add_resource(handle, info);
            analysis.add_usage(
                handle,
                PassHandle::new(*first),
                ResourceState::RenderTarget,
                true,
                ViewIndex::new(0),
            );
            analysis.add_usage(
                handle,
                PassHandle::new(*last),
                ResourceState::AllShaderResource,
                false,
                ViewIndex::new(0),
            );
            topo.insert(PassHandle::new(*first), *first);
            topo.insert(PassHandle::new(*last), *last);
        }
        analysis.set_topological_order(topo);
        analysis.analyze_lifetimes();
        analysis
    }

    #[test]
    fn overlapping_transients_are_a_hazard() {
        let a = transient("a", 1920);
        let b = transient("b", 1920);
        let mut analysis = analysis_with(&[(0, &a, 0, 3), (1, &b, 2, 5)]);
        let result = analysis.validate_and_collect();
        assert!(result
            .hazards
            .iter()
            .any(|h| h.severity == Severity::Error));
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn disjoint_compatible_transients_become_candidates() {
        let a = transient("a", 1920);
        let b = transient("b", 1920);
        let mut analysis = analysis_with(&[(0, &a, 0, 1), (1, &b, 3, 4)]);
        let result = analysis.validate_and_collect();
        assert!(result.hazards.is_empty());
        assert_eq!(result.candidates.len(), 1);
        let candidate = &result.candidates[0];
        assert_eq!(candidate.combined_memory, 1920 * 1080 * 4);
        assert_eq!(
            analysis.info(ResourceHandle::new(0)).unwrap().aliases,
            vec![ResourceHandle::new(1)]
        );
    }

    #[test]
    fn disjoint_incompatible_transients_warn() {
        let a = transient("a", 1920);
        let b = transient("b", 640);
        let mut analysis = analysis_with(&[(0, &a, 0, 1), (1, &b, 3, 4)]);
        let result = analysis.validate_and_collect();
        assert!(result.candidates.is_empty());
        assert!(result
            .hazards
            .iter()
            .all(|h| h.severity == Severity::Warning));
    }

    #[test]
    fn double_write_in_same_pass_and_view_flags_conflict() {
        let info = transient("t", 64);
        let handle = ResourceHandle::new(0);
        let mut analysis = LifetimeAnalysis::new();
        analysis.add_resource(handle, &info);
        for _ in 0..2 {
            analysis.add_usage(
                handle,
                PassHandle::new(0),
                ResourceState::RenderTarget,
                true,
                ViewIndex::new(0),
            );
        }
        analysis.set_topological_order(FxHashMap::from_iter([(PassHandle::new(0), 0)]));
        analysis.analyze_lifetimes();
        assert!(analysis.info(handle).unwrap().has_write_conflicts);
    }

    #[test]
    fn integration_check_flags_excess_reclaims() {
        assert!(LifetimeAnalysis::integration_check(5, 2).is_some());
        assert!(LifetimeAnalysis::integration_check(1, 2).is_none());
    }
}
