//! Graph Optimizations
//!
//! Strategy and analysis extension points that run on the expanded tables
//! before validation and scheduling, plus the built-in shared read-only
//! promotion.

use rustc_hash::FxHashMap;

use super::expansion::ResourceSlot;
use super::pass::RenderPass;
use super::types::{ResourceHandle, ResourceScope};
use super::validator::ValidationError;

/// Mutable view over the expanded graph handed to optimizations.
pub struct BuildContext<'a> {
    pub resources: &'a mut Vec<ResourceSlot>,
    pub passes: &'a mut Vec<RenderPass>,
    pub active_view_count: usize,
}

/// A rewrite strategy applied to the expanded graph before validation and
/// scheduling.
pub trait GraphOptimization {
    /// Strategy name for diagnostics.
    fn name(&self) -> &'static str;
    /// Applies the rewrite, appending human-readable notes to `diagnostics`.
    fn apply(&self, ctx: &mut BuildContext<'_>, diagnostics: &mut Vec<String>);
}

/// A read-only analysis over the expanded graph.
pub trait AnalysisPass {
    /// Analysis name for diagnostics.
    fn name(&self) -> &'static str;
    /// Runs the analysis, appending findings to `out`.
    fn run(&self, ctx: &BuildContext<'_>, out: &mut Vec<ValidationError>);
}

/// Promotes groups of per-view resource clones to a single shared resource.
///
/// A group qualifies when every clone of the same template has an identical
/// descriptor compatibility hash, no pass writes any clone, and a clone
/// exists for every active view. The surviving clone is rescoped to
/// `Shared`, the others are retired, and all pass reads are rewired, so
/// later analyses only ever see the promoted handle.
pub struct SharedReadOnlyPromotion;

impl GraphOptimization for SharedReadOnlyPromotion {
    fn name(&self) -> &'static str {
        "shared-read-only-promotion"
    }

    fn apply(&self, ctx: &mut BuildContext<'_>, diagnostics: &mut Vec<String>) {
        use super::resource::Describe;

        if ctx.active_view_count < 2 {
            return;
        }

        // Group live per-view clones by template handle.
        let mut groups: FxHashMap<ResourceHandle, Vec<usize>> = FxHashMap::default();
        for (index, slot) in ctx.resources.iter().enumerate() {
            if slot.view.is_some() && !slot.retired {
                groups.entry(slot.base).or_default().push(index);
            }
        }

        let mut promoted = 0usize;
        let mut group_bases: Vec<ResourceHandle> = groups.keys().copied().collect();
        group_bases.sort_unstable();

        for base in group_bases {
            let clones = &groups[&base];
            if clones.len() != ctx.active_view_count {
                continue; // partial view coverage, skip
            }
            let first_hash = ctx.resources[clones[0]].info.compatibility_hash();
            if !clones
                .iter()
                .all(|&i| ctx.resources[i].info.compatibility_hash() == first_hash)
            {
                continue;
            }
            let written = ctx.passes.iter().any(|pass| {
                clones
                    .iter()
                    .any(|&i| pass.writes_resource(ResourceHandle::new(i as u32)))
            });
            if written {
                continue;
            }

            // Keep the first clone as the shared instance; retire the rest.
            let keep = clones[0];
            let keep_handle = ResourceHandle::new(keep as u32);
            {
                let slot = &mut ctx.resources[keep];
                let template_name = slot
                    .info
                    .name
                    .split("#v")
                    .next()
                    .unwrap_or(&slot.info.name)
                    .to_string();
                slot.info.name = template_name;
                slot.info.scope = ResourceScope::Shared;
                slot.view = None;
            }
            for &retire in &clones[1..] {
                ctx.resources[retire].retired = true;
                let old = ResourceHandle::new(retire as u32);
                for pass in ctx.passes.iter_mut() {
                    for access in &mut pass.reads {
                        if access.resource == old {
                            access.resource = keep_handle;
                        }
                    }
                }
            }

            promoted += 1;
            diagnostics.push(format!(
                "promoted '{}' ({} clones) to one shared resource",
                ctx.resources[keep].info.name,
                clones.len()
            ));
        }

        if promoted > 0 {
            log::debug!("shared read-only promotion folded {promoted} resource group(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::expansion::expand;
    use crate::graph::pass::{PassBuilder, PassKind};
    use crate::graph::resource::{
        ResourceDesc, ResourceInfo, TextureDesc, TextureFormat, TextureUsage,
    };
    use crate::graph::types::{ResourceLifetime, ViewContext, ViewIndex};

    fn read_only_per_view(name: &str) -> ResourceInfo {
        ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Texture(TextureDesc::d2(
                256,
                256,
                TextureFormat::Rgba8Unorm,
                TextureUsage::SHADER_RESOURCE,
            )),
            lifetime: ResourceLifetime::FrameLocal,
            scope: ResourceScope::PerView,
        }
    }

    fn views(n: u32) -> Vec<ViewContext> {
        (0..n)
            .map(|i| {
                let mut v = ViewContext::named(format!("v{i}"));
                v.index = ViewIndex::new(i);
                v
            })
            .collect()
    }

    #[test]
    fn read_only_clone_group_is_promoted() {
        let reader = PassBuilder::new("hud", PassKind::Raster)
            .reads(ResourceHandle::new(0))
            .iterate_all_views()
            .into_pass();
        let mut out = expand(
            vec![read_only_per_view("HUDOverlayData")],
            vec![reader],
            views(3),
        );
        let mut diagnostics = Vec::new();
        let mut ctx = BuildContext {
            resources: &mut out.resources,
            passes: &mut out.passes,
            active_view_count: 3,
        };
        SharedReadOnlyPromotion.apply(&mut ctx, &mut diagnostics);

        let live: Vec<_> = out.resources.iter().filter(|s| !s.retired).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].info.scope, ResourceScope::Shared);
        assert_eq!(live[0].info.name, "HUDOverlayData");
        // Every clone pass now reads the promoted handle.
        for pass in out.passes.iter() {
            assert_eq!(pass.reads[0].resource, ResourceHandle::new(0));
        }
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn written_group_is_left_alone() {
        let writer = PassBuilder::new("draw", PassKind::Raster)
            .outputs(ResourceHandle::new(0))
            .iterate_all_views()
            .into_pass();
        let mut out = expand(vec![read_only_per_view("color")], vec![writer], views(2));
        let mut diagnostics = Vec::new();
        let mut ctx = BuildContext {
            resources: &mut out.resources,
            passes: &mut out.passes,
            active_view_count: 2,
        };
        SharedReadOnlyPromotion.apply(&mut ctx, &mut diagnostics);
        assert!(out.resources.iter().all(|s| !s.retired));
        assert!(diagnostics.is_empty());
    }
}
