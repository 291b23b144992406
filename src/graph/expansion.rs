//! Per-View Expansion
//!
//! Expands the builder's template tables over the frame's active view set:
//! every `PerView` resource gets one clone per active view, every pass
//! marked for view iteration (or with `PerView` scope) gets per-view pass
//! copies with their accesses remapped through the clone mapping, and the
//! explicit dependency graph is rebuilt so edges reference cloned handles
//! instead of templates.
//!
//! Determinism: templates are visited in handle order and views in input
//! list order, so cloned handles are issued in increasing view order.

use rustc_hash::FxHashMap;

use super::pass::RenderPass;
use super::resource::ResourceInfo;
use super::types::{PassHandle, PassScope, ResourceHandle, ResourceScope, ViewContext, ViewIndex};

/// One resource in the expanded table.
#[derive(Clone, Debug)]
pub struct ResourceSlot {
    pub info: ResourceInfo,
    /// Template handle this slot came from.
    pub base: ResourceHandle,
    /// The view this clone serves; `None` for shared resources.
    pub view: Option<ViewIndex>,
    /// Slot was folded away by an optimization; nothing may reference it.
    pub retired: bool,
}

/// Result of expanding the builder templates.
pub struct ExpansionOutput {
    pub resources: Vec<ResourceSlot>,
    pub passes: Vec<RenderPass>,
    /// The view each expanded pass serves; `None` for shared passes.
    pub pass_views: Vec<Option<ViewIndex>>,
    /// Template pass handle each expanded pass came from.
    pub pass_bases: Vec<PassHandle>,
    /// `(template resource, view) -> expanded handle`.
    pub resource_map: FxHashMap<(ResourceHandle, ViewIndex), ResourceHandle>,
    /// Active views, in input list order.
    pub active_views: Vec<ViewContext>,
    /// Explicit dependencies that referenced no known pass, as
    /// `(expanded pass, missing template)`.
    pub dangling_deps: Vec<(PassHandle, PassHandle)>,
}

/// Expands resources and passes over `active_views`.
pub fn expand(
    resources: Vec<ResourceInfo>,
    passes: Vec<RenderPass>,
    active_views: Vec<ViewContext>,
) -> ExpansionOutput {
    let mut out_resources: Vec<ResourceSlot> = Vec::new();
    let mut resource_map: FxHashMap<(ResourceHandle, ViewIndex), ResourceHandle> =
        FxHashMap::default();
    let mut shared_map: FxHashMap<ResourceHandle, ResourceHandle> = FxHashMap::default();

    for (index, info) in resources.into_iter().enumerate() {
        let base = ResourceHandle::new(index as u32);
        if info.scope == ResourceScope::PerView && !active_views.is_empty() {
            for view in &active_views {
                let handle = ResourceHandle::new(out_resources.len() as u32);
                let mut clone = info.clone();
                clone.name = format!("{}#v{}", info.name, view.index.index());
                resource_map.insert((base, view.index), handle);
                out_resources.push(ResourceSlot {
                    info: clone,
                    base,
                    view: Some(view.index),
                    retired: false,
                });
            }
        } else {
            let handle = ResourceHandle::new(out_resources.len() as u32);
            shared_map.insert(base, handle);
            out_resources.push(ResourceSlot {
                info,
                base,
                view: None,
                retired: false,
            });
        }
    }

    // Resolves a template access for one view (or the shared slot).
    let remap = |template: ResourceHandle, view: Option<ViewIndex>| -> ResourceHandle {
        if let Some(shared) = shared_map.get(&template) {
            return *shared;
        }
        let view = view
            .or_else(|| active_views.first().map(|v| v.index))
            .unwrap_or_default();
        resource_map
            .get(&(template, view))
            .copied()
            .unwrap_or(template)
    };

    let mut out_passes: Vec<RenderPass> = Vec::new();
    let mut pass_views: Vec<Option<ViewIndex>> = Vec::new();
    let mut pass_bases: Vec<PassHandle> = Vec::new();
    let mut pass_map: FxHashMap<(PassHandle, ViewIndex), PassHandle> = FxHashMap::default();
    let mut shared_pass_map: FxHashMap<PassHandle, PassHandle> = FxHashMap::default();
    let mut expanded_bases: Vec<PassHandle> = Vec::new();

    for (index, pass) in passes.into_iter().enumerate() {
        let base = PassHandle::new(index as u32);
        let per_view = pass.iterate_all_views || pass.scope == PassScope::PerView;
        if per_view && !active_views.is_empty() {
            expanded_bases.push(base);
            for view in &active_views {
                let handle = PassHandle::new(out_passes.len() as u32);
                let mut clone = pass.clone_for_view(view.index);
                for access in &mut clone.reads {
                    access.resource = remap(access.resource, Some(view.index));
                }
                for access in &mut clone.writes {
                    access.resource = remap(access.resource, Some(view.index));
                }
                pass_map.insert((base, view.index), handle);
                out_passes.push(clone);
                pass_views.push(Some(view.index));
                pass_bases.push(base);
            }
        } else {
            let handle = PassHandle::new(out_passes.len() as u32);
            let mut single = pass;
            for access in &mut single.reads {
                access.resource = remap(access.resource, None);
            }
            for access in &mut single.writes {
                access.resource = remap(access.resource, None);
            }
            shared_pass_map.insert(base, handle);
            out_passes.push(single);
            pass_views.push(None);
            pass_bases.push(base);
        }
    }

    // Rebuild explicit dependencies against expanded handles. A clone
    // depends on the same-view clone of an expanded dependency; a shared
    // pass depending on an expanded template depends on all of its clones.
    let mut dangling_deps = Vec::new();
    for index in 0..out_passes.len() {
        let template_deps = std::mem::take(&mut out_passes[index].dependencies);
        let own_view = pass_views[index];
        let mut rebuilt = smallvec::SmallVec::new();
        let push = |h: PassHandle, rebuilt: &mut smallvec::SmallVec<[PassHandle; 4]>| {
            if !rebuilt.contains(&h) {
                rebuilt.push(h);
            }
        };
        for dep in template_deps {
            if let Some(shared) = shared_pass_map.get(&dep) {
                push(*shared, &mut rebuilt);
            } else if expanded_bases.contains(&dep) {
                match own_view {
                    Some(view) => {
                        if let Some(clone) = pass_map.get(&(dep, view)) {
                            push(*clone, &mut rebuilt);
                        }
                    }
                    None => {
                        for view in &active_views {
                            if let Some(clone) = pass_map.get(&(dep, view.index)) {
                                push(*clone, &mut rebuilt);
                            }
                        }
                    }
                }
            } else {
                log::warn!("explicit dependency on unknown pass {dep}");
                dangling_deps.push((PassHandle::new(index as u32), dep));
            }
        }
        out_passes[index].dependencies = rebuilt;
    }

    ExpansionOutput {
        resources: out_resources,
        passes: out_passes,
        pass_views,
        pass_bases,
        resource_map,
        active_views,
        dangling_deps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::pass::{PassBuilder, PassKind};
    use crate::graph::resource::{ResourceDesc, TextureDesc, TextureFormat, TextureUsage};
    use crate::graph::types::ResourceLifetime;

    fn per_view_texture(name: &str) -> ResourceInfo {
        ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Texture(TextureDesc::d2(
                64,
                64,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET,
            )),
            lifetime: ResourceLifetime::FrameLocal,
            scope: ResourceScope::PerView,
        }
    }

    fn views(n: u32) -> Vec<ViewContext> {
        (0..n)
            .map(|i| {
                let mut v = ViewContext::named(format!("view{i}"));
                v.index = ViewIndex::new(i);
                v
            })
            .collect()
    }

    #[test]
    fn per_view_resources_clone_in_view_order() {
        let out = expand(vec![per_view_texture("depth")], Vec::new(), views(3));
        assert_eq!(out.resources.len(), 3);
        for (i, slot) in out.resources.iter().enumerate() {
            assert_eq!(slot.view, Some(ViewIndex::new(i as u32)));
            assert_eq!(slot.base, ResourceHandle::new(0));
        }
        assert_eq!(
            out.resource_map[&(ResourceHandle::new(0), ViewIndex::new(2))],
            ResourceHandle::new(2)
        );
    }

    #[test]
    fn iterating_pass_clones_and_remaps() {
        let pass = PassBuilder::new("draw", PassKind::Raster)
            .outputs(ResourceHandle::new(0))
            .iterate_all_views()
            .into_pass();
        let out = expand(vec![per_view_texture("color")], vec![pass], views(2));
        assert_eq!(out.passes.len(), 2);
        assert_eq!(out.passes[0].writes[0].resource, ResourceHandle::new(0));
        assert_eq!(out.passes[1].writes[0].resource, ResourceHandle::new(1));
        assert_eq!(out.pass_views, vec![Some(ViewIndex::new(0)), Some(ViewIndex::new(1))]);
    }

    #[test]
    fn shared_pass_depends_on_all_clones_of_expanded_dependency() {
        let producer = PassBuilder::new("produce", PassKind::Raster)
            .outputs(ResourceHandle::new(0))
            .iterate_all_views()
            .into_pass();
        let consumer = PassBuilder::new("consume", PassKind::Compute)
            .depends_on(&[PassHandle::new(0)])
            .into_pass();
        let out = expand(
            vec![per_view_texture("color")],
            vec![producer, consumer],
            views(2),
        );
        // Passes 0 and 1 are clones of "produce"; pass 2 is "consume".
        assert_eq!(
            out.passes[2].dependencies.as_slice(),
            &[PassHandle::new(0), PassHandle::new(1)]
        );
    }
}
