//! Render Graph Core Types
//!
//! Handles, scopes, lifetimes, queues, and views shared by the builder,
//! scheduler, and executor.

/// Strongly typed handle for render passes.
///
/// Monotonic and local to one graph build; handles returned by the builder
/// are re-keyed by `build()` and must not outlive it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct PassHandle(u32);

impl PassHandle {
    /// Wraps a raw pass id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PassHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pass#{}", self.0)
    }
}

/// Strongly typed handle for graph resources. Same build-local lifetime
/// rules as [`PassHandle`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    /// Wraps a raw resource id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Identifies one view in the frame's active view set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct ViewIndex(u32);

impl ViewIndex {
    /// Wraps a raw view index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index value.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ViewIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view{}", self.0)
    }
}

/// Resource scope: how a resource is instantiated across views.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ResourceScope {
    /// Computed once and used by all views (shadow maps, light lists).
    Shared,
    /// One instance per view (depth buffers, color targets).
    PerView,
}

/// Resource lifetime: governs reclamation and alias eligibility.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ResourceLifetime {
    /// Lives for the whole frame, reclaimed at frame end.
    FrameLocal,
    /// May be aliased after its last use.
    Transient,
    /// Managed outside the render graph.
    External,
}

/// Pass scope: how a pass executes across views.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PassScope {
    /// Runs once for all views.
    Shared,
    /// Runs independently per view.
    PerView,
}

/// GPU submission queue classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum QueueType {
    /// Graphics queue for raster work.
    Graphics,
    /// Compute queue for compute shader work.
    Compute,
    /// Copy queue for transfers.
    Copy,
}

impl QueueType {
    /// Short queue tag used in scheduling logs.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Graphics => "Gfx",
            Self::Compute => "Cmp",
            Self::Copy => "Cpy",
        }
    }
}

/// Pass execution priority.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub enum PassPriority {
    /// Must execute first.
    Critical,
    /// Critical-path work.
    High,
    /// Standard work.
    #[default]
    Normal,
    /// Non-critical work.
    Low,
    /// Lowest priority.
    Background,
}

/// Declared or measured cost of one pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PassCost {
    /// CPU microseconds.
    pub cpu_us: u32,
    /// GPU microseconds.
    pub gpu_us: u32,
    /// Memory traffic in bytes.
    pub memory_bytes: u64,
}

impl PassCost {
    /// Wall-clock estimate in milliseconds: `max(cpu, gpu) / 1000`.
    #[must_use]
    pub fn duration_ms(&self) -> f32 {
        f64::from(self.cpu_us.max(self.gpu_us)) as f32 / 1000.0
    }
}

/// Viewport rectangle of one view.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1920.0,
            height: 1080.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// One view of the scene: identity, target surface, and viewport.
///
/// Kept lightweight for cheap cloning into per-view pass copies; heavier
/// camera data belongs in the frame snapshot.
#[derive(Clone, Debug)]
pub struct ViewContext {
    /// Index within the frame's active view set.
    pub index: ViewIndex,
    /// Index of the target surface.
    pub surface_index: u32,
    /// Human-readable name.
    pub name: String,
    /// Viewport rectangle.
    pub viewport: Viewport,
}

impl ViewContext {
    /// Creates a view with default surface and viewport.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            index: ViewIndex::default(),
            surface_index: 0,
            name: name.into(),
            viewport: Viewport::default(),
        }
    }
}
