//! Graph Resource Descriptors
//!
//! Tagged-variant resource descriptors and the GPU resource state model.
//! The descriptor variant plus the [`Describe`] trait replace a base-class
//! hierarchy: everything the analyses need — compatibility hash, memory
//! requirement, debug name, scope, lifetime — is answered uniformly over
//! the variant.

use bitflags::bitflags;
use xxhash_rust::xxh3::Xxh3;

use super::types::{ResourceLifetime, ResourceScope};

// ============================================================================
// Resource states
// ============================================================================

/// GPU resource states used by transition planning.
///
/// Write states are mutually exclusive; read states may be combined only
/// within the same read class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ResourceState {
    /// State is undefined (freshly created).
    Undefined,
    /// Common state for initial resource creation.
    Common,
    /// Vertex/index buffer for input assembly.
    VertexAndIndexBuffer,
    /// Constant buffer for shaders.
    ConstantBuffer,
    /// Read by the pixel shader stage.
    PixelShaderResource,
    /// Read by non-pixel shader stages.
    NonPixelShaderResource,
    /// Read by any shader stage.
    AllShaderResource,
    /// Source of copy operations.
    CopySource,
    /// Color render target output.
    RenderTarget,
    /// Depth buffer with write access.
    DepthWrite,
    /// Depth buffer with read-only access.
    DepthRead,
    /// Unordered access view.
    UnorderedAccess,
    /// Destination of copy operations.
    CopyDestination,
    /// Ready for presentation.
    Present,
}

/// Classes of combinable read states.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReadClass {
    /// Input-assembly and constant buffer reads.
    BufferInput,
    /// Shader resource reads.
    Shader,
    /// Copy-source reads.
    Copy,
    /// Depth read.
    Depth,
}

impl ResourceState {
    /// Whether this state grants write access.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::RenderTarget
                | Self::DepthWrite
                | Self::UnorderedAccess
                | Self::CopyDestination
        )
    }

    /// The read class this state belongs to, if it is a read state.
    #[must_use]
    pub const fn read_class(self) -> Option<ReadClass> {
        match self {
            Self::VertexAndIndexBuffer | Self::ConstantBuffer => Some(ReadClass::BufferInput),
            Self::PixelShaderResource
            | Self::NonPixelShaderResource
            | Self::AllShaderResource => Some(ReadClass::Shader),
            Self::CopySource => Some(ReadClass::Copy),
            Self::DepthRead => Some(ReadClass::Depth),
            _ => None,
        }
    }

    /// Whether two read states may be combined on the same resource.
    #[must_use]
    pub fn combinable_with(self, other: Self) -> bool {
        match (self.read_class(), other.read_class()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Usage flags
// ============================================================================

bitflags! {
    /// Capabilities a texture is created with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const RENDER_TARGET = 1 << 0;
        const DEPTH_STENCIL = 1 << 1;
        const SHADER_RESOURCE = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
    }
}

bitflags! {
    /// Capabilities a buffer is created with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const STRUCTURED = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const COPY_SRC = 1 << 5;
        const COPY_DST = 1 << 6;
    }
}

/// Texture formats the graph understands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    Rg8Uint,
    Depth32Float,
    Depth24Stencil8,
}

impl TextureFormat {
    /// Bytes per pixel, used for memory estimates.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::Rg8Uint => 2,
            Self::Rgba8Unorm | Self::Depth32Float | Self::Depth24Stencil8 => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Texture descriptor.
#[derive(Clone, Debug)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub array_layers: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    /// A 2D single-mip texture.
    #[must_use]
    pub fn d2(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            depth: 1,
            mip_count: 1,
            array_layers: 1,
            format,
            usage,
        }
    }

    fn memory_requirement(&self) -> u64 {
        // Mip chain bounded by 4/3 of the top level.
        let top = u64::from(self.width)
            * u64::from(self.height)
            * u64::from(self.depth)
            * u64::from(self.array_layers)
            * self.format.bytes_per_pixel();
        if self.mip_count > 1 { top * 4 / 3 } else { top }
    }
}

/// Buffer descriptor.
#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub size: u64,
    pub stride: u32,
    pub usage: BufferUsage,
}

/// Tagged resource descriptor variant.
#[derive(Clone, Debug)]
pub enum ResourceDesc {
    Texture(TextureDesc),
    Buffer(BufferDesc),
}

impl ResourceDesc {
    /// Whether the descriptor permits the given target state.
    ///
    /// The check is usage-flag driven: a pass may only request states the
    /// resource was created to support.
    #[must_use]
    pub fn supports_state(&self, state: ResourceState) -> bool {
        match self {
            Self::Texture(t) => match state {
                ResourceState::RenderTarget | ResourceState::Present => {
                    t.usage.contains(TextureUsage::RENDER_TARGET)
                }
                ResourceState::DepthWrite | ResourceState::DepthRead => {
                    t.usage.contains(TextureUsage::DEPTH_STENCIL)
                }
                ResourceState::PixelShaderResource
                | ResourceState::NonPixelShaderResource
                | ResourceState::AllShaderResource => {
                    t.usage.contains(TextureUsage::SHADER_RESOURCE)
                }
                ResourceState::UnorderedAccess => {
                    t.usage.contains(TextureUsage::UNORDERED_ACCESS)
                }
                ResourceState::CopySource => t.usage.contains(TextureUsage::COPY_SRC),
                ResourceState::CopyDestination => t.usage.contains(TextureUsage::COPY_DST),
                ResourceState::Undefined | ResourceState::Common => true,
                ResourceState::VertexAndIndexBuffer | ResourceState::ConstantBuffer => false,
            },
            Self::Buffer(b) => match state {
                ResourceState::VertexAndIndexBuffer => {
                    b.usage.intersects(BufferUsage::VERTEX | BufferUsage::INDEX)
                }
                ResourceState::ConstantBuffer => b.usage.contains(BufferUsage::CONSTANT),
                ResourceState::PixelShaderResource
                | ResourceState::NonPixelShaderResource
                | ResourceState::AllShaderResource => b.usage.contains(BufferUsage::STRUCTURED),
                ResourceState::UnorderedAccess => b.usage.contains(BufferUsage::UNORDERED_ACCESS),
                ResourceState::CopySource => b.usage.contains(BufferUsage::COPY_SRC),
                ResourceState::CopyDestination => b.usage.contains(BufferUsage::COPY_DST),
                ResourceState::Undefined | ResourceState::Common => true,
                ResourceState::RenderTarget
                | ResourceState::DepthWrite
                | ResourceState::DepthRead
                | ResourceState::Present => false,
            },
        }
    }
}

/// Uniform descriptor queries used by validation, analysis, and aliasing.
pub trait Describe {
    /// Hash of the properties relevant to alias compatibility.
    fn compatibility_hash(&self) -> u64;
    /// Debug name for diagnostics.
    fn debug_name(&self) -> &str;
    /// Scope across views.
    fn scope(&self) -> ResourceScope;
    /// Lifetime class.
    fn lifetime(&self) -> ResourceLifetime;
    /// Estimated memory footprint in bytes.
    fn memory_requirement(&self) -> u64;
}

/// A declared graph resource: descriptor plus placement metadata.
#[derive(Clone, Debug)]
pub struct ResourceInfo {
    pub name: String,
    pub desc: ResourceDesc,
    pub lifetime: ResourceLifetime,
    pub scope: ResourceScope,
}

impl Describe for ResourceInfo {
    fn compatibility_hash(&self) -> u64 {
        let mut h = Xxh3::new();
        match &self.desc {
            ResourceDesc::Texture(t) => {
                h.update(&[0u8]);
                h.update(&t.width.to_le_bytes());
                h.update(&t.height.to_le_bytes());
                h.update(&t.depth.to_le_bytes());
                h.update(&t.mip_count.to_le_bytes());
                h.update(&t.array_layers.to_le_bytes());
                h.update(&(t.format as u32).to_le_bytes());
                h.update(&t.usage.bits().to_le_bytes());
            }
            ResourceDesc::Buffer(b) => {
                h.update(&[1u8]);
                h.update(&b.size.to_le_bytes());
                h.update(&b.stride.to_le_bytes());
                h.update(&b.usage.bits().to_le_bytes());
            }
        }
        h.digest()
    }

    fn debug_name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> ResourceScope {
        self.scope
    }

    fn lifetime(&self) -> ResourceLifetime {
        self.lifetime
    }

    fn memory_requirement(&self) -> u64 {
        match &self.desc {
            ResourceDesc::Texture(t) => t.memory_requirement(),
            ResourceDesc::Buffer(b) => b.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex_info(name: &str, width: u32) -> ResourceInfo {
        ResourceInfo {
            name: name.into(),
            desc: ResourceDesc::Texture(TextureDesc::d2(
                width,
                1080,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
            )),
            lifetime: ResourceLifetime::Transient,
            scope: ResourceScope::PerView,
        }
    }

    #[test]
    fn writes_are_exclusive_reads_combine_within_class() {
        assert!(ResourceState::RenderTarget.is_write());
        assert!(!ResourceState::DepthRead.is_write());
        assert!(
            ResourceState::PixelShaderResource.combinable_with(ResourceState::AllShaderResource)
        );
        assert!(!ResourceState::PixelShaderResource.combinable_with(ResourceState::CopySource));
        assert!(!ResourceState::RenderTarget.combinable_with(ResourceState::RenderTarget));
    }

    #[test]
    fn compatibility_hash_tracks_descriptor_identity() {
        let a = tex_info("a", 1920);
        let b = tex_info("b", 1920);
        let c = tex_info("c", 1280);
        assert_eq!(a.compatibility_hash(), b.compatibility_hash());
        assert_ne!(a.compatibility_hash(), c.compatibility_hash());
    }

    #[test]
    fn state_support_follows_usage_flags() {
        let info = tex_info("t", 64);
        assert!(info.desc.supports_state(ResourceState::RenderTarget));
        assert!(!info.desc.supports_state(ResourceState::UnorderedAccess));
        let buf = ResourceDesc::Buffer(BufferDesc {
            size: 256,
            stride: 16,
            usage: BufferUsage::VERTEX,
        });
        assert!(buf.supports_state(ResourceState::VertexAndIndexBuffer));
        assert!(!buf.supports_state(ResourceState::RenderTarget));
    }
}
