//! Cooked Payload Types
//!
//! The typed payloads the loader caches, together with their cooked binary
//! layouts. Assets (materials, geometries, scenes) carry inter-asset
//! dependency lists that the loader turns into graph edges; resources
//! (textures, buffers) are leaf payloads.
//!
//! Each payload has an `encode_*` / `decode_*` pair. The decode side runs
//! inside the loader's registered decoder table; the encode side belongs to
//! the emit path of the cooking pipeline and is what tests and the demo
//! runtime use to author fixtures.
//!
//! Every cooked blob starts with a 4-byte magic tag followed by a `u16`
//! layout version. Unknown magic or version is a decode error.

use crate::errors::{EngineError, Result};
use crate::io::{BinaryReader, BinaryWriter};

use super::key::{AssetKey, ResourceKey};

// ============================================================================
// Payload traits
// ============================================================================

/// A typed asset payload cached by key.
///
/// `ASSET_TYPE` is the on-disk type code stored in container indices; it
/// selects the registered decoder when an asset is loaded by key alone
/// (dependency loads do not know the Rust type).
pub trait AssetPayload: Send + Sync + 'static {
    /// On-disk asset type code.
    const ASSET_TYPE: u32;
    /// Human-readable type name for diagnostics.
    const TYPE_NAME: &'static str;

    /// Key this payload was cooked under.
    fn key(&self) -> AssetKey;
}

/// A typed resource payload cached by [`ResourceKey`].
pub trait ResourcePayload: Send + Sync + 'static {
    /// Human-readable type name for diagnostics.
    const TYPE_NAME: &'static str;

    /// Key this payload is cached under.
    fn key(&self) -> ResourceKey;
}

/// Asset type codes used by container indices.
pub mod asset_type {
    /// Material asset.
    pub const MATERIAL: u32 = 0;
    /// Geometry asset.
    pub const GEOMETRY: u32 = 1;
    /// Scene asset.
    pub const SCENE: u32 = 2;
}

/// Result of decoding one cooked asset: the payload plus the dependency
/// lists the loader must resolve and register.
#[derive(Debug)]
pub struct DecodedAsset<T> {
    /// The decoded payload.
    pub payload: T,
    /// Keys of assets this asset depends on, in cooked order.
    pub asset_dependencies: Vec<AssetKey>,
    /// Keys of resources this asset holds checked out while cached.
    pub resource_dependencies: Vec<ResourceKey>,
}

/// Borrowed cooked bytes for one asset, as stored in a container.
pub struct CookedAssetData<'a> {
    /// Key the asset is indexed under.
    pub key: AssetKey,
    /// Raw descriptor bytes.
    pub bytes: &'a [u8],
}

/// Owned cooked bytes for one resource, supplied by import/cooking paths.
pub struct CookedResourceData {
    /// Key to cache the decoded resource under.
    pub key: ResourceKey,
    /// Raw cooked payload.
    pub bytes: Vec<u8>,
}

// ============================================================================
// Asset payloads
// ============================================================================

/// Material asset: shading parameters plus references to texture resources
/// and other assets.
#[derive(Debug, Clone)]
pub struct MaterialAsset {
    pub key: AssetKey,
    pub name: String,
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    /// Texture resources the material samples.
    pub texture_keys: Vec<ResourceKey>,
}

impl AssetPayload for MaterialAsset {
    const ASSET_TYPE: u32 = asset_type::MATERIAL;
    const TYPE_NAME: &'static str = "MaterialAsset";

    fn key(&self) -> AssetKey {
        self.key
    }
}

/// Geometry asset: mesh topology summary plus vertex/index buffer resources.
#[derive(Debug, Clone)]
pub struct GeometryAsset {
    pub key: AssetKey,
    pub name: String,
    pub vertex_count: u32,
    pub index_count: u32,
    pub lod_count: u32,
    /// Buffer resources backing the mesh data.
    pub buffer_keys: Vec<ResourceKey>,
    /// Materials referenced by submeshes.
    pub material_keys: Vec<AssetKey>,
}

impl AssetPayload for GeometryAsset {
    const ASSET_TYPE: u32 = asset_type::GEOMETRY;
    const TYPE_NAME: &'static str = "GeometryAsset";

    fn key(&self) -> AssetKey {
        self.key
    }
}

/// Scene asset: node-count summary plus the assets the scene instantiates.
#[derive(Debug, Clone)]
pub struct SceneAsset {
    pub key: AssetKey,
    pub name: String,
    pub node_count: u32,
    /// Geometries and materials referenced by scene nodes.
    pub asset_refs: Vec<AssetKey>,
}

impl AssetPayload for SceneAsset {
    const ASSET_TYPE: u32 = asset_type::SCENE;
    const TYPE_NAME: &'static str = "SceneAsset";

    fn key(&self) -> AssetKey {
        self.key
    }
}

// ============================================================================
// Resource payloads
// ============================================================================

/// Texture resource: dimensions, format code, and pixel payload.
#[derive(Debug, Clone)]
pub struct TextureResource {
    pub key: ResourceKey,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub format: u32,
    pub data: Vec<u8>,
}

impl ResourcePayload for TextureResource {
    const TYPE_NAME: &'static str = "TextureResource";

    fn key(&self) -> ResourceKey {
        self.key
    }
}

/// Buffer resource: sized raw data with an element stride.
#[derive(Debug, Clone)]
pub struct BufferResource {
    pub key: ResourceKey,
    pub stride: u32,
    pub usage: u32,
    pub data: Vec<u8>,
}

impl BufferResource {
    /// Payload size in bytes.
    #[inline]
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

impl ResourcePayload for BufferResource {
    const TYPE_NAME: &'static str = "BufferResource";

    fn key(&self) -> ResourceKey {
        self.key
    }
}

// ============================================================================
// Binary layouts
// ============================================================================

const MATERIAL_MAGIC: [u8; 4] = *b"MTRL";
const GEOMETRY_MAGIC: [u8; 4] = *b"GEOM";
const SCENE_MAGIC: [u8; 4] = *b"SCNE";
const TEXTURE_MAGIC: [u8; 4] = *b"TEXR";
const BUFFER_MAGIC: [u8; 4] = *b"BUFR";
const LAYOUT_VERSION: u16 = 1;

fn check_magic(r: &mut BinaryReader<'_>, expected: [u8; 4], what: &'static str) -> Result<()> {
    let magic = r.read_array::<4>("magic")?;
    if magic != expected {
        return Err(EngineError::ResourceDecode(format!(
            "{what}: bad magic {magic:02x?}"
        )));
    }
    let version = r.read_u16("version")?;
    if version != LAYOUT_VERSION {
        return Err(EngineError::ResourceDecode(format!(
            "{what}: unsupported layout version {version}"
        )));
    }
    Ok(())
}

/// Maps a cooked blob's magic tag to the container asset type code.
///
/// Used by packed-archive loads, which carry no per-entry type field.
#[must_use]
pub fn asset_type_from_magic(bytes: &[u8]) -> Option<u32> {
    let magic: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    match magic {
        MATERIAL_MAGIC => Some(asset_type::MATERIAL),
        GEOMETRY_MAGIC => Some(asset_type::GEOMETRY),
        SCENE_MAGIC => Some(asset_type::SCENE),
        _ => None,
    }
}

fn write_name(w: &mut BinaryWriter, name: &str) {
    w.write_u16(name.len() as u16);
    w.write_bytes(name.as_bytes());
}

fn read_name(r: &mut BinaryReader<'_>) -> Result<String> {
    let len = r.read_u16("name length")? as usize;
    let bytes = r.read_bytes(len, "name")?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| EngineError::ResourceDecode("name is not valid UTF-8".into()))
}

fn write_asset_keys(w: &mut BinaryWriter, keys: &[AssetKey]) {
    w.write_u32(keys.len() as u32);
    for k in keys {
        w.write_bytes(k.as_bytes());
    }
}

fn read_asset_keys(r: &mut BinaryReader<'_>) -> Result<Vec<AssetKey>> {
    let count = r.read_u32("key count")? as usize;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(AssetKey::from_bytes(r.read_array("asset key")?));
    }
    Ok(keys)
}

fn write_resource_keys(w: &mut BinaryWriter, keys: &[ResourceKey]) {
    w.write_u32(keys.len() as u32);
    for k in keys {
        w.write_u64(k.raw());
    }
}

fn read_resource_keys(r: &mut BinaryReader<'_>) -> Result<Vec<ResourceKey>> {
    let count = r.read_u32("resource key count")? as usize;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(ResourceKey::from_raw(r.read_u64("resource key")?));
    }
    Ok(keys)
}

// ── Material ────────────────────────────────────────────────────────────────

/// Encodes a material asset to its cooked layout.
#[must_use]
pub fn encode_material(m: &MaterialAsset) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_bytes(&MATERIAL_MAGIC);
    w.write_u16(LAYOUT_VERSION);
    write_name(&mut w, &m.name);
    for c in m.base_color {
        w.write_f32(c);
    }
    w.write_f32(m.roughness);
    w.write_f32(m.metalness);
    write_resource_keys(&mut w, &m.texture_keys);
    w.into_bytes()
}

/// Decodes a cooked material asset.
pub fn decode_material(data: &CookedAssetData<'_>) -> Result<DecodedAsset<MaterialAsset>> {
    let mut r = BinaryReader::new(data.bytes);
    check_magic(&mut r, MATERIAL_MAGIC, "material")?;
    let name = read_name(&mut r)?;
    let mut base_color = [0.0f32; 4];
    for c in &mut base_color {
        *c = r.read_f32("base color")?;
    }
    let roughness = r.read_f32("roughness")?;
    let metalness = r.read_f32("metalness")?;
    let texture_keys = read_resource_keys(&mut r)?;
    Ok(DecodedAsset {
        payload: MaterialAsset {
            key: data.key,
            name,
            base_color,
            roughness,
            metalness,
            texture_keys: texture_keys.clone(),
        },
        asset_dependencies: Vec::new(),
        resource_dependencies: texture_keys,
    })
}

// ── Geometry ────────────────────────────────────────────────────────────────

/// Encodes a geometry asset to its cooked layout.
#[must_use]
pub fn encode_geometry(g: &GeometryAsset) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_bytes(&GEOMETRY_MAGIC);
    w.write_u16(LAYOUT_VERSION);
    write_name(&mut w, &g.name);
    w.write_u32(g.vertex_count);
    w.write_u32(g.index_count);
    w.write_u32(g.lod_count);
    write_resource_keys(&mut w, &g.buffer_keys);
    write_asset_keys(&mut w, &g.material_keys);
    w.into_bytes()
}

/// Decodes a cooked geometry asset.
pub fn decode_geometry(data: &CookedAssetData<'_>) -> Result<DecodedAsset<GeometryAsset>> {
    let mut r = BinaryReader::new(data.bytes);
    check_magic(&mut r, GEOMETRY_MAGIC, "geometry")?;
    let name = read_name(&mut r)?;
    let vertex_count = r.read_u32("vertex count")?;
    let index_count = r.read_u32("index count")?;
    let lod_count = r.read_u32("lod count")?;
    let buffer_keys = read_resource_keys(&mut r)?;
    let material_keys = read_asset_keys(&mut r)?;
    Ok(DecodedAsset {
        payload: GeometryAsset {
            key: data.key,
            name,
            vertex_count,
            index_count,
            lod_count,
            buffer_keys: buffer_keys.clone(),
            material_keys: material_keys.clone(),
        },
        asset_dependencies: material_keys,
        resource_dependencies: buffer_keys,
    })
}

// ── Scene ───────────────────────────────────────────────────────────────────

/// Encodes a scene asset to its cooked layout.
#[must_use]
pub fn encode_scene(s: &SceneAsset) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_bytes(&SCENE_MAGIC);
    w.write_u16(LAYOUT_VERSION);
    write_name(&mut w, &s.name);
    w.write_u32(s.node_count);
    write_asset_keys(&mut w, &s.asset_refs);
    w.into_bytes()
}

/// Decodes a cooked scene asset.
pub fn decode_scene(data: &CookedAssetData<'_>) -> Result<DecodedAsset<SceneAsset>> {
    let mut r = BinaryReader::new(data.bytes);
    check_magic(&mut r, SCENE_MAGIC, "scene")?;
    let name = read_name(&mut r)?;
    let node_count = r.read_u32("node count")?;
    let asset_refs = read_asset_keys(&mut r)?;
    Ok(DecodedAsset {
        payload: SceneAsset {
            key: data.key,
            name,
            node_count,
            asset_refs: asset_refs.clone(),
        },
        asset_dependencies: asset_refs,
        resource_dependencies: Vec::new(),
    })
}

// ── Texture resource ────────────────────────────────────────────────────────

/// Encodes a texture resource to its cooked layout.
#[must_use]
pub fn encode_texture(t: &TextureResource) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_bytes(&TEXTURE_MAGIC);
    w.write_u16(LAYOUT_VERSION);
    w.write_u32(t.width);
    w.write_u32(t.height);
    w.write_u32(t.depth);
    w.write_u32(t.mip_count);
    w.write_u32(t.format);
    w.write_u32(t.data.len() as u32);
    w.write_bytes(&t.data);
    w.into_bytes()
}

/// Decodes a cooked texture resource.
pub fn decode_texture(data: &CookedResourceData) -> Result<TextureResource> {
    let mut r = BinaryReader::new(&data.bytes);
    check_magic(&mut r, TEXTURE_MAGIC, "texture")?;
    let width = r.read_u32("width")?;
    let height = r.read_u32("height")?;
    let depth = r.read_u32("depth")?;
    let mip_count = r.read_u32("mip count")?;
    let format = r.read_u32("format")?;
    let len = r.read_u32("data length")? as usize;
    let pixels = r.read_bytes(len, "pixel data")?;
    if width == 0 || height == 0 {
        return Err(EngineError::ResourceDecode(
            "texture has zero extent".into(),
        ));
    }
    Ok(TextureResource {
        key: data.key,
        width,
        height,
        depth,
        mip_count,
        format,
        data: pixels.to_vec(),
    })
}

// ── Buffer resource ─────────────────────────────────────────────────────────

/// Encodes a buffer resource to its cooked layout.
#[must_use]
pub fn encode_buffer(b: &BufferResource) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_bytes(&BUFFER_MAGIC);
    w.write_u16(LAYOUT_VERSION);
    w.write_u64(b.data.len() as u64);
    w.write_u32(b.stride);
    w.write_u32(b.usage);
    w.write_bytes(&b.data);
    w.into_bytes()
}

/// Decodes a cooked buffer resource.
pub fn decode_buffer(data: &CookedResourceData) -> Result<BufferResource> {
    let mut r = BinaryReader::new(&data.bytes);
    check_magic(&mut r, BUFFER_MAGIC, "buffer")?;
    let size = r.read_u64("size")? as usize;
    let stride = r.read_u32("stride")?;
    let usage = r.read_u32("usage")?;
    let payload = r.read_bytes(size, "buffer data")?;
    if stride != 0 && size % stride as usize != 0 {
        return Err(EngineError::ResourceDecode(format!(
            "buffer size {size} is not a multiple of stride {stride}"
        )));
    }
    Ok(BufferResource {
        key: data.key,
        stride,
        usage,
        data: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_round_trips_with_dependencies() {
        let key = AssetKey::generate();
        let m = MaterialAsset {
            key,
            name: "brushed_metal".into(),
            base_color: [0.8, 0.8, 0.9, 1.0],
            roughness: 0.35,
            metalness: 1.0,
            texture_keys: vec![ResourceKey::from_raw(11), ResourceKey::from_raw(12)],
        };
        let bytes = encode_material(&m);
        let decoded = decode_material(&CookedAssetData { key, bytes: &bytes }).unwrap();
        assert_eq!(decoded.payload.name, "brushed_metal");
        assert_eq!(decoded.resource_dependencies.len(), 2);
        assert!(decoded.asset_dependencies.is_empty());
    }

    #[test]
    fn buffer_rejects_misaligned_stride() {
        let key = ResourceKey::from_raw(1);
        let b = BufferResource {
            key,
            stride: 16,
            usage: 0,
            data: vec![0u8; 24],
        };
        let bytes = encode_buffer(&b);
        let err = decode_buffer(&CookedResourceData { key, bytes }).unwrap_err();
        assert!(matches!(err, EngineError::ResourceDecode(_)));
    }

    #[test]
    fn unknown_magic_rejected() {
        let key = AssetKey::generate();
        let err = decode_scene(&CookedAssetData {
            key,
            bytes: b"XXXX\x01\x00",
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::ResourceDecode(_)));
    }

    #[test]
    fn magic_maps_to_asset_type() {
        let s = SceneAsset {
            key: AssetKey::generate(),
            name: "lobby".into(),
            node_count: 3,
            asset_refs: vec![],
        };
        let bytes = encode_scene(&s);
        assert_eq!(asset_type_from_magic(&bytes), Some(asset_type::SCENE));
        assert_eq!(asset_type_from_magic(b"zz"), None);
    }
}
