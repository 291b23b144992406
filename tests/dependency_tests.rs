//! Asset Dependency Tests
//!
//! Tests for:
//! - Cascaded release: dependents must be released before the dependency
//! - Idempotent release
//! - Cycle rejection on dependency insertion (debug builds abort)
//! - Debug-only dependent enumeration

use std::sync::Arc;

use cadence::content::{
    AssetKey, AssetLoader, AssetLoaderConfig, GeometryAsset, LooseRootWriter, MaterialAsset,
    cooked,
};

fn key(n: u8) -> AssetKey {
    let mut bytes = [0u8; 16];
    bytes[0] = n;
    bytes[15] = 0xEE;
    AssetKey::from_bytes(bytes)
}

/// Mounts a root with two geometries (A, B) both referencing material C.
fn loader_with_diamond(dir: &std::path::Path) -> Arc<AssetLoader> {
    let material = MaterialAsset {
        key: key(3),
        name: "shared_material".into(),
        base_color: [1.0; 4],
        roughness: 0.5,
        metalness: 0.0,
        texture_keys: vec![],
    };
    let geometry = |k: AssetKey, name: &str| GeometryAsset {
        key: k,
        name: name.into(),
        vertex_count: 8,
        index_count: 36,
        lod_count: 1,
        buffer_keys: vec![],
        material_keys: vec![key(3)],
    };

    LooseRootWriter::new(dir)
        .add_asset(
            key(1),
            "geo_a.bin",
            "/meshes/a",
            cooked::asset_type::GEOMETRY,
            cooked::encode_geometry(&geometry(key(1), "a")),
        )
        .add_asset(
            key(2),
            "geo_b.bin",
            "/meshes/b",
            cooked::asset_type::GEOMETRY,
            cooked::encode_geometry(&geometry(key(2), "b")),
        )
        .add_asset(
            key(3),
            "mat_c.bin",
            "/materials/c",
            cooked::asset_type::MATERIAL,
            cooked::encode_material(&material),
        )
        .write()
        .unwrap();

    let loader = Arc::new(AssetLoader::new(AssetLoaderConfig::default()).unwrap());
    loader.register_default_loaders();
    loader.add_loose_cooked_root(dir).unwrap();
    loader
}

// ============================================================================
// Cascaded Release
// ============================================================================

#[test]
fn dependents_block_eviction_until_all_released() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_with_diamond(dir.path());

    let a = loader.load_asset::<GeometryAsset>(key(1)).unwrap().unwrap();
    let b = loader.load_asset::<GeometryAsset>(key(2)).unwrap().unwrap();
    assert_eq!(a.material_keys, vec![key(3)]);
    assert_eq!(b.material_keys, vec![key(3)]);

    // C was loaded once per dependent.
    assert_eq!(loader.asset_refcount(key(3)), Some(2));
    let mut dependents = loader.dependents_of(key(3));
    dependents.sort();
    assert_eq!(dependents, vec![key(1), key(2)]);

    assert!(loader.release_asset(key(1)));
    assert!(!loader.is_asset_cached(key(1)));
    assert!(loader.is_asset_cached(key(3)), "B still depends on C");
    assert_eq!(loader.dependents_of(key(3)), vec![key(2)]);

    assert!(loader.release_asset(key(2)));
    assert!(loader.dependents_of(key(3)).is_empty());
    assert!(!loader.is_asset_cached(key(3)), "cascade evicted C");
}

#[test]
fn release_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_with_diamond(dir.path());

    let _a = loader.load_asset::<GeometryAsset>(key(1)).unwrap().unwrap();
    assert!(loader.release_asset(key(1)));
    assert!(loader.release_asset(key(1)), "second release still succeeds");
    assert!(loader.release_asset(key(99)), "unknown key releases cleanly");
}

#[test]
fn refcount_requires_matching_releases() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_with_diamond(dir.path());

    let _first = loader.load_asset::<GeometryAsset>(key(1)).unwrap().unwrap();
    let _second = loader.load_asset::<GeometryAsset>(key(1)).unwrap().unwrap();
    assert_eq!(loader.asset_refcount(key(1)), Some(2));
    assert_eq!(
        loader.asset_refcount(key(3)),
        Some(1),
        "cached dependency is not re-loaded"
    );

    loader.release_asset(key(1));
    assert!(loader.is_asset_cached(key(1)));
    loader.release_asset(key(1));
    assert!(!loader.is_asset_cached(key(1)));
    assert!(!loader.is_asset_cached(key(3)));
}

// ============================================================================
// Cycle Rejection
// ============================================================================

#[test]
#[should_panic(expected = "cycle")]
fn inserting_cycle_aborts_in_debug() {
    let loader = AssetLoader::new(AssetLoaderConfig::default()).unwrap();
    loader.add_asset_dependency(key(1), key(2));
    loader.add_asset_dependency(key(2), key(1));
}

#[test]
#[should_panic(expected = "cycle")]
fn self_dependency_aborts_in_debug() {
    let loader = AssetLoader::new(AssetLoaderConfig::default()).unwrap();
    loader.add_asset_dependency(key(1), key(1));
}

// ============================================================================
// Debug Enumeration
// ============================================================================

#[cfg(debug_assertions)]
#[test]
fn for_each_dependent_enumerates_registered_edges() {
    let loader = AssetLoader::new(AssetLoaderConfig::default()).unwrap();
    loader.add_asset_dependency(key(1), key(3));
    loader.add_asset_dependency(key(2), key(3));

    let mut seen = Vec::new();
    loader.for_each_dependent(key(3), |k| seen.push(k));
    seen.sort();
    assert_eq!(seen, vec![key(1), key(2)]);

    loader.for_each_dependent(key(1), |_| panic!("key 1 has no dependents"));
}
