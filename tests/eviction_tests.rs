//! Eviction Event Tests
//!
//! Tests for:
//! - Type-filtered delivery of eviction events
//! - Exactly-once delivery with re-entrant handlers
//! - Subscription drop semantics
//! - Clear / Shutdown eviction reasons

use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use cadence::content::{
    AssetLoader, AssetLoaderConfig, BufferResource, CookedResourceData, EvictionReason,
    ResourceKey, TextureResource, cooked,
};

fn new_loader() -> Arc<AssetLoader> {
    let loader = Arc::new(AssetLoader::new(AssetLoaderConfig::default()).unwrap());
    loader.register_default_loaders();
    loader
}

fn load_texture(loader: &Arc<AssetLoader>, key: ResourceKey) {
    let texture = TextureResource {
        key,
        width: 4,
        height: 4,
        depth: 1,
        mip_count: 1,
        format: 0,
        data: vec![0xAB; 64],
    };
    let handle = pollster::block_on(loader.load_resource_async::<TextureResource>(
        CookedResourceData {
            key,
            bytes: cooked::encode_texture(&texture),
        },
    ))
    .unwrap();
    drop(handle); // dropping the handle must not evict
}

fn load_buffer(loader: &Arc<AssetLoader>, key: ResourceKey) {
    let buffer = BufferResource {
        key,
        stride: 16,
        usage: 0,
        data: vec![0u8; 64],
    };
    let handle = pollster::block_on(loader.load_resource_async::<BufferResource>(
        CookedResourceData {
            key,
            bytes: cooked::encode_buffer(&buffer),
        },
    ))
    .unwrap();
    drop(handle);
}

// ============================================================================
// Type Filtering
// ============================================================================

#[test]
fn subscription_filters_by_resource_type() {
    let loader = new_loader();
    let texture_key = loader.mint_synthetic_texture_key();
    let buffer_key = loader.mint_synthetic_buffer_key();
    load_texture(&loader, texture_key);
    load_buffer(&loader, buffer_key);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = loader.subscribe_resource_evictions(
        TypeId::of::<TextureResource>(),
        move |event| sink.lock().push((event.key, event.reason)),
    );

    loader.release_resource(buffer_key);
    loader.release_resource(texture_key);

    let events = events.lock();
    assert_eq!(events.len(), 1, "only the texture eviction is delivered");
    assert_eq!(events[0].0, texture_key);
    assert_eq!(events[0].1, EvictionReason::RefCountZero);
}

#[test]
fn dropped_subscription_is_never_redelivered() {
    let loader = new_loader();
    let key = loader.mint_synthetic_texture_key();
    load_texture(&loader, key);

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let sub = loader.subscribe_resource_evictions(TypeId::of::<TextureResource>(), move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
    });
    drop(sub);

    loader.release_resource(key);
    assert_eq!(count.load(Ordering::Relaxed), 0);
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn reentrant_handler_sees_exactly_one_event() {
    let loader = new_loader();
    let key = loader.mint_synthetic_buffer_key();
    load_buffer(&loader, key);

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let reentrant = Arc::clone(&loader);
    let _sub = loader.subscribe_resource_evictions(
        TypeId::of::<BufferResource>(),
        move |event| {
            sink.fetch_add(1, Ordering::Relaxed);
            // Calling back into the loader from the handler must neither
            // deadlock nor loop the notification.
            reentrant.release_resource(event.key);
        },
    );

    loader.release_resource(key);
    assert_eq!(count.load(Ordering::Relaxed), 1);
}

// ============================================================================
// Clear & Shutdown Reasons
// ============================================================================

#[test]
fn clear_mounts_evicts_with_clear_reason() {
    let loader = new_loader();
    let key = loader.mint_synthetic_texture_key();
    load_texture(&loader, key);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = loader.subscribe_resource_evictions(
        TypeId::of::<TextureResource>(),
        move |event| sink.lock().push(event.reason),
    );

    loader.clear_mounts();
    assert_eq!(events.lock().as_slice(), &[EvictionReason::Clear]);
    assert!(!loader.is_resource_cached(key));
}

#[test]
fn stop_evicts_with_shutdown_reason() {
    let loader = new_loader();
    let texture_key = loader.mint_synthetic_texture_key();
    let buffer_key = loader.mint_synthetic_buffer_key();
    load_texture(&loader, texture_key);
    load_buffer(&loader, buffer_key);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = loader.subscribe_resource_evictions(
        TypeId::of::<BufferResource>(),
        move |event| sink.lock().push((event.key, event.reason)),
    );

    loader.stop();
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], (buffer_key, EvictionReason::Shutdown));
}

#[test]
fn refcounted_resource_survives_partial_release() {
    let loader = new_loader();
    let key = loader.mint_synthetic_texture_key();
    load_texture(&loader, key);
    let checkout = loader.check_out_resource::<TextureResource>(key).unwrap();
    assert_eq!(checkout.width, 4);
    assert_eq!(loader.resource_refcount(key), Some(2));

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let _sub = loader.subscribe_resource_evictions(TypeId::of::<TextureResource>(), move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
    });

    loader.release_resource(key);
    assert!(loader.is_resource_cached(key));
    assert_eq!(count.load(Ordering::Relaxed), 0);

    loader.release_resource(key);
    assert!(!loader.is_resource_cached(key));
    assert_eq!(count.load(Ordering::Relaxed), 1);
}
