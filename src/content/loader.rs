//! Asset Loader
//!
//! Mounts content containers, loads typed assets and resources with
//! reference-counted caching, maintains the asset dependency DAG, and
//! publishes eviction events.
//!
//! # Locking model
//!
//! One coarse `parking_lot::Mutex` guards the cache, the mounts, and the
//! dependency graph together. Eviction events are collected under the lock
//! but delivered strictly after it is released, so subscribers may call
//! back into the loader freely.
//!
//! # Threading model
//!
//! The loader owns a small tokio runtime for async loads. `load_asset_async`
//! executes parse + dependency resolution on that runtime and completes on
//! the awaiting task. `start_load_asset` marshals its callback back to the
//! owning thread through a completion queue drained by
//! [`AssetLoader::pump_completions`] (the orchestrator does this during the
//! AsyncPoll phase). Cancellation via [`AssetLoader::stop`] is cooperative:
//! in-flight callbacks may or may not be invoked, but never hang or crash.

use std::any::{Any, TypeId};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};
use crate::tasks::CancelToken;

use super::cooked::{
    AssetPayload, CookedAssetData, CookedResourceData, DecodedAsset, ResourcePayload, asset_type,
    asset_type_from_magic, decode_buffer, decode_geometry, decode_material, decode_scene,
    decode_texture,
};
use super::deps::DependencyGraph;
use super::events::{EvictionEvent, EvictionHub, EvictionReason, Subscription};
use super::key::{AssetKey, ResourceKey};
use super::loose::LooseCookedRoot;
use super::pak::PakArchive;

// ============================================================================
// Configuration & handles
// ============================================================================

/// Loader construction options.
#[derive(Clone, Debug)]
pub struct AssetLoaderConfig {
    /// Verify descriptor SHA-256 digests at mount time.
    pub verify_content_hashes: bool,
    /// Worker threads for the async-load runtime.
    pub runtime_threads: usize,
}

impl Default for AssetLoaderConfig {
    fn default() -> Self {
        Self {
            verify_content_hashes: false,
            runtime_threads: 2,
        }
    }
}

/// Shared handle to a cached payload.
///
/// Dropping a handle does **not** decrement the cache refcount; only the
/// explicit `release_*` calls do. The handle keeps the payload alive for
/// the holder even past eviction.
#[derive(Debug)]
pub struct SharedHandle<T> {
    payload: Arc<T>,
}

impl<T> SharedHandle<T> {
    fn new(payload: Arc<T>) -> Self {
        Self { payload }
    }

    /// Borrows the underlying shared payload.
    #[must_use]
    pub fn arc(&self) -> &Arc<T> {
        &self.payload
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<T> std::ops::Deref for SharedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.payload
    }
}

// ============================================================================
// Internal state
// ============================================================================

enum Mount {
    Pak(PakArchive),
    Loose(LooseCookedRoot),
}

struct CacheEntry {
    payload: Arc<dyn Any + Send + Sync>,
    refcount: u32,
    type_id: TypeId,
    type_name: &'static str,
    /// Resources this (asset) entry keeps checked out while cached.
    resource_deps: Vec<ResourceKey>,
}

struct DecodedDyn {
    payload: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    asset_deps: Vec<AssetKey>,
    resource_deps: Vec<ResourceKey>,
}

type DynAssetDecoder = dyn Fn(&CookedAssetData<'_>) -> Result<DecodedDyn> + Send + Sync;
type DynResourceDecoder =
    dyn Fn(&CookedResourceData) -> Result<(Arc<dyn Any + Send + Sync>, &'static str)>
        + Send
        + Sync;

struct LoaderState {
    mounts: Vec<Mount>,
    assets: FxHashMap<AssetKey, CacheEntry>,
    resources: FxHashMap<ResourceKey, CacheEntry>,
    deps: DependencyGraph,
    asset_decoders: FxHashMap<u32, Arc<DynAssetDecoder>>,
    resource_decoders: FxHashMap<TypeId, Arc<DynResourceDecoder>>,
    stopped: bool,
}

fn asset_type_name(code: u32) -> &'static str {
    match code {
        asset_type::MATERIAL => "material",
        asset_type::GEOMETRY => "geometry",
        asset_type::SCENE => "scene",
        _ => "unknown asset type",
    }
}

type CompletionFn = Box<dyn FnOnce() + Send>;

// ============================================================================
// Loader
// ============================================================================

/// The content cache: mounts, typed loading, dependencies, eviction.
pub struct AssetLoader {
    state: Mutex<LoaderState>,
    hub: EvictionHub,
    /// `Some` until drop; torn down with `shutdown_background` so the last
    /// handle may be dropped from any thread, including a runtime worker.
    runtime: Option<tokio::runtime::Runtime>,
    completion_tx: flume::Sender<CompletionFn>,
    completion_rx: flume::Receiver<CompletionFn>,
    cancel: CancelToken,
    next_synth_texture: AtomicU64,
    next_synth_buffer: AtomicU64,
    verify_hashes: AtomicBool,
}

impl AssetLoader {
    /// Creates a loader with its own async runtime.
    pub fn new(config: AssetLoaderConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.runtime_threads.max(1))
            .thread_name("cadence-assets")
            .enable_time()
            .build()
            .map_err(|e| EngineError::TaskPool(e.to_string()))?;
        let (completion_tx, completion_rx) = flume::unbounded();
        Ok(Self {
            state: Mutex::new(LoaderState {
                mounts: Vec::new(),
                assets: FxHashMap::default(),
                resources: FxHashMap::default(),
                deps: DependencyGraph::new(),
                asset_decoders: FxHashMap::default(),
                resource_decoders: FxHashMap::default(),
                stopped: false,
            }),
            hub: EvictionHub::new(),
            runtime: Some(runtime),
            completion_tx,
            completion_rx,
            cancel: CancelToken::new(),
            next_synth_texture: AtomicU64::new(1),
            next_synth_buffer: AtomicU64::new(1),
            verify_hashes: AtomicBool::new(config.verify_content_hashes),
        })
    }

    fn runtime(&self) -> &tokio::runtime::Runtime {
        self.runtime
            .as_ref()
            .unwrap_or_else(|| unreachable!("runtime lives until drop"))
    }

    /// Enables or disables descriptor SHA-256 verification for subsequent
    /// mounts.
    pub fn set_verify_content_hashes(&self, verify: bool) {
        self.verify_hashes.store(verify, Ordering::Relaxed);
    }

    /// Token observed by in-flight loads.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ========================================================================
    // Loader registration
    // ========================================================================

    /// Registers a decoder for one asset payload type.
    pub fn register_asset_loader<T: AssetPayload>(
        &self,
        decode: fn(&CookedAssetData<'_>) -> Result<DecodedAsset<T>>,
    ) {
        let wrapper: Arc<DynAssetDecoder> = Arc::new(move |data| {
            let decoded = decode(data)?;
            Ok(DecodedDyn {
                payload: Arc::new(decoded.payload),
                type_id: TypeId::of::<T>(),
                type_name: T::TYPE_NAME,
                asset_deps: decoded.asset_dependencies,
                resource_deps: decoded.resource_dependencies,
            })
        });
        self.state
            .lock()
            .asset_decoders
            .insert(T::ASSET_TYPE, wrapper);
    }

    /// Registers a decoder for one resource payload type.
    pub fn register_resource_loader<T: ResourcePayload>(
        &self,
        decode: fn(&CookedResourceData) -> Result<T>,
    ) {
        let wrapper: Arc<DynResourceDecoder> = Arc::new(move |data| {
            let payload = decode(data)?;
            Ok((
                Arc::new(payload) as Arc<dyn Any + Send + Sync>,
                T::TYPE_NAME,
            ))
        });
        self.state
            .lock()
            .resource_decoders
            .insert(TypeId::of::<T>(), wrapper);
    }

    /// Registers the built-in material/geometry/scene/texture/buffer
    /// decoders.
    pub fn register_default_loaders(&self) {
        self.register_asset_loader(decode_material);
        self.register_asset_loader(decode_geometry);
        self.register_asset_loader(decode_scene);
        self.register_resource_loader(decode_texture);
        self.register_resource_loader(decode_buffer);
    }

    // ========================================================================
    // Mounts
    // ========================================================================

    /// Mounts a packed archive.
    pub fn add_pak(&self, path: &Path) -> Result<()> {
        let pak = PakArchive::open(path)?;
        self.state.lock().mounts.push(Mount::Pak(pak));
        Ok(())
    }

    /// Mounts a loose cooked root directory.
    pub fn add_loose_cooked_root(&self, root: &Path) -> Result<()> {
        let verify = self.verify_hashes.load(Ordering::Relaxed);
        let loose = LooseCookedRoot::open(root, verify)?;
        self.state.lock().mounts.push(Mount::Loose(loose));
        Ok(())
    }

    /// Unmounts everything and evicts all cached entries with
    /// [`EvictionReason::Clear`]. Cancels nothing.
    pub fn clear_mounts(&self) {
        let events = {
            let mut state = self.state.lock();
            state.mounts.clear();
            Self::evict_everything(&mut state, EvictionReason::Clear)
        };
        self.hub.dispatch(&events);
    }

    /// Stops the loader: signals cancellation to in-flight loads and evicts
    /// all cached entries with [`EvictionReason::Shutdown`].
    pub fn stop(&self) {
        self.cancel.cancel();
        let events = {
            let mut state = self.state.lock();
            state.stopped = true;
            Self::evict_everything(&mut state, EvictionReason::Shutdown)
        };
        self.hub.dispatch(&events);
    }

    fn evict_everything(state: &mut LoaderState, reason: EvictionReason) -> Vec<EvictionEvent> {
        state.assets.clear();
        state.deps.clear();
        let mut evicted: Vec<(ResourceKey, TypeId)> = state
            .resources
            .drain()
            .map(|(key, entry)| (key, entry.type_id))
            .collect();
        evicted.sort_by_key(|(key, _)| *key);
        evicted
            .into_iter()
            .map(|(key, type_id)| EvictionEvent {
                key,
                type_id,
                reason,
            })
            .collect()
    }

    /// Keys loadable from the current mounts, in mount order.
    #[must_use]
    pub fn loadable_keys(&self) -> Vec<AssetKey> {
        let state = self.state.lock();
        let mut keys = Vec::new();
        for mount in &state.mounts {
            match mount {
                Mount::Pak(pak) => keys.extend(pak.asset_keys()),
                Mount::Loose(root) => keys.extend(root.asset_keys()),
            }
        }
        keys
    }

    // ========================================================================
    // Synchronous loading
    // ========================================================================

    /// Loads an asset by key, caching it and resolving its dependencies.
    ///
    /// Returns `Ok(None)` when no mount knows the key. Each successful call
    /// increments the cache refcount; pair with [`AssetLoader::release_asset`].
    pub fn load_asset<T: AssetPayload>(&self, key: AssetKey) -> Result<Option<SharedHandle<T>>> {
        self.cancel.check()?;
        let (result, events) = {
            let mut state = self.state.lock();
            if state.stopped {
                return Err(EngineError::Canceled);
            }
            let loaded = Self::load_asset_dyn(&mut state, key)?;
            match loaded {
                None => (Ok(None), Vec::new()),
                Some((payload, type_id, type_name)) => {
                    if type_id == TypeId::of::<T>() {
                        let arc = payload
                            .downcast::<T>()
                            .unwrap_or_else(|_| unreachable!("type id already checked"));
                        (Ok(Some(SharedHandle::new(arc))), Vec::new())
                    } else {
                        // Undo the refcount taken by the failed typed load.
                        let mut events = Vec::new();
                        Self::release_asset_locked(
                            &mut state,
                            key,
                            &mut events,
                            EvictionReason::RefCountZero,
                        );
                        (
                            Err(EngineError::ResourceDecode(format!(
                                "asset {key} is a {type_name}, not {}",
                                T::TYPE_NAME
                            ))),
                            events,
                        )
                    }
                }
            }
        };
        self.hub.dispatch(&events);
        result
    }

    fn load_asset_dyn(
        state: &mut LoaderState,
        key: AssetKey,
    ) -> Result<Option<(Arc<dyn Any + Send + Sync>, TypeId, &'static str)>> {
        if let Some(entry) = state.assets.get_mut(&key) {
            entry.refcount += 1;
            return Ok(Some((
                Arc::clone(&entry.payload),
                entry.type_id,
                entry.type_name,
            )));
        }

        let Some((bytes, code)) = Self::find_cooked(state, key)? else {
            return Ok(None);
        };
        let decoder = state
            .asset_decoders
            .get(&code)
            .cloned()
            .ok_or(EngineError::LoaderDispatch(asset_type_name(code)))?;
        let decoded = decoder(&CookedAssetData {
            key,
            bytes: &bytes,
        })?;

        // Resolve dependencies before publishing the entry. Each recursive
        // load takes one refcount on the dependency, owned by this entry.
        let mut loaded_asset_deps = Vec::new();
        for dep in &decoded.asset_deps {
            match Self::load_asset_dyn(state, *dep)? {
                Some(_) => loaded_asset_deps.push(*dep),
                None => {
                    log::warn!("asset {key} depends on missing asset {dep}");
                }
            }
        }
        let mut retained_resources = Vec::new();
        for rkey in &decoded.resource_deps {
            if let Some(entry) = state.resources.get_mut(rkey) {
                entry.refcount += 1;
                retained_resources.push(*rkey);
            } else {
                log::debug!("asset {key} references uncached resource {rkey}");
            }
        }

        state.assets.insert(
            key,
            CacheEntry {
                payload: Arc::clone(&decoded.payload),
                refcount: 1,
                type_id: decoded.type_id,
                type_name: decoded.type_name,
                resource_deps: retained_resources,
            },
        );
        for dep in &loaded_asset_deps {
            // A freshly decoded entry cannot close a cycle, but keep the
            // invariant checked in debug builds.
            debug_assert!(!state.deps.would_create_cycle(key, *dep));
            state.deps.add_edge(key, *dep);
        }

        log::debug!(
            "loaded asset {key} ({}) with {} asset dep(s)",
            decoded.type_name,
            loaded_asset_deps.len()
        );
        Ok(Some((decoded.payload, decoded.type_id, decoded.type_name)))
    }

    fn find_cooked(state: &LoaderState, key: AssetKey) -> Result<Option<(Vec<u8>, u32)>> {
        for mount in &state.mounts {
            match mount {
                Mount::Loose(root) => {
                    if let Some(entry) = root.entry(key) {
                        let code = entry.asset_type;
                        let bytes = root
                            .descriptor_bytes(key)?
                            .expect("entry was just looked up");
                        return Ok(Some((bytes, code)));
                    }
                }
                Mount::Pak(pak) => {
                    if let Some(bytes) = pak.asset_bytes(key) {
                        let code = asset_type_from_magic(bytes).ok_or_else(|| {
                            EngineError::ResourceDecode(format!(
                                "pak entry {key} has unrecognized payload magic"
                            ))
                        })?;
                        return Ok(Some((bytes.to_vec(), code)));
                    }
                }
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Async loading
    // ========================================================================

    /// Awaitable load: parse and dependency resolution run on the loader's
    /// runtime; the future completes on the awaiting task.
    pub async fn load_asset_async<T: AssetPayload>(
        self: &Arc<Self>,
        key: AssetKey,
    ) -> Result<Option<SharedHandle<T>>> {
        let this = Arc::clone(self);
        let handle = self.runtime().spawn(async move { this.load_asset::<T>(key) });
        handle
            .await
            .map_err(|e| EngineError::TaskPool(e.to_string()))?
    }

    /// Loads several assets concurrently on the runtime; results preserve
    /// key order. Absent keys yield `None` without failing the batch.
    pub async fn load_assets_async<T: AssetPayload>(
        self: &Arc<Self>,
        keys: &[AssetKey],
    ) -> Result<Vec<Option<SharedHandle<T>>>> {
        let handles: Vec<_> = keys
            .iter()
            .map(|key| {
                let this = Arc::clone(self);
                let key = *key;
                self.runtime()
                    .spawn(async move { this.load_asset::<T>(key) })
            })
            .collect();
        let joined = futures::future::try_join_all(handles)
            .await
            .map_err(|e| EngineError::TaskPool(e.to_string()))?;
        joined.into_iter().collect()
    }

    /// Fire-and-forget load. `callback` is invoked on the owning thread via
    /// [`AssetLoader::pump_completions`] with the load result (`None` on
    /// failure or absence). Under [`AssetLoader::stop`] the callback may or
    /// may not run.
    pub fn start_load_asset<T, F>(self: &Arc<Self>, key: AssetKey, callback: F)
    where
        T: AssetPayload,
        F: FnOnce(Option<SharedHandle<T>>) + Send + 'static,
    {
        let this = Arc::clone(self);
        let tx = self.completion_tx.clone();
        let cancel = self.cancel.clone();
        self.runtime().spawn(async move {
            if cancel.is_canceled() {
                return;
            }
            let result = match this.load_asset::<T>(key) {
                Ok(handle) => handle,
                Err(e) => {
                    log::warn!("background load of {key} failed: {e}");
                    None
                }
            };
            if cancel.is_canceled() {
                return;
            }
            let _ = tx.send(Box::new(move || callback(result)));
        });
    }

    /// Drains the completion queue, invoking pending background-load
    /// callbacks on the calling thread. Returns the number of callbacks run.
    pub fn pump_completions(&self) -> usize {
        let mut count = 0;
        while let Ok(callback) = self.completion_rx.try_recv() {
            callback();
            count += 1;
        }
        count
    }

    /// Decodes and caches a resource from caller-supplied cooked bytes.
    ///
    /// Used by import/cooking paths; the result is cached under
    /// `cooked.key` with refcount 1 (or the existing entry is checked out).
    pub async fn load_resource_async<T: ResourcePayload>(
        self: &Arc<Self>,
        cooked: CookedResourceData,
    ) -> Result<SharedHandle<T>> {
        let this = Arc::clone(self);
        let handle = self
            .runtime()
            .spawn(async move { this.load_resource_sync::<T>(&cooked) });
        handle
            .await
            .map_err(|e| EngineError::TaskPool(e.to_string()))?
    }

    fn load_resource_sync<T: ResourcePayload>(
        &self,
        cooked: &CookedResourceData,
    ) -> Result<SharedHandle<T>> {
        self.cancel.check()?;
        let mut state = self.state.lock();
        if state.stopped {
            return Err(EngineError::Canceled);
        }
        if let Some(entry) = state.resources.get_mut(&cooked.key) {
            if entry.type_id != TypeId::of::<T>() {
                return Err(EngineError::ResourceDecode(format!(
                    "resource {} is already cached as {}, not {}",
                    cooked.key,
                    entry.type_name,
                    T::TYPE_NAME
                )));
            }
            entry.refcount += 1;
            let arc = Arc::clone(&entry.payload)
                .downcast::<T>()
                .unwrap_or_else(|_| unreachable!("type id already checked"));
            return Ok(SharedHandle::new(arc));
        }

        let decoder = state
            .resource_decoders
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or(EngineError::LoaderDispatch(T::TYPE_NAME))?;
        let (payload, type_name) = decoder(cooked)?;
        let arc = Arc::clone(&payload)
            .downcast::<T>()
            .map_err(|_| EngineError::ResourceDecode("decoder returned wrong type".into()))?;
        state.resources.insert(
            cooked.key,
            CacheEntry {
                payload,
                refcount: 1,
                type_id: TypeId::of::<T>(),
                type_name,
                resource_deps: Vec::new(),
            },
        );
        Ok(SharedHandle::new(arc))
    }

    /// Checks out a cached resource without re-decoding: increments the
    /// refcount and returns the shared instance. `None` when uncached or of
    /// a different type.
    pub fn check_out_resource<T: ResourcePayload>(
        &self,
        key: ResourceKey,
    ) -> Option<SharedHandle<T>> {
        let mut state = self.state.lock();
        let entry = state.resources.get_mut(&key)?;
        if entry.type_id != TypeId::of::<T>() {
            return None;
        }
        entry.refcount += 1;
        let arc = Arc::clone(&entry.payload)
            .downcast::<T>()
            .unwrap_or_else(|_| unreachable!("type id already checked"));
        Some(SharedHandle::new(arc))
    }

    // ========================================================================
    // Dependencies
    // ========================================================================

    /// Registers "`a` depends on `b`".
    ///
    /// Inserting an edge that would create a cycle is a hard error in debug
    /// builds and a logged no-op in release builds.
    pub fn add_asset_dependency(&self, a: AssetKey, b: AssetKey) {
        let mut state = self.state.lock();
        if state.deps.would_create_cycle(a, b) {
            #[cfg(debug_assertions)]
            panic!("asset dependency cycle: edge {a} -> {b} would close a loop");
            #[cfg(not(debug_assertions))]
            {
                log::error!("rejected asset dependency cycle: {a} -> {b}");
                return;
            }
        }
        state.deps.add_edge(a, b);
    }

    /// Enumerates the dependents of `key`. Debug-build-only test surface.
    #[cfg(debug_assertions)]
    pub fn for_each_dependent(&self, key: AssetKey, mut f: impl FnMut(AssetKey)) {
        let state = self.state.lock();
        for dep in state.deps.dependents_of(key) {
            f(*dep);
        }
    }

    // ========================================================================
    // Release & eviction
    // ========================================================================

    /// Decrements the asset refcount; at zero with no remaining dependents
    /// the entry is evicted and its dependencies released in registration
    /// order. Idempotent: releasing an unknown key succeeds.
    pub fn release_asset(&self, key: AssetKey) -> bool {
        let events = {
            let mut state = self.state.lock();
            let mut events = Vec::new();
            Self::release_asset_locked(&mut state, key, &mut events, EvictionReason::RefCountZero);
            events
        };
        self.hub.dispatch(&events);
        true
    }

    fn release_asset_locked(
        state: &mut LoaderState,
        key: AssetKey,
        events: &mut Vec<EvictionEvent>,
        reason: EvictionReason,
    ) {
        let Some(entry) = state.assets.get_mut(&key) else {
            return; // already evicted or never cached
        };
        if entry.refcount > 0 {
            entry.refcount -= 1;
        }
        if entry.refcount == 0 && !state.deps.has_dependents(key) {
            let entry = state
                .assets
                .remove(&key)
                .unwrap_or_else(|| unreachable!("entry was just borrowed"));
            let dep_list = state.deps.remove_vertex(key);
            log::debug!("evicting asset {key} ({})", entry.type_name);
            for rkey in entry.resource_deps {
                Self::release_resource_locked(state, rkey, events, reason);
            }
            for dep in dep_list {
                Self::release_asset_locked(state, dep, events, reason);
            }
        }
    }

    /// Decrements the resource refcount; at zero the entry is evicted and a
    /// single eviction event per subscriber is emitted. Idempotent.
    pub fn release_resource(&self, key: ResourceKey) -> bool {
        let events = {
            let mut state = self.state.lock();
            let mut events = Vec::new();
            Self::release_resource_locked(
                &mut state,
                key,
                &mut events,
                EvictionReason::RefCountZero,
            );
            events
        };
        self.hub.dispatch(&events);
        true
    }

    fn release_resource_locked(
        state: &mut LoaderState,
        key: ResourceKey,
        events: &mut Vec<EvictionEvent>,
        reason: EvictionReason,
    ) {
        let Some(entry) = state.resources.get_mut(&key) else {
            return;
        };
        if entry.refcount > 0 {
            entry.refcount -= 1;
        }
        if entry.refcount == 0 {
            let entry = state
                .resources
                .remove(&key)
                .unwrap_or_else(|| unreachable!("entry was just borrowed"));
            log::debug!("evicting resource {key} ({})", entry.type_name);
            events.push(EvictionEvent {
                key,
                type_id: entry.type_id,
                reason,
            });
        }
    }

    /// Subscribes to eviction events for one resource payload class.
    ///
    /// The returned handle unsubscribes on drop. Handlers run outside the
    /// loader's critical section and may call back into the loader.
    pub fn subscribe_resource_evictions(
        &self,
        type_id: TypeId,
        handler: impl Fn(&EvictionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.hub.subscribe(type_id, handler)
    }

    // ========================================================================
    // Synthetic keys & introspection
    // ========================================================================

    /// Mints a collision-free key for an in-memory texture resource.
    #[must_use]
    pub fn mint_synthetic_texture_key(&self) -> ResourceKey {
        ResourceKey::synthetic_texture(self.next_synth_texture.fetch_add(1, Ordering::Relaxed))
    }

    /// Mints a collision-free key for an in-memory buffer resource.
    #[must_use]
    pub fn mint_synthetic_buffer_key(&self) -> ResourceKey {
        ResourceKey::synthetic_buffer(self.next_synth_buffer.fetch_add(1, Ordering::Relaxed))
    }

    /// Current cache refcount of an asset, if cached.
    #[must_use]
    pub fn asset_refcount(&self, key: AssetKey) -> Option<u32> {
        self.state.lock().assets.get(&key).map(|e| e.refcount)
    }

    /// Current cache refcount of a resource, if cached.
    #[must_use]
    pub fn resource_refcount(&self, key: ResourceKey) -> Option<u32> {
        self.state.lock().resources.get(&key).map(|e| e.refcount)
    }

    /// Whether an asset is currently cached.
    #[must_use]
    pub fn is_asset_cached(&self, key: AssetKey) -> bool {
        self.state.lock().assets.contains_key(&key)
    }

    /// Whether a resource is currently cached.
    #[must_use]
    pub fn is_resource_cached(&self, key: ResourceKey) -> bool {
        self.state.lock().resources.contains_key(&key)
    }

    /// Dependents of `key` currently registered in the graph.
    #[must_use]
    pub fn dependents_of(&self, key: AssetKey) -> Vec<AssetKey> {
        self.state.lock().deps.dependents_of(key).to_vec()
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(runtime) = self.runtime.take() {
            // shutdown_background is callable from any thread, including a
            // runtime worker that dropped the last loader handle.
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AssetLoader")
            .field("mounts", &state.mounts.len())
            .field("cached_assets", &state.assets.len())
            .field("cached_resources", &state.resources.len())
            .field("stopped", &state.stopped)
            .finish()
    }
}
