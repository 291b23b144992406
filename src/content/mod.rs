//! Content System
//!
//! Mountable containers, the typed asset/resource cache, the inter-asset
//! dependency DAG, and eviction events.
//!
//! # Overview
//!
//! The [`AssetLoader`] is the single entry point: mount containers with
//! [`AssetLoader::add_pak`] / [`AssetLoader::add_loose_cooked_root`], then
//! load typed payloads by key. Loads are cached and reference-counted;
//! handles keep payloads alive for their holder but never pin cache
//! entries — eviction is driven exclusively by explicit `release_*` calls
//! cascading through the dependency graph.

pub mod cooked;
pub mod deps;
pub mod events;
pub mod key;
pub mod loader;
pub mod loose;
pub mod pak;

pub use cooked::{
    AssetPayload, BufferResource, CookedAssetData, CookedResourceData, DecodedAsset,
    GeometryAsset, MaterialAsset, ResourcePayload, SceneAsset, TextureResource,
};
pub use deps::DependencyGraph;
pub use events::{EvictionEvent, EvictionReason, Subscription};
pub use key::{AssetKey, ResourceKey};
pub use loader::{AssetLoader, AssetLoaderConfig, SharedHandle};
pub use loose::{LooseCookedRoot, LooseRootWriter};
pub use pak::{PakArchive, PakWriter};
