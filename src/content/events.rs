//! Eviction Events
//!
//! Subscription hub for cache eviction notifications. Handlers are invoked
//! strictly outside the loader's critical section, so a handler may call
//! back into the loader (including releasing further resources) without
//! deadlocking. Each eviction yields exactly one event per matching
//! subscriber: an entry is removed from the cache before its event is
//! queued, so a re-entrant release of the same key is an idempotent no-op
//! and can never loop the notification.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::key::ResourceKey;

/// Why a cache entry was evicted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EvictionReason {
    /// Refcount reached zero after an explicit release.
    RefCountZero,
    /// `clear_mounts` invalidated the cache.
    Clear,
    /// The loader is shutting down.
    Shutdown,
}

/// A single eviction notification.
#[derive(Clone, Debug)]
pub struct EvictionEvent {
    /// Key of the evicted resource.
    pub key: ResourceKey,
    /// Type id of the evicted payload class.
    pub type_id: TypeId,
    /// Why the entry was evicted.
    pub reason: EvictionReason,
}

type Handler = Arc<dyn Fn(&EvictionEvent) + Send + Sync>;

struct SubscriberEntry {
    id: u64,
    type_id: TypeId,
    handler: Handler,
}

type SubscriberList = Mutex<Vec<SubscriberEntry>>;

/// Registry of eviction subscribers, one per loader.
#[derive(Default)]
pub(crate) struct EvictionHub {
    subscribers: Arc<SubscriberList>,
    next_id: AtomicU64,
}

impl EvictionHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for evictions of one payload type.
    pub(crate) fn subscribe(
        &self,
        type_id: TypeId,
        handler: impl Fn(&EvictionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(SubscriberEntry {
            id,
            type_id,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Delivers a batch of events.
    ///
    /// The subscriber list is snapshotted under its own lock and released
    /// before any handler runs; handlers that subscribe or unsubscribe
    /// during delivery take effect for the next batch.
    pub(crate) fn dispatch(&self, events: &[EvictionEvent]) {
        if events.is_empty() {
            return;
        }
        let snapshot: Vec<(TypeId, Handler)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.type_id, Arc::clone(&s.handler)))
            .collect();
        for event in events {
            for (type_id, handler) in &snapshot {
                if *type_id == event.type_id {
                    handler(event);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Opaque subscription handle; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.subscribers.upgrade() {
            list.lock().retain(|s| s.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event(key: u64) -> EvictionEvent {
        EvictionEvent {
            key: ResourceKey::from_raw(key),
            type_id: TypeId::of::<u32>(),
            reason: EvictionReason::RefCountZero,
        }
    }

    #[test]
    fn dropped_subscription_receives_nothing() {
        let hub = EvictionHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = hub.subscribe(TypeId::of::<u32>(), move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });
        hub.dispatch(&[event(1)]);
        drop(sub);
        hub.dispatch(&[event(2)]);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn type_filter_applies() {
        let hub = EvictionHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = hub.subscribe(TypeId::of::<u64>(), move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });
        hub.dispatch(&[event(1)]); // type_id is u32, not u64
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
