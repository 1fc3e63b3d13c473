//! Process-wide keyed cache of opaque service-owned items.
//!
//! Each entry is addressed by `(service_id, namespace, key)`. Capacity is
//! configured per `(service_id, namespace)` partition; eviction follows
//! least-recently-used order within that partition. Eviction never runs a
//! destructor while a handle is outstanding — it defers until the last
//! `ItemHandle` referencing that entry is closed.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use mlt_core::env::avformat_producer_cache_depth;
use parking_lot::RwLock;

pub type Destructor = Arc<dyn Fn() + Send + Sync>;
pub type CacheValue = Arc<dyn Any + Send + Sync>;

struct Entry {
    data: CacheValue,
    size: usize,
    destructor: Option<Destructor>,
    refcount: Arc<AtomicUsize>,
    evicted: Arc<AtomicBool>,
}

/// A live reference into the cache. Dropping the last outstanding handle
/// for an evicted entry runs its destructor.
pub struct ItemHandle {
    data: CacheValue,
    refcount: Arc<AtomicUsize>,
    evicted: Arc<AtomicBool>,
    destructor: Option<Destructor>,
}

impl ItemHandle {
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn data(&self) -> &CacheValue {
        &self.data
    }
}

impl Drop for ItemHandle {
    fn drop(&mut self) {
        let previous = self.refcount.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 && self.evicted.load(Ordering::Acquire) {
            if let Some(d) = &self.destructor {
                d();
            }
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct PartitionKey {
    service_id: u64,
    namespace: String,
}

struct Partition {
    capacity: usize,
    entries: IndexMap<String, Entry>,
}

impl Partition {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    /// Evicts from the front (least-recently-used) until at or under
    /// capacity.
    fn evict_to_capacity(&mut self) {
        while self.entries.len() > self.capacity.max(1) {
            if let Some((_, entry)) = self.entries.shift_remove_index(0) {
                entry.evicted.store(true, Ordering::Release);
                if entry.refcount.load(Ordering::Acquire) == 0 {
                    if let Some(d) = &entry.destructor {
                        d();
                    }
                }
            } else {
                break;
            }
        }
    }
}

/// A process-wide cache partitioned by `(service_id, namespace)`. Every
/// service typically owns one `Arc<ServiceCache>` handle shared across its
/// threads; items are refcounted so a single global lock guards the index
/// without guarding access to the items themselves.
pub struct ServiceCache {
    partitions: RwLock<HashMap<PartitionKey, Partition>>,
    default_capacity: usize,
}

impl Default for ServiceCache {
    fn default() -> Self {
        Self::new(avformat_producer_cache_depth())
    }
}

impl ServiceCache {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            default_capacity: default_capacity.max(1),
        }
    }

    pub fn set_capacity(&self, service_id: u64, namespace: &str, capacity: usize) {
        let key = PartitionKey {
            service_id,
            namespace: namespace.to_string(),
        };
        let mut partitions = self.partitions.write();
        let partition = partitions
            .entry(key)
            .or_insert_with(|| Partition::new(self.default_capacity));
        partition.capacity = capacity.max(1);
        partition.evict_to_capacity();
    }

    /// Atomically acquires a reference to the cached item, bumping it to
    /// most-recently-used.
    pub fn get(&self, service_id: u64, namespace: &str, key: &str) -> Option<ItemHandle> {
        let pkey = PartitionKey {
            service_id,
            namespace: namespace.to_string(),
        };
        let mut partitions = self.partitions.write();
        let partition = partitions.get_mut(&pkey)?;
        let index = partition.entries.get_index_of(key)?;
        partition.entries.move_index(index, partition.entries.len() - 1);
        let entry = partition.entries.get(key)?;
        entry.refcount.fetch_add(1, Ordering::AcqRel);
        Some(ItemHandle {
            data: entry.data.clone(),
            refcount: entry.refcount.clone(),
            evicted: entry.evicted.clone(),
            destructor: entry.destructor.clone(),
        })
    }

    /// Inserts `data` under `key`, evicting the partition's
    /// least-recently-used entry if this insertion exceeds capacity.
    pub fn put(
        &self,
        service_id: u64,
        namespace: &str,
        key: &str,
        data: CacheValue,
        size: usize,
        destructor: Option<Destructor>,
    ) {
        let pkey = PartitionKey {
            service_id,
            namespace: namespace.to_string(),
        };
        let mut partitions = self.partitions.write();
        let partition = partitions
            .entry(pkey)
            .or_insert_with(|| Partition::new(self.default_capacity));
        partition.entries.insert(
            key.to_string(),
            Entry {
                data,
                size,
                destructor,
                refcount: Arc::new(AtomicUsize::new(0)),
                evicted: Arc::new(AtomicBool::new(false)),
            },
        );
        partition.evict_to_capacity();
    }

    /// Invalidates every partition owned by `service_id`. Outstanding
    /// handles keep their data alive until closed.
    pub fn purge_service(&self, service_id: u64) {
        let mut partitions = self.partitions.write();
        let keys: Vec<PartitionKey> = partitions
            .keys()
            .filter(|k| k.service_id == service_id)
            .cloned()
            .collect();
        for key in keys {
            if let Some(mut partition) = partitions.remove(&key) {
                for (_, entry) in partition.entries.drain(..) {
                    entry.evicted.store(true, Ordering::Release);
                    if entry.refcount.load(Ordering::Acquire) == 0 {
                        if let Some(d) = &entry.destructor {
                            d();
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self, service_id: u64, namespace: &str) -> usize {
        let pkey = PartitionKey {
            service_id,
            namespace: namespace.to_string(),
        };
        self.partitions
            .read()
            .get(&pkey)
            .map(|p| p.entries.len())
            .unwrap_or(0)
    }

    pub fn total_size(&self, service_id: u64, namespace: &str) -> usize {
        let pkey = PartitionKey {
            service_id,
            namespace: namespace.to_string(),
        };
        self.partitions
            .read()
            .get(&pkey)
            .map(|p| p.entries.values().map(|e| e.size).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;

    #[test]
    fn eviction_drops_least_recently_used_when_no_handle_outstanding() {
        let cache = ServiceCache::new(2);
        cache.put(1, "ns", "a", Arc::new(1i32), 4, None);
        cache.put(1, "ns", "b", Arc::new(2i32), 4, None);
        cache.put(1, "ns", "c", Arc::new(3i32), 4, None);
        assert_eq!(cache.len(1, "ns"), 2);
        assert!(cache.get(1, "ns", "a").is_none());
        assert!(cache.get(1, "ns", "b").is_some());
        assert!(cache.get(1, "ns", "c").is_some());
    }

    #[test]
    fn destructor_is_deferred_until_outstanding_handle_closes() {
        let ran = Arc::new(Counter::new(0));
        let ran2 = ran.clone();
        let cache = ServiceCache::new(1);
        cache.put(
            1,
            "ns",
            "a",
            Arc::new(1i32),
            4,
            Some(Arc::new(move || {
                ran2.fetch_add(1, Ordering::SeqCst);
            })),
        );
        let handle = cache.get(1, "ns", "a").unwrap();
        cache.put(1, "ns", "b", Arc::new(2i32), 4, None);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn purge_service_invalidates_its_whole_partition() {
        let cache = ServiceCache::new(4);
        cache.put(1, "ns", "a", Arc::new(1i32), 4, None);
        cache.put(1, "ns", "b", Arc::new(2i32), 4, None);
        cache.purge_service(1);
        assert_eq!(cache.len(1, "ns"), 0);
    }

    #[test]
    fn get_returns_typed_value() {
        let cache = ServiceCache::new(4);
        cache.put(1, "ns", "a", Arc::new(String::from("hello")), 5, None);
        let handle = cache.get(1, "ns", "a").unwrap();
        assert_eq!(handle.get::<String>().unwrap(), "hello");
    }
}
