//! LRU Cache implementation.
//!
//! A sharded, reference-counted LRU cache. Lookups and inserts hand out
//! [`CacheHandle`]s; an entry is only destroyed once it has left the cache
//! *and* every handle referencing it has been dropped.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Statistics for cache operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: AtomicU64,
    /// Number of cache misses.
    pub misses: AtomicU64,
    /// Number of insertions.
    pub inserts: AtomicU64,
    /// Number of evictions due to capacity pressure.
    pub evictions: AtomicU64,
    /// Number of handles currently alive.
    pub outstanding: AtomicU64,
}

impl CacheStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset the hit/miss/insert/eviction counters.
    ///
    /// The outstanding handle count tracks live objects and is left alone.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits.load(Ordering::Relaxed)),
            misses: AtomicU64::new(self.misses.load(Ordering::Relaxed)),
            inserts: AtomicU64::new(self.inserts.load(Ordering::Relaxed)),
            evictions: AtomicU64::new(self.evictions.load(Ordering::Relaxed)),
            outstanding: AtomicU64::new(self.outstanding.load(Ordering::Relaxed)),
        }
    }
}

/// Shared payload of a cache entry.
struct LruEntry<V> {
    value: V,
    charge: usize,
}

/// A reference to a cached value.
///
/// Holding a handle pins the entry: it will not be destroyed, even if it is
/// erased or evicted from the cache, until the handle is dropped. Dropping
/// the handle is the release operation. Handles do not borrow the cache, so
/// they may outlive it.
pub struct CacheHandle<V> {
    entry: Arc<LruEntry<V>>,
    stats: Arc<CacheStats>,
}

impl<V> CacheHandle<V> {
    fn new(entry: Arc<LruEntry<V>>, stats: Arc<CacheStats>) -> Self {
        stats.outstanding.fetch_add(1, Ordering::Relaxed);
        Self { entry, stats }
    }

    /// Access the cached value.
    pub fn value(&self) -> &V {
        &self.entry.value
    }

    /// Charge the entry was inserted with.
    pub fn charge(&self) -> usize {
        self.entry.charge
    }
}

impl<V> Deref for CacheHandle<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.entry.value
    }
}

impl<V> Drop for CacheHandle<V> {
    fn drop(&mut self) {
        self.stats.outstanding.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<V: fmt::Debug> fmt::Debug for CacheHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("value", &self.entry.value)
            .field("charge", &self.entry.charge)
            .finish()
    }
}

/// A node in the LRU linked list.
struct LruNode<K, V> {
    key: K,
    entry: Arc<LruEntry<V>>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A single shard of the LRU cache.
struct LruShard<K, V> {
    /// Total charge this shard may hold.
    capacity: usize,
    /// Sum of charges of indexed entries.
    usage: usize,
    /// Map from key to node index.
    map: HashMap<K, usize>,
    /// Node storage (using indices instead of pointers).
    nodes: Vec<Option<LruNode<K, V>>>,
    /// Free list of node indices.
    free_list: Vec<usize>,
    /// Head of LRU list (most recently used).
    head: Option<usize>,
    /// Tail of LRU list (least recently used).
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V> LruShard<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            usage: 0,
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn lookup(&mut self, key: &K) -> Option<Arc<LruEntry<V>>> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|n| Arc::clone(&n.entry))
    }

    /// Insert an entry, returning how many entries were evicted to make room.
    fn insert(&mut self, key: K, entry: Arc<LruEntry<V>>) -> usize {
        // An existing entry under the same key leaves the index; handles
        // already issued for it keep it alive.
        self.remove(&key);

        self.usage += entry.charge;
        let idx = self.allocate_node();
        self.nodes[idx] = Some(LruNode {
            key: key.clone(),
            entry,
            prev: None,
            next: self.head,
        });

        if let Some(head_idx) = self.head {
            if let Some(ref mut head_node) = self.nodes[head_idx] {
                head_node.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.map.insert(key, idx);

        let mut evicted = 0;
        while self.usage > self.capacity {
            if !self.evict_lru(idx) {
                break;
            }
            evicted += 1;
        }
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<Arc<LruEntry<V>>> {
        let idx = self.map.remove(key)?;
        let entry = self.unlink_node(idx);
        self.free_list.push(idx);
        if let Some(ref e) = entry {
            self.usage -= e.charge;
        }
        entry
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.usage = 0;
    }

    fn allocate_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        if let Some(prev_idx) = prev {
            if let Some(ref mut prev_node) = self.nodes[prev_idx] {
                prev_node.next = next;
            }
        }

        if let Some(next_idx) = next {
            if let Some(ref mut next_node) = self.nodes[next_idx] {
                next_node.prev = prev;
            }
        }

        if self.tail == Some(idx) {
            self.tail = prev;
        }

        if let Some(ref mut node) = self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(ref mut head_node) = self.nodes[head_idx] {
                head_node.prev = Some(idx);
            }
        }

        self.head = Some(idx);
    }

    /// Evict the least recently used entry that no handle is holding.
    ///
    /// `keep` is never evicted. Returns false if nothing was evictable.
    fn evict_lru(&mut self, keep: usize) -> bool {
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            let (pinned, prev, key) = match self.nodes[idx].as_ref() {
                Some(node) => (
                    Arc::strong_count(&node.entry) > 1,
                    node.prev,
                    node.key.clone(),
                ),
                None => return false,
            };
            if idx != keep && !pinned {
                self.remove(&key);
                return true;
            }
            cursor = prev;
        }
        false
    }

    fn unlink_node(&mut self, idx: usize) -> Option<Arc<LruEntry<V>>> {
        let (prev, next, entry) = {
            let node = self.nodes[idx].take()?;
            (node.prev, node.next, node.entry)
        };

        if let Some(prev_idx) = prev {
            if let Some(ref mut prev_node) = self.nodes[prev_idx] {
                prev_node.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_idx) = next {
            if let Some(ref mut next_node) = self.nodes[next_idx] {
                next_node.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        Some(entry)
    }
}

/// Number of shards for the cache.
const NUM_SHARDS: usize = 16;

/// A sharded, reference-counted LRU cache for concurrent access.
///
/// The cache is divided into multiple shards to reduce lock contention.
/// Each shard has its own LRU list and can be accessed independently.
/// Capacity is measured in charge units; most callers insert with a
/// charge of 1 so capacity is simply an entry count.
///
/// Values are never cloned: callers receive a [`CacheHandle`] that pins
/// the entry. Erase and eviction only drop the cache's own reference, so
/// the value's `Drop` runs exactly once, after the last handle is gone.
pub struct LruCache<K, V> {
    shards: Vec<Mutex<LruShard<K, V>>>,
    stats: Arc<CacheStats>,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create a new cache with the given capacity.
    ///
    /// The capacity is divided among the shards.
    pub fn new(capacity: usize) -> Self {
        let shard_capacity = (capacity + NUM_SHARDS - 1) / NUM_SHARDS;
        let shards = (0..NUM_SHARDS)
            .map(|_| Mutex::new(LruShard::new(shard_capacity)))
            .collect();

        Self {
            shards,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Look up a key, returning a handle if present.
    pub fn lookup(&self, key: &K) -> Option<CacheHandle<V>> {
        let entry = self.shards[self.shard_index(key)].lock().lookup(key);

        match entry {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(CacheHandle::new(entry, Arc::clone(&self.stats)))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a value and return a handle to it.
    ///
    /// Any entry already cached under `key` is displaced; it stays alive
    /// for as long as handles to it exist.
    pub fn insert(&self, key: K, value: V, charge: usize) -> CacheHandle<V> {
        let entry = Arc::new(LruEntry { value, charge });
        // Create the handle before the entry becomes visible to eviction.
        let handle = CacheHandle::new(Arc::clone(&entry), Arc::clone(&self.stats));

        let evicted = {
            let mut shard = self.shards[self.shard_index(&key)].lock();
            shard.insert(key, entry)
        };

        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.stats
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }

        handle
    }

    /// Release a handle.
    ///
    /// Equivalent to dropping it.
    pub fn release(&self, handle: CacheHandle<V>) {
        drop(handle);
    }

    /// Remove a key from the cache.
    ///
    /// Outstanding handles stay valid. Returns true if the key was present.
    pub fn erase(&self, key: &K) -> bool {
        // Bind the removed entry so its possible destruction happens after
        // the shard lock is released.
        let removed = self.shards[self.shard_index(key)].lock().remove(key);
        removed.is_some()
    }

    /// Get the total number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the charges of all indexed entries.
    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|s| s.lock().usage).sum()
    }

    /// Number of handles currently alive.
    pub fn outstanding_handles(&self) -> u64 {
        self.stats.outstanding.load(Ordering::Relaxed)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Clear all entries from the cache.
    ///
    /// Entries pinned by handles are destroyed when those handles drop.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }

    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize % NUM_SHARDS
    }
}
