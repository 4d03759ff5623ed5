//! LruCache: capacity-bounded map with least-recently-used eviction

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use ahash::RandomState;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::list::{NodeHandle, RecencyList};
use crate::stats::CacheStats;

/// Upper bound on slots reserved up front; larger caches grow on demand
const MAX_PREALLOC: usize = 1 << 16;

/// Key/value pair stored in a list node
struct Entry<K, V> {
    key: K,
    value: V,
}

/// Everything the lock protects. Index and list are only ever touched together.
struct State<K, V, S> {
    list: RecencyList<Entry<K, V>>,
    index: HashMap<K, NodeHandle, S>,
}

/// Thread-safe LRU cache with a fixed capacity
///
/// Every operation runs as one critical section under a single mutex, so
/// concurrent calls behave as if executed in some sequential order and the
/// recency order reflects exactly that order. `get` reorders the list, which
/// is why a plain mutex is used instead of a reader/writer lock.
pub struct LruCache<K, V, S = RandomState> {
    /// Recency list and key index
    state: Mutex<State<K, V, S>>,

    /// Cache statistics
    stats: CacheStats,

    /// Maximum number of entries
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new cache holding at most `capacity` entries
    ///
    /// # Returns
    /// * `Err(Error::ZeroCapacity)` if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(Error::ZeroCapacity)?;
        Ok(Self::with_capacity(capacity))
    }

    /// Create a new cache with a capacity that is known to be valid
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> LruCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Create a new cache using `hasher` for the key index
    pub fn with_hasher(capacity: NonZeroUsize, hasher: S) -> Self {
        let capacity = capacity.get();
        let reserve = capacity.min(MAX_PREALLOC);
        debug!(capacity, "creating LRU cache");

        Self {
            state: Mutex::new(State {
                list: RecencyList::with_capacity(reserve),
                index: HashMap::with_capacity_and_hasher(reserve, hasher),
            }),
            stats: CacheStats::new(),
            capacity,
        }
    }

    /// Insert or update a value, marking it most recently used
    ///
    /// If the key is new and the cache is full, the least recently used
    /// entry is evicted first.
    ///
    /// # Returns
    /// * `true` if the key was already present (value replaced in place)
    pub fn set(&self, key: K, value: V) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(&handle) = state.index.get(&key) {
            if let Some(entry) = state.list.get_mut(handle) {
                entry.value = value;
            }
            state.list.move_to_front(handle);
            self.stats.record_update();
            return true;
        }

        if state.list.len() == self.capacity {
            if let Some(evicted) = state.list.back().and_then(|tail| state.list.remove(tail)) {
                state.index.remove(&evicted.key);
                self.stats.record_eviction();
                trace!(capacity = self.capacity, "evicted least recently used entry");
            }
        }

        let handle = state.list.push_front(Entry {
            key: key.clone(),
            value,
        });
        state.index.insert(key, handle);
        self.stats.record_insert();

        debug_assert_eq!(state.index.len(), state.list.len());
        debug_assert!(state.list.len() <= self.capacity);
        false
    }

    /// Look up a value, marking it most recently used on a hit
    ///
    /// Returns a clone of the stored value; the entry stays in the cache.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.index.get(key) {
            Some(&handle) => {
                state.list.move_to_front(handle);
                self.stats.record_hit();
                state.list.get(handle).map(|entry| entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Drop every entry. Capacity is unchanged.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.list.len();
        state.list.clear();
        state.index.clear();
        self.stats.record_clear();
        debug!(dropped, "cleared LRU cache");
    }

    /// Get current number of entries
    pub fn len(&self) -> usize {
        self.state.lock().list.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().list.is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Keys from most to least recently used
    #[cfg(test)]
    pub(crate) fn keys_by_recency(&self) -> Vec<K> {
        let state = self.state.lock();
        state.list.iter().map(|entry| entry.key.clone()).collect()
    }

    /// Check that index and list describe the same set of nodes
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let state = self.state.lock();
        state.list.assert_invariants();
        assert_eq!(state.index.len(), state.list.len());
        assert!(state.list.len() <= self.capacity);
        for (key, &handle) in &state.index {
            let entry = state.list.get(handle).expect("index points at freed node");
            assert!(entry.key == *key, "index points at node of another key");
        }
    }
}

impl<K, V, S> fmt::Debug for LruCache<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.state.lock().list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_empty() {
        let cache: LruCache<String, i32> = LruCache::new(10).unwrap();

        assert_eq!(cache.get("aaa"), None);
        assert_eq!(cache.get("bbb"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 10);
    }

    #[test]
    fn test_cache_simple() {
        let cache = LruCache::new(5).unwrap();

        assert!(!cache.set("aaa".to_string(), 100));
        assert!(!cache.set("bbb".to_string(), 200));

        assert_eq!(cache.get("aaa"), Some(100));
        assert_eq!(cache.get("bbb"), Some(200));

        assert!(cache.set("aaa".to_string(), 300));
        assert_eq!(cache.get("aaa"), Some(300));

        assert_eq!(cache.get("ccc"), None);
        cache.assert_invariants();
    }

    #[test]
    fn test_cache_zero_capacity() {
        let result = LruCache::<String, i32>::new(0);
        assert_eq!(result.unwrap_err(), Error::ZeroCapacity);
    }

    #[test]
    fn test_cache_overflow_single() {
        let cache = LruCache::new(1).unwrap();

        cache.set("aaa", 300);
        cache.set("aab", 302);

        assert_eq!(cache.get("aaa"), None);
        assert_eq!(cache.get("aab"), Some(302));
        assert_eq!(cache.len(), 1);
        cache.assert_invariants();
    }

    #[test]
    fn test_cache_eviction_order() {
        let cache = LruCache::new(3).unwrap();

        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(3, "c");
        cache.set(4, "d"); // Should evict 1

        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some("b"));
        assert_eq!(cache.get(&3), Some("c"));
        assert_eq!(cache.get(&4), Some("d"));
        assert_eq!(cache.stats().evictions(), 1);
        cache.assert_invariants();
    }

    #[test]
    fn test_cache_get_promotes() {
        let cache = LruCache::new(2).unwrap();

        cache.set(1, "a");
        cache.set(2, "b");
        cache.get(&1); // Move 1 to front
        cache.set(3, "c"); // Should evict 2

        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some("c"));
    }

    #[test]
    fn test_cache_set_promotes() {
        let cache = LruCache::new(3).unwrap();

        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(3, "c");
        cache.set(1, "a2"); // Update moves 1 to front
        cache.set(4, "d"); // Should evict 2

        assert_eq!(cache.keys_by_recency(), vec![4, 1, 3]);
        assert_eq!(cache.get(&1), Some("a2"));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = LruCache::new(10).unwrap();

        assert!(!cache.set("aaa", 300));
        assert!(cache.set("aaa", 301));

        assert_eq!(cache.get("aaa"), Some(301));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().inserts(), 1);
        assert_eq!(cache.stats().updates(), 1);
    }

    #[test]
    fn test_cache_overwrite_when_full() {
        let cache = LruCache::new(2).unwrap();

        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.set("a", 10)); // Full, but no eviction for existing key

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.stats().evictions(), 0);
    }

    #[test]
    fn test_cache_clear() {
        let cache = LruCache::new(10).unwrap();

        cache.set("aaa", 300);
        cache.set("bbb", 301);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("aaa"), None);
        assert_eq!(cache.get("bbb"), None);
        assert_eq!(cache.capacity(), 10);
        cache.assert_invariants();

        // Usable after clear
        assert!(!cache.set("aaa", 1));
        assert_eq!(cache.get("aaa"), Some(1));
    }

    #[test]
    fn test_cache_clear_empty() {
        let cache: LruCache<&str, i32> = LruCache::new(3).unwrap();

        cache.clear();
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().clears(), 2);
        cache.assert_invariants();
    }

    #[test]
    fn test_cache_symbol_keys() {
        let cache = LruCache::new(10).unwrap();

        cache.set("$", 300);
        cache.set("^", 302);

        assert_eq!(cache.get("$"), Some(300));
        assert_eq!(cache.get("^"), Some(302));
    }

    #[test]
    fn test_cache_none_value() {
        let cache: LruCache<&str, Option<i32>> = LruCache::new(10).unwrap();

        cache.set("aaa", None);

        // Present without a value
        assert_eq!(cache.get("aaa"), Some(None));
        // Genuine miss
        assert_eq!(cache.get("bbb"), None);
    }

    #[test]
    fn test_cache_stats() {
        let cache = LruCache::new(2).unwrap();

        cache.set(1, 1);
        cache.set(2, 2);
        cache.get(&1); // hit
        cache.get(&9); // miss
        cache.set(3, 3); // evicts 2
        cache.get(&2); // miss

        let snap = cache.stats().snapshot();
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 2);
        assert_eq!(snap.inserts, 3);
        assert_eq!(snap.evictions, 1);
    }

    #[test]
    fn test_cache_capacity_invariant() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(7);
        let cache = LruCache::new(8).unwrap();

        for i in 0..5000u32 {
            let key = rng.gen_range(0..32u32);
            match rng.gen_range(0..10) {
                0..=5 => {
                    cache.set(key, i);
                    assert_eq!(cache.keys_by_recency()[0], key);
                }
                6..=8 => {
                    if cache.get(&key).is_some() {
                        assert_eq!(cache.keys_by_recency()[0], key);
                    }
                }
                _ => cache.clear(),
            }
            assert!(cache.len() <= cache.capacity());
        }

        cache.assert_invariants();
    }

    #[test]
    fn test_cache_custom_hasher() {
        use std::collections::hash_map::RandomState as StdState;

        let cache = LruCache::with_hasher(NonZeroUsize::new(2).unwrap(), StdState::new());
        cache.set("a", 1);

        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_cache_debug() {
        let cache = LruCache::new(4).unwrap();
        cache.set("a", 1);

        assert_eq!(format!("{:?}", cache), "LruCache { capacity: 4, len: 1 }");
    }
}
