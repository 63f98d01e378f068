//! Fixed-capacity LRU cache.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use super::CacheConfig;

/// A thread-safe cache holding at most `capacity` entries.
///
/// Eviction is purely capacity driven: once a `put` pushes the number of
/// distinct keys past the capacity, the least recently inserted or accessed
/// key is dropped. A hit on `get` counts as a fresh access.
///
/// The cache is lossy. A miss means "unknown", never "does not exist".
///
/// Cloning is cheap and shares the same underlying storage.
pub struct BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `None` when caching is disabled (capacity zero).
    inner: Arc<Mutex<Option<LruCache<K, V>>>>,
    inflight: Arc<DashMap<K, Arc<Mutex<()>>>>,
    name: Arc<str>,
}

impl<K, V> Clone for BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            inflight: Arc::clone(&self.inflight),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NonZeroUsize::new(config.max_capacity).map(LruCache::new))),
            inflight: Arc::new(DashMap::new()),
            name: name.into(),
        }
    }

    /// Get the name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, |lru| lru.cap().get())
    }

    /// Whether this cache stores anything (capacity above zero).
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Insert or replace a value, evicting the least recently used entry
    /// if the cache overflows. A no-op when caching is disabled.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let Some(lru) = inner.as_mut() else {
            return;
        };
        let inserted = key.clone();
        if let Some((old_key, _)) = lru.push(key, value)
            && old_key != inserted
        {
            trace!(cache = %self.name, "evicted least recently used entry");
        }
    }

    /// Get a value from the cache, refreshing its recency on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().as_mut()?.get(key).cloned()
    }

    /// Get a value without touching its recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().as_ref()?.peek(key).cloned()
    }

    /// Check if a key is resident. Does not refresh recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().as_ref().is_some_and(|lru| lru.contains(key))
    }

    /// Remove a key from the cache.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.inner.lock().as_mut()?.pop(key)
    }

    /// Remove all entries from the cache.
    pub fn invalidate_all(&self) {
        if let Some(lru) = self.inner.lock().as_mut() {
            lru.clear();
        }
    }

    /// Get the number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` while holding the in-flight gate for `key`.
    fn with_gate<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let gate: Arc<Mutex<()>> = self.inflight.entry(key.clone()).or_default().value().clone();
        let result = {
            let _guard = gate.lock();
            f()
        };
        drop(gate);
        self.inflight
            .remove_if(key, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    /// Get or try to insert a value using a fallible closure.
    ///
    /// Concurrent callers that miss on the same key are serialized, so `init`
    /// runs at most once per key while a value for it is being computed. The
    /// serialization holds even with caching disabled, in which case `init`
    /// itself must find what an earlier caller produced.
    ///
    /// Returns `Err(e)` if the closure fails; nothing is cached in that case.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        self.with_gate(&key, || match self.get(&key) {
            Some(value) => Ok(value),
            None => init().map(|value| {
                self.put(key.clone(), value.clone());
                value
            }),
        })
    }

    /// Remove a key after any in-flight `get_or_try_insert_with` for it has
    /// finished, so a value computed from older data cannot land afterwards.
    pub fn invalidate_settled(&self, key: &K) -> Option<V> {
        self.with_gate(key, || self.invalidate(key))
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(capacity: usize) -> BoundedCache<u64, &'static str> {
        BoundedCache::new("test", CacheConfig::with_capacity(capacity))
    }

    #[test]
    fn test_overflow_evicts_least_recently_inserted() {
        let cache = cache(3);
        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");
        cache.put(4, "d");

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2) && cache.contains(&3) && cache.contains(&4));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = cache(3);
        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");

        assert_eq!(cache.get(&1), Some("a"));
        cache.put(4, "d");

        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let cache = cache(2);
        cache.put(1, "a");
        cache.put(2, "b");

        assert_eq!(cache.peek(&1), Some("a"));
        cache.put(3, "c");

        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_replace_keeps_single_entry() {
        let cache = cache(2);
        cache.put(1, "a");
        cache.put(1, "b");
        cache.put(2, "c");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some("b"));
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let cache = cache(0);
        cache.put(1, "a");

        assert!(!cache.is_enabled());
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_heavy_access_keeps_hot_key_resident() {
        let cache = cache(2);
        cache.put(1, "a");
        cache.put(2, "b");
        for _ in 0..1_000 {
            cache.get(&1);
        }
        cache.put(3, "c");

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn test_invalidate_then_overflow() {
        let cache = cache(2);
        cache.put(1, "a");
        cache.put(2, "b");
        assert_eq!(cache.invalidate(&1), Some("a"));
        cache.put(3, "c");

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&2) && cache.contains(&3));
    }

    #[test]
    fn test_get_or_try_insert_runs_init_once_under_contention() {
        for capacity in [0, 4] {
            let cache = cache(capacity);
            let created = AtomicUsize::new(0);
            let seen = Mutex::new(None::<&'static str>);

            std::thread::scope(|scope| {
                for _ in 0..16 {
                    scope.spawn(|| {
                        let value = cache
                            .get_or_try_insert_with(7, || {
                                // With caching disabled, the persisted marker stands in for
                                // the backend lookup that would find the first creation.
                                let mut seen = seen.lock();
                                if let Some(existing) = *seen {
                                    return Ok::<_, ()>(existing);
                                }
                                created.fetch_add(1, Ordering::SeqCst);
                                *seen = Some("created");
                                Ok("created")
                            })
                            .unwrap();
                        assert_eq!(value, "created");
                    });
                }
            });

            assert_eq!(created.load(Ordering::SeqCst), 1);
            assert!(cache.inflight.is_empty());
        }
    }

    #[test]
    fn test_invalidate_settled_waits_for_inflight_insert() {
        use std::sync::mpsc;
        use std::time::Duration;

        let cache = cache(4);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        std::thread::scope(|scope| {
            let loader = &cache;
            scope.spawn(move || {
                loader
                    .get_or_try_insert_with(1, || {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok::<_, ()>("stale")
                    })
                    .unwrap();
            });
            started_rx.recv().unwrap();

            let invalidator = scope.spawn(|| cache.invalidate_settled(&1));
            std::thread::sleep(Duration::from_millis(50));
            release_tx.send(()).unwrap();

            assert_eq!(invalidator.join().unwrap(), Some("stale"));
        });

        assert!(!cache.contains(&1));
        assert!(cache.inflight.is_empty());
    }

    #[test]
    fn test_get_or_try_insert_does_not_cache_errors() {
        let cache = cache(2);
        let result: Result<&str, &str> = cache.get_or_try_insert_with(1, || Err("boom"));

        assert_eq!(result, Err("boom"));
        assert!(!cache.contains(&1));
    }
}
