//! Session cache implementation
//!
//! An explicit, in-memory memo table scoped to one command invocation. It is
//! passed to the operations that use it; nothing is global or thread-local.

use super::types::{CacheEntry, CacheKey};
use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

/// Per-key storage: the value, plus a lock serializing blocking initializers
struct Slot<V> {
    cell: OnceCell<CacheEntry<V>>,
    init: Mutex<()>,
}

impl<V> Slot<V> {
    fn empty() -> Self {
        Self {
            cell: OnceCell::new(),
            init: Mutex::new(()),
        }
    }

    fn filled(entry: CacheEntry<V>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(entry)),
            init: Mutex::new(()),
        }
    }
}

/// In-memory cache for one invocation
///
/// While enabled, a factory runs at most once per key and its successful
/// result is reused; failures are returned and not stored. While disabled,
/// every lookup calls the factory and nothing is kept.
pub struct SessionCache<V> {
    enabled: AtomicBool,
    entries: Mutex<HashMap<CacheKey, Arc<Slot<V>>>>,
}

impl<V: Clone> SessionCache<V> {
    /// Create a cache, enabled or not
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a cache following a caller's `use_cache` switch
    pub fn with_cache(use_cache: bool) -> Self {
        Self::new(use_cache)
    }

    /// Run `f` with a fresh cache that is cleared when `f` returns
    pub fn scope<T, F>(use_cache: bool, f: F) -> T
    where
        F: FnOnce(&SessionCache<V>) -> T,
    {
        let cache = Self::new(use_cache);
        f(&cache)
    }

    /// Return the cached value for `key`, computing it with `factory` on a miss
    pub fn get<F>(&self, key: CacheKey, factory: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if !self.is_enabled() {
            return factory();
        }

        let slot = self.slot(&key);
        if let Some(entry) = slot.cell.get() {
            debug!("Cache hit: {}", key);
            return Ok(entry.value.clone());
        }

        let _guard = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled it while we waited
        if let Some(entry) = slot.cell.get() {
            debug!("Cache hit: {}", key);
            return Ok(entry.value.clone());
        }

        debug!("Cache miss: {}", key);
        let value = factory()?;
        if slot.cell.set(CacheEntry::new(value.clone())).is_err() {
            debug!("Cache entry for {} was filled concurrently", key);
        }
        Ok(value)
    }

    /// Async form of [`get`](Self::get)
    ///
    /// Concurrent tasks asking for the same key wait for a single factory
    /// call instead of racing.
    pub async fn get_async<F, Fut>(&self, key: CacheKey, factory: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if !self.is_enabled() {
            return factory().await;
        }

        let slot = self.slot(&key);
        if slot.cell.initialized() {
            debug!("Cache hit: {}", key);
        }
        let entry = slot
            .cell
            .get_or_try_init(|| async {
                debug!("Cache miss: {}", key);
                factory().await.map(CacheEntry::new)
            })
            .await?;
        Ok(entry.value.clone())
    }

    /// Store a value, replacing any previous one
    ///
    /// Does nothing while the cache is disabled.
    pub fn set(&self, key: CacheKey, value: V) {
        if !self.is_enabled() {
            return;
        }
        self.lock_entries()
            .insert(key, Arc::new(Slot::filled(CacheEntry::new(value))));
    }

    /// Stored entry for `key`, if any
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.lock_entries()
            .get(key)
            .and_then(|slot| slot.cell.get().cloned())
    }

    /// Whether a value is stored for `key`
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.lock_entries()
            .get(key)
            .is_some_and(|slot| slot.cell.initialized())
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|slot| slot.cell.initialized())
            .count()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored value
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Start caching
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop caching and drop every stored value
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.clear();
    }

    /// Whether caching is on
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn slot(&self, key: &CacheKey) -> Arc<Slot<V>> {
        let mut entries = self.lock_entries();
        Arc::clone(
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Slot::empty())),
        )
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<Slot<V>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for SessionCache<V> {
    fn default() -> Self {
        Self::new(true)
    }
}

impl<V> Drop for SessionCache<V> {
    fn drop(&mut self) {
        let entries = self
            .entries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if !entries.is_empty() {
            debug!("Clearing session cache ({} keys)", entries.len());
            entries.clear();
        }
    }
}

impl<V> std::fmt::Debug for SessionCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("SessionCache")
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .field("keys", &keys)
            .finish()
    }
}
