//! Concurrent key/value store with per-entry expiry.

use dashmap::DashMap;
use derive_getters::Getters;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Cache entry with value and expiration.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Option<Duration>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry is expired.
    pub fn is_expired(&self) -> bool {
        self.ttl
            .is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }

    /// Get remaining time until expiration, `None` for entries that never expire.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.ttl
            .map(|ttl| ttl.saturating_sub(self.created_at.elapsed()))
    }
}

/// Key/value store whose entries may expire.
///
/// Expired entries are invisible to readers as soon as their TTL passes; they are
/// physically removed lazily on read or in bulk by [`purge_expired`](Self::purge_expired).
/// Time is measured with `tokio::time::Instant`, so paused-clock tests can advance it.
///
/// # Example
///
/// ```
/// use portgate_cache::TtlCache;
/// use std::time::Duration;
///
/// let cache: TtlCache<String, u32> = TtlCache::new(None);
/// cache.insert("drive".to_string(), 7);
/// assert_eq!(cache.get("drive"), Some(7));
///
/// cache.insert_with_ttl("gmail".to_string(), 1, Some(Duration::ZERO));
/// assert!(!cache.contains("gmail"));
/// ```
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    default_ttl: Option<Duration>,
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty store whose entries expire after `default_ttl`, if set.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            default_ttl,
            entries: DashMap::new(),
        }
    }

    /// TTL applied by [`insert`](Self::insert).
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Insert or overwrite a value using the default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite a value with an explicit TTL (`None` never expires).
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// True when a live entry exists for `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Remove an entry, returning its value if it was still live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries
            .remove(key)
            .and_then(|(_, entry)| (!entry.is_expired()).then_some(entry.value))
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = !entry.is_expired();
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Clone out a live value.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }
        // The read guard must be gone before taking the shard's write lock.
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    /// Clone out a live entry along with its timing metadata.
    pub fn entry<Q>(&self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| (*entry).clone())
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new(None)
    }
}
