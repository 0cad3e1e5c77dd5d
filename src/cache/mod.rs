//! Time-bounded key/value cache sitting in front of the persistent store.
//!
//! Expiry is lazy: an expired entry reads as absent and is removed by the read that
//! notices it. [`Cache::purge_expired`] reclaims entries nobody reads again. There is no
//! capacity bound; the key space is the set of live entities.
//!
//! The cache knows nothing about aliases. Keeping every alias of an entity in step is the
//! job of the repositories in [`crate::repository`].

pub mod key;

use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

pub use key::{CacheKey, CachedEntity};

/// The cache shared by the user and task repositories.
pub type EntityCache = Cache<CacheKey, CachedEntity>;

struct CacheEntry<V> {
    value: V,
    /// `None` when `now + ttl` is not representable; such entries never expire.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

pub struct Cache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns a copy of the live value under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        // the read guard is released; drop the stale entry unless a writer replaced it
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// Overwrites `key` unconditionally, expiring `ttl` from now.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now().checked_add(ttl);
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    pub fn set_default(&self, key: K, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Removes `key` if present.
    pub fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
