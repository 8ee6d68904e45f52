//! In-process [`EntryStore`] backed by Moka.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache;

use super::{EntryStore, StoreError, StoreResult};

/// Concurrent in-memory store with a fixed time-to-live per entry.
///
/// Entries expire `ttl` after they were last written; an expired entry reads
/// as [`StoreError::NotFound`] even before Moka's housekeeping reclaims it.
/// When `max_capacity` entries are held, Moka evicts by its own
/// frequency/recency policy.
///
/// Data lives only as long as the process and is not shared between
/// processes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pagecache::store::{EntryStore, MemoryStore};
///
/// let store = MemoryStore::new(Duration::from_secs(60), 1_000);
/// store.set("k", "v".into()).unwrap();
/// assert_eq!(store.get("k").unwrap(), "v");
/// assert!(store.get("other").unwrap_err().is_not_found());
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, Bytes>,
    ttl: Duration,
}

impl MemoryStore {
    /// Creates a store holding at most `max_capacity` entries for `ttl` each.
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    /// Returns the time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns an approximate count of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("ttl", &self.ttl)
            .field("cache", &self.cache)
            .finish()
    }
}

impl EntryStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.cache.get(key).ok_or(StoreError::NotFound)
    }

    fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.cache.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        match self.cache.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }
}
