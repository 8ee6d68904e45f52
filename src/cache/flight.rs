//! Per-key locks for serializing cache-miss executions.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

/// Lazily created mutex per cache key.
///
/// Entries are dropped again once no caller holds or waits on them, so the
/// map only grows with the number of keys in flight.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `key`.
    pub(crate) fn run<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(&self.locks.entry(key.to_owned()).or_default());
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
