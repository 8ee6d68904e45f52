//! Entry stores: string keys mapped to opaque byte blobs with expiry.
//!
//! The response cache only needs three operations from a store, captured by
//! [`EntryStore`]. Expiry and eviction are entirely the store's business; a
//! key whose entry has expired must simply report [`StoreError::NotFound`].
//!
//! Stores are shared by every in-flight request and must do their own
//! locking. No operation here is atomic with respect to another: a
//! `get` followed by a `set` may interleave with other callers.

use std::error::Error as StdError;

use bytes::Bytes;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Errors reported by an [`EntryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live entry exists for the key. Expected on every cache miss.
    #[error("entry not found")]
    NotFound,

    /// Any other failure of the underlying store.
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

impl StoreError {
    /// Wraps an arbitrary error as a [`StoreError::Backend`].
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        StoreError::Backend(err.into())
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key/blob storage consumed by the response cache.
///
/// Implementations must be safe to call from many threads at once.
pub trait EntryStore: Send + Sync {
    /// Returns the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when there is no live entry; anything else for
    /// store faults.
    fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Stores `value` under `key`, replacing any existing entry.
    fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Removes the entry for `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when there was nothing to remove.
    fn delete(&self, key: &str) -> StoreResult<()>;
}
