//! Response records on top of a byte-blob [`EntryStore`].

use std::sync::Arc;

use thiserror::Error;

use super::record::{RecordError, ResponseRecord};
use crate::store::{EntryStore, StoreError};

/// Errors from [`RecordStore`] operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record is stored under the key.
    #[error("cache entry not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => StorageError::NotFound,
            other => StorageError::Store(other),
        }
    }
}

/// Encodes records before they enter the store and decodes them on the way
/// out.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn EntryStore>,
}

impl RecordStore {
    pub fn new(store: Arc<dyn EntryStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying blob store.
    pub fn entries(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    pub fn get(&self, key: &str) -> Result<ResponseRecord, StorageError> {
        let blob = self.store.get(key)?;
        Ok(ResponseRecord::decode(&blob)?)
    }

    pub fn set(&self, key: &str, record: &ResponseRecord) -> Result<(), StorageError> {
        let blob = record.encode()?;
        self.store.set(key, blob)?;
        Ok(())
    }

    /// Folds `chunk` into the record stored under `key`, creating the record
    /// if there is none.
    ///
    /// This is a plain get-modify-set: two callers appending to the same key
    /// at the same time can interleave and lose or mix bytes.
    pub fn append(&self, key: &str, chunk: ResponseRecord) -> Result<(), StorageError> {
        match self.get(key) {
            Ok(mut cached) => {
                cached.absorb(chunk);
                self.set(key, &cached)
            }
            Err(StorageError::NotFound) => self.set(key, &chunk),
            Err(err) => Err(err),
        }
    }

    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(key)?;
        Ok(())
    }
}
