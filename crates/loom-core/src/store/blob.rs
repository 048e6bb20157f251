//! `BlobStore` (C1): content-addressed byte blobs keyed by a 32-byte SHA-256
//! hash (§4.1). The trait is storage-agnostic; `loom-sqlite::blob` is the
//! only implementation in this workspace, but tests can exercise the
//! scheduler/consumer against a trivial in-memory fake without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::StoreError;

pub trait BlobStore: Send + Sync {
    /// Stores a single blob. Idempotent: storing the same hash twice is a
    /// no-op from the caller's perspective.
    fn put(&self, hash: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Atomic group write: either every key in `items` becomes visible, or
    /// none does.
    fn put_batch(&self, items: &[(String, Vec<u8>)]) -> Result<(), StoreError>;

    /// Returns the blob's bytes, or `StoreError::NotFound`.
    fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError>;

    /// Batched fetch; any missing hash fails the whole call (§4.1).
    fn get_batch(&self, hashes: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError>;

    fn exists(&self, hash: &str) -> Result<bool, StoreError>;
}

/// An in-memory `BlobStore`, useful for unit tests of `loom-exec`/
/// `loom-driver` that should not need a real SQLite file.
#[derive(Default)]
pub struct InMemoryBlobStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.inner.lock().expect("blob store mutex poisoned")
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, hash: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.lock().insert(hash.to_string(), bytes.to_vec());
        Ok(())
    }

    fn put_batch(&self, items: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        let mut guard = self.lock();
        for (hash, bytes) in items {
            guard.insert(hash.clone(), bytes.clone());
        }
        Ok(())
    }

    fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        self.lock().get(hash).cloned().ok_or_else(|| StoreError::NotFound(hash.to_string()))
    }

    fn get_batch(&self, hashes: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let guard = self.lock();
        let mut out = HashMap::with_capacity(hashes.len());
        for hash in hashes {
            let bytes = guard.get(hash).cloned().ok_or_else(|| StoreError::NotFound(hash.clone()))?;
            out.insert(hash.clone(), bytes);
        }
        Ok(out)
    }

    fn exists(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.lock().contains_key(hash))
    }
}
