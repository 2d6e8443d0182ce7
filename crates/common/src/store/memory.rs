use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::provider::{verify_removal, SignedBlob, Store, StoreError};
use crate::crypto::Signature;
use crate::tree::Location;

/// In-memory store keyed by location
///
/// Enforces the same writer-signature policy a remote store would. Also
/// exposes fault injection hooks so tests can lose or corrupt blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    blobs: HashMap<Location, Bytes>,
    /// Count of successful puts, for tests asserting what was written
    puts: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored
    pub fn len(&self) -> usize {
        self.inner.read().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blobs.is_empty()
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.inner.read().blobs.contains_key(location)
    }

    /// Total number of accepted writes since creation
    pub fn put_count(&self) -> u64 {
        self.inner.read().puts
    }

    /// Drop a blob without authorization, simulating loss
    pub fn drop_blob(&self, location: &Location) -> bool {
        self.inner.write().blobs.remove(location).is_some()
    }

    /// Flip a byte in a stored blob, simulating corruption
    pub fn corrupt_blob(&self, location: &Location) -> bool {
        let mut inner = self.inner.write();
        match inner.blobs.get_mut(location) {
            Some(blob) if !blob.is_empty() => {
                let mut bytes = blob.to_vec();
                bytes[0] ^= 0xFF;
                *blob = Bytes::from(bytes);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, location: &Location, blob: SignedBlob) -> Result<(), StoreError> {
        if blob.verify(location).is_err() {
            tracing::warn!("rejecting unsigned write to {}", location);
            return Err(StoreError::Unauthorized(*location));
        }
        let mut inner = self.inner.write();
        inner.blobs.insert(*location, blob.payload);
        inner.puts += 1;
        Ok(())
    }

    async fn get(&self, location: &Location) -> Result<Bytes, StoreError> {
        self.inner
            .read()
            .blobs
            .get(location)
            .cloned()
            .ok_or(StoreError::NotFound(*location))
    }

    async fn remove(&self, location: &Location, signature: &Signature) -> Result<(), StoreError> {
        if verify_removal(location, signature).is_err() {
            tracing::warn!("rejecting unsigned removal of {}", location);
            return Err(StoreError::Unauthorized(*location));
        }
        self.inner.write().blobs.remove(location);
        Ok(())
    }
}
