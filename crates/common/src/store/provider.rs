use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::crypto::{KeyError, SecretKey, Signature};
use crate::tree::Location;

// domain separation for the two kinds of signed store messages
const PUT_TAG: &[u8] = b"capfs/put/v1";
const REMOVE_TAG: &[u8] = b"capfs/remove/v1";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("unhandled store provider error: {0}")]
    Default(#[from] anyhow::Error),
    /// Nothing is stored at this location (never written, or removed)
    #[error("no blob at {0}")]
    NotFound(Location),
    /// The write was not signed by the location's writer
    #[error("unauthorized write to {0}")]
    Unauthorized(Location),
}

/// A payload together with the writer's signature over it and its location
#[derive(Debug, Clone)]
pub struct SignedBlob {
    pub payload: Bytes,
    pub signature: Signature,
}

impl SignedBlob {
    /// Sign `payload` for storage at `location` with the writer's key
    pub fn sign(location: &Location, payload: impl Into<Bytes>, writer: &SecretKey) -> Self {
        let payload = payload.into();
        let signature = writer.sign(&put_message(location, &payload));
        Self { payload, signature }
    }

    /// Check the signature against the location's writer
    pub fn verify(&self, location: &Location) -> Result<(), KeyError> {
        location
            .writer
            .verify(&put_message(location, &self.payload), &self.signature)
    }
}

/// Signature authorizing removal of the record at `location`
pub fn sign_removal(location: &Location, writer: &SecretKey) -> Signature {
    writer.sign(&remove_message(location))
}

/// Check a removal signature against the location's writer
pub fn verify_removal(location: &Location, signature: &Signature) -> Result<(), KeyError> {
    location.writer.verify(&remove_message(location), signature)
}

fn put_message(location: &Location, payload: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(PUT_TAG.len() + 96 + payload.len());
    msg.extend_from_slice(PUT_TAG);
    msg.extend_from_slice(&location.to_bytes());
    msg.extend_from_slice(payload);
    msg
}

fn remove_message(location: &Location) -> Vec<u8> {
    let mut msg = Vec::with_capacity(REMOVE_TAG.len() + 96);
    msg.extend_from_slice(REMOVE_TAG);
    msg.extend_from_slice(&location.to_bytes());
    msg
}

/// Content-addressed, untrusted blob store
///
/// The store never sees plaintext. Its only policy is that writes and
/// removals must be signed by the writer named in the location. Retries,
/// replication and reclamation of unreferenced blobs are its own business.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Store a blob, replacing whatever was at the location
    ///
    /// # Errors
    ///
    /// * `Err(StoreError::Unauthorized)` - the signature does not match `location.writer`
    async fn put(&self, location: &Location, blob: SignedBlob) -> Result<(), StoreError>;

    /// Fetch the blob at a location
    ///
    /// # Errors
    ///
    /// * `Err(StoreError::NotFound)` - nothing stored there
    async fn get(&self, location: &Location) -> Result<Bytes, StoreError>;

    /// Tombstone the blob at a location
    ///
    /// Removing a location that holds nothing is not an error.
    async fn remove(&self, location: &Location, signature: &Signature) -> Result<(), StoreError>;
}
