//! Moving file content in and out of the store
//!
//! Content is read in chunks of [`TreeConfig::chunk_size`](super::TreeConfig)
//! bytes. Each chunk is encrypted under the file key, erasure coded into
//! `data_shards + parity_shards` shards, and every shard is stored at its own
//! random address. The resulting [`ContentManifest`] is what the file's
//! record keeps (encrypted) to find its bytes again.
//!
//! On the way back a shard that is missing, or whose BLAKE3 hash does not
//! match the manifest, is treated as an erasure. A chunk survives as long as
//! no more than `parity_shards` of its shards are gone.

use std::io::Read;

use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};

use erasure::codec::{ErasureCodec, ErasureError};

use crate::crypto::{PublicKey, SecretKey, SymmetricKey, SymmetricKeyError};
use crate::store::{SignedBlob, StoreError};

use super::location::{Address, Location};
use super::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("transfer error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("symmetric key error: {0}")]
    SymmetricKey(#[from] SymmetricKeyError),
    #[error("erasure error: {0}")]
    Erasure(#[from] ErasureError),
    #[error("retrieved {got} bytes, expected {expected}")]
    SizeMismatch { expected: u64, got: u64 },
    #[error("chunk size must be positive")]
    ZeroChunkSize,
}

/// One stored shard of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRef {
    pub location: Location,
    pub hash: [u8; 32],
}

/// The shards making up one encrypted chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub shards: Vec<ShardRef>,
    pub ciphertext_len: u64,
}

/// Everything needed to find and rebuild a file's bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifest {
    pub size: u64,
    pub data_shards: usize,
    pub parity_shards: usize,
    pub chunks: Vec<ChunkRef>,
}

impl ContentManifest {
    pub fn codec(&self) -> Result<ErasureCodec, ErasureError> {
        ErasureCodec::new(self.data_shards, self.parity_shards)
    }

    /// Every shard location, in chunk order
    pub fn shard_locations(&self) -> impl Iterator<Item = &Location> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.shards.iter().map(|shard| &shard.location))
    }
}

/// Writes content into the store as erasure coded, encrypted chunks
pub struct Uploader<'a> {
    session: &'a Session,
    codec: ErasureCodec,
    chunk_size: usize,
    key: &'a SymmetricKey,
    owner: PublicKey,
    writer: &'a SecretKey,
}

impl<'a> Uploader<'a> {
    pub fn new(
        session: &'a Session,
        codec: ErasureCodec,
        chunk_size: usize,
        key: &'a SymmetricKey,
        owner: PublicKey,
        writer: &'a SecretKey,
    ) -> Self {
        Self {
            session,
            codec,
            chunk_size,
            key,
            owner,
            writer,
        }
    }

    /// Upload everything `reader` yields
    ///
    /// `progress` is called after every chunk with the running total of
    /// plaintext bytes stored.
    pub async fn upload<R, F>(
        &self,
        reader: R,
        mut progress: F,
    ) -> Result<ContentManifest, TransferError>
    where
        R: Read,
        F: FnMut(u64),
    {
        // a zero sized read would end the loop before any content is stored
        if self.chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        let mut reader = reader;
        let mut size = 0u64;
        let mut chunks = Vec::new();

        loop {
            let mut plaintext = Vec::with_capacity(self.chunk_size);
            (&mut reader)
                .take(self.chunk_size as u64)
                .read_to_end(&mut plaintext)?;
            if plaintext.is_empty() {
                break;
            }

            let ciphertext = self.key.encrypt(&plaintext)?;
            let shards = self.codec.encode(&ciphertext)?;
            let refs = try_join_all(shards.into_iter().map(|shard| self.put_shard(shard))).await?;
            chunks.push(ChunkRef {
                shards: refs,
                ciphertext_len: ciphertext.len() as u64,
            });

            size += plaintext.len() as u64;
            progress(size);

            if plaintext.len() < self.chunk_size {
                break;
            }
        }

        tracing::debug!("uploaded {} bytes in {} chunks", size, chunks.len());
        Ok(ContentManifest {
            size,
            data_shards: self.codec.data_shards(),
            parity_shards: self.codec.parity_shards(),
            chunks,
        })
    }

    async fn put_shard(&self, shard: Vec<u8>) -> Result<ShardRef, TransferError> {
        let location = Location::new(self.owner, self.writer.public(), Address::random());
        let hash = *blake3::hash(&shard).as_bytes();
        self.session
            .store()
            .put(&location, SignedBlob::sign(&location, shard, self.writer))
            .await?;
        Ok(ShardRef { location, hash })
    }
}

/// Reads a file's bytes back, reconstructing lost shards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retriever {
    manifest: ContentManifest,
}

impl Retriever {
    pub fn new(manifest: ContentManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &ContentManifest {
        &self.manifest
    }

    /// Fetch, repair, decrypt and concatenate every chunk
    ///
    /// `progress` receives the running total of plaintext bytes recovered.
    ///
    /// # Errors
    ///
    /// - `Erasure` if a chunk lost more shards than it has parity
    /// - `SizeMismatch` if the result is not `expected_size` bytes long
    pub async fn get_file<F>(
        &self,
        session: &Session,
        key: &SymmetricKey,
        expected_size: u64,
        mut progress: F,
    ) -> Result<Vec<u8>, TransferError>
    where
        F: FnMut(u64),
    {
        let codec = self.manifest.codec()?;
        let mut out = Vec::with_capacity(expected_size as usize);

        for chunk in &self.manifest.chunks {
            let fetched =
                join_all(chunk.shards.iter().map(|shard| fetch_shard(session, shard))).await;
            let shards = fetched.into_iter().collect::<Result<Vec<_>, _>>()?;
            let ciphertext = codec.reconstruct(&shards, chunk.ciphertext_len as usize)?;
            out.extend_from_slice(&key.decrypt(&ciphertext)?);
            progress(out.len() as u64);
        }

        if out.len() as u64 != expected_size {
            return Err(TransferError::SizeMismatch {
                expected: expected_size,
                got: out.len() as u64,
            });
        }
        Ok(out)
    }
}

/// A shard's bytes, or `None` if it is gone or fails its hash check
async fn fetch_shard(
    session: &Session,
    shard: &ShardRef,
) -> Result<Option<Vec<u8>>, TransferError> {
    match session.store().get(&shard.location).await {
        Ok(bytes) if blake3::hash(&bytes).as_bytes() == &shard.hash => {
            Ok(Some(bytes.to_vec()))
        }
        Ok(_) => {
            tracing::warn!("shard at {} failed its hash check", shard.location);
            Ok(None)
        }
        Err(StoreError::NotFound(location)) => {
            tracing::warn!("shard at {} is missing", location);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
