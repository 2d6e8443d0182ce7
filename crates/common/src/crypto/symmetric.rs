//! Symmetric keys: content encryption and key wrapping
//!
//! A [`SymmetricKey`] is the unit of read authority in the tree. Knowing a
//! key means being able to decrypt whatever it protects, and, through keys
//! wrapped under it, everything those keys protect in turn.
//!
//! - **Encryption** uses ChaCha20-Poly1305 with a BLAKE3 hash of the plaintext
//!   carried inside the ciphertext for an integrity check after decryption.
//! - **Wrapping** uses AES Key Wrap (RFC 3394) so one key can be stored
//!   encrypted under another, which is how the directory key hierarchy is
//!   persisted.

use aes_kw::KekAes256 as Kek;
use chacha20poly1305::Key;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of a symmetric key in bytes (256 bits)
pub const SYMMETRIC_KEY_SIZE: usize = 32;
/// Size of BLAKE3 hash in bytes (256 bits)
pub const BLAKE3_HASH_SIZE: usize = 32;
/// AES-KW adds one 8 byte block to the wrapped key
pub const KW_OVERHEAD: usize = 8;
/// Size of a wrapped symmetric key
pub const WRAPPED_KEY_SIZE: usize = SYMMETRIC_KEY_SIZE + KW_OVERHEAD;

/// Errors that can occur during encryption, decryption or key unwrapping
#[derive(Debug, thiserror::Error)]
pub enum SymmetricKeyError {
    #[error("symmetric key error: {0}")]
    Default(#[from] anyhow::Error),
    /// The key does not open this ciphertext or wrapped key
    #[error("wrong key")]
    WrongKey,
}

/// A 256-bit symmetric key
///
/// Sealed data is laid out as `nonce || aead(blake3(plaintext) || plaintext)`,
/// the AEAD output carrying its 16 byte tag at the end.
#[derive(PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        write!(f, "SymmetricKey({})", &blake3::hash(&self.0).to_hex()[..8])
    }
}

impl From<[u8; SYMMETRIC_KEY_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        SymmetricKey(bytes)
    }
}

/// A symmetric key encrypted under another symmetric key
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct WrappedKey(Vec<u8>);

impl SymmetricKey {
    /// Generate a new random key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; SYMMETRIC_KEY_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a key from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SYMMETRIC_KEY_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SymmetricKeyError> {
        if data.len() != SYMMETRIC_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid key size, expected {}, got {}",
                SYMMETRIC_KEY_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; SYMMETRIC_KEY_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.bytes()))
    }

    /// Seal `data` under this key with a fresh nonce
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SymmetricKeyError> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;

        let body = [blake3::hash(data).as_bytes().as_slice(), data].concat();
        let sealed = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), body.as_slice())
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        Ok([nonce.as_slice(), sealed.as_slice()].concat())
    }

    /// Open data sealed by [`encrypt`](Self::encrypt)
    ///
    /// # Errors
    ///
    /// [`SymmetricKeyError::WrongKey`] when authentication fails, which is
    /// how a key without read authority over the data shows up. Truncated
    /// input or a hash header that does not match is a `Default` error.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SymmetricKeyError> {
        if data.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("ciphertext shorter than its nonce").into());
        }
        let (nonce, sealed) = data.split_at(NONCE_SIZE);
        let body = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| SymmetricKeyError::WrongKey)?;

        if body.len() < BLAKE3_HASH_SIZE {
            return Err(anyhow::anyhow!("plaintext shorter than its hash header").into());
        }
        let (hash, plaintext) = body.split_at(BLAKE3_HASH_SIZE);
        if hash != blake3::hash(plaintext).as_bytes() {
            return Err(anyhow::anyhow!("plaintext hash mismatch").into());
        }
        Ok(plaintext.to_vec())
    }

    /// Encrypt another key under this one with AES-KW
    pub fn wrap_key(&self, key: &SymmetricKey) -> Result<WrappedKey, SymmetricKeyError> {
        let kek = Kek::from(self.0);
        let wrapped = kek
            .wrap_vec(key.bytes())
            .map_err(|_| anyhow::anyhow!("AES-KW wrap error"))?;
        Ok(WrappedKey(wrapped))
    }

    /// Recover a key wrapped under this one
    ///
    /// # Errors
    ///
    /// [`SymmetricKeyError::WrongKey`] if this key did not wrap it; AES-KW
    /// carries an integrity check, so a wrong key never yields garbage.
    pub fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<SymmetricKey, SymmetricKeyError> {
        if wrapped.0.len() != WRAPPED_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid wrapped key size, expected {}, got {}",
                WRAPPED_KEY_SIZE,
                wrapped.0.len()
            )
            .into());
        }
        let kek = Kek::from(self.0);
        let unwrapped = kek
            .unwrap_vec(&wrapped.0)
            .map_err(|_| SymmetricKeyError::WrongKey)?;
        SymmetricKey::from_slice(&unwrapped)
    }
}
