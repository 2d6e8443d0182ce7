use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, SymmetricKey};

/// Size of a record address in bytes
pub const ADDRESS_SIZE: usize = 32;

/// Errors that can occur parsing locations or capability links
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] crate::crypto::KeyError),
    #[error("symmetric key error: {0}")]
    SymmetricKey(#[from] crate::crypto::SymmetricKeyError),
}

/// Address of one record under an (owner, writer) pair
///
/// Fresh addresses are always drawn from the system CSPRNG so a new record
/// cannot land on an existing one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..8])
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }
}

impl Address {
    pub fn random() -> Self {
        let mut buff = [0; ADDRESS_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Address(buff)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, LinkError> {
        let mut buff = [0; ADDRESS_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("address hex decode error"))?;
        Ok(Address(buff))
    }
}

/// Where a record lives in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub owner: PublicKey,
    pub writer: PublicKey,
    pub address: Address,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            &self.owner.to_hex()[..8],
            &self.writer.to_hex()[..8],
            &self.address.to_hex()[..8]
        )
    }
}

impl Location {
    pub fn new(owner: PublicKey, writer: PublicKey, address: Address) -> Self {
        Self {
            owner,
            writer,
            address,
        }
    }

    /// Canonical bytes, used as the prefix of every signed store message
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * ADDRESS_SIZE);
        out.extend_from_slice(&self.owner.to_bytes());
        out.extend_from_slice(&self.writer.to_bytes());
        out.extend_from_slice(self.address.bytes());
        out
    }
}

/// Read capability over one record
///
/// Names the record's [`Location`] and carries the key that opens it.
/// For a file the base key also opens its chunks; for a directory it opens
/// the child list (see [`MetadataRecord`](super::MetadataRecord) for the key
/// hierarchy). Two descriptors are equal only when all four fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub owner: PublicKey,
    pub writer: PublicKey,
    pub address: Address,
    pub base_key: SymmetricKey,
}

impl CapabilityDescriptor {
    pub fn new(
        owner: PublicKey,
        writer: PublicKey,
        address: Address,
        base_key: SymmetricKey,
    ) -> Self {
        Self {
            owner,
            writer,
            address,
            base_key,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.owner, self.writer, self.address)
    }

    /// Same record and key, committed under a different writer
    pub fn with_writer(&self, writer: PublicKey) -> Self {
        Self {
            writer,
            ..self.clone()
        }
    }

    /// Encode as a shareable link: `#owner/writer/address/key`, all hex
    pub fn to_link(&self) -> String {
        format!(
            "#{}/{}/{}/{}",
            self.owner.to_hex(),
            self.writer.to_hex(),
            self.address.to_hex(),
            hex::encode(self.base_key.bytes())
        )
    }

    /// Parse a link produced by [`to_link`](Self::to_link)
    pub fn from_link(link: &str) -> Result<Self, LinkError> {
        let link = link.strip_prefix('#').unwrap_or(link);
        let parts: Vec<&str> = link.split('/').collect();
        let [owner, writer, address, key] = parts.as_slice() else {
            return Err(anyhow::anyhow!(
                "expected 4 link segments, got {}",
                parts.len()
            )
            .into());
        };
        let key_bytes = hex::decode(key).map_err(|_| anyhow::anyhow!("key hex decode error"))?;
        Ok(Self {
            owner: PublicKey::from_hex(owner)?,
            writer: PublicKey::from_hex(writer)?,
            address: Address::from_hex(address)?,
            base_key: SymmetricKey::from_slice(&key_bytes)?,
        })
    }
}
