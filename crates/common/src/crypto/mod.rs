//! Cryptographic primitives for capfs
//!
//! Read authority and write authority are separate in the tree, and both are
//! carried by keys:
//!
//! - **Write authority**: Ed25519 keypairs ([`SecretKey`]/[`PublicKey`]).
//!   Every record lives at a location naming an owner and a writer; the store
//!   only accepts a commit signed by that writer. An [`Identity`] either holds
//!   the signing half ([`Identity::Owned`]) or does not.
//! - **Read authority**: [`SymmetricKey`]s. Each record is encrypted under its
//!   own key, and keys of children or of restricted views are stored wrapped
//!   under their parent's key, so possession of one key grants read access to
//!   exactly the part of the tree reachable from it.

mod identity;
mod keys;
mod symmetric;

pub use ed25519_dalek::Signature;
pub use identity::Identity;
pub use keys::{KeyError, PublicKey, SecretKey};
pub use symmetric::{SymmetricKey, SymmetricKeyError, WrappedKey, BLAKE3_HASH_SIZE};
