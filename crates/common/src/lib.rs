/**
 * Cryptographic types and operations.
 *  - Signing keys and the identities holding them
 *  - Symmetric keys, and wrapping one key under another
 */
pub mod crypto;
/**
 * The untrusted blob store records and content
 *  shards are written to, plus an in-memory
 *  implementation.
 */
pub mod store;
/**
 * The encrypted, capability-secured file tree.
 *  Records, their key hierarchy, and the vertex
 *  arena callers navigate and mutate through.
 */
pub mod tree;

pub mod prelude {
    pub use crate::crypto::{Identity, PublicKey, SecretKey, SymmetricKey};
    pub use crate::store::{MemoryStore, Store, StoreError};
    pub use crate::tree::{
        CapabilityDescriptor, FileProperties, Outcome, Refusal, Session, Tree, TreeConfig,
        TreeError, VertexId, ROOT,
    };
}
