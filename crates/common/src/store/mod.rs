//! The untrusted blob store the tree persists into
//!
//! The tree only depends on the [`Store`] trait; [`MemoryStore`] is the
//! in-process implementation used for tests and embedding.

mod memory;
mod provider;

pub use memory::MemoryStore;
pub use provider::{sign_removal, verify_removal, SignedBlob, Store, StoreError};
