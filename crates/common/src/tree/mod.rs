//! The encrypted file tree as one session sees it
//!
//! Every file and directory is a [`MetadataRecord`] at a random [`Location`]
//! in an untrusted [`Store`](crate::store::Store). A
//! [`CapabilityDescriptor`] names a record and carries the key that opens
//! it; holding the descriptor is what it means to be able to read that
//! entry. Writing needs the signing key of the location's writer.
//!
//! The session navigates and edits the tree through a [`Tree`], an arena of
//! [`Vertex`]es addressed by [`VertexId`]. Vertex [`ROOT`] is a local anchor
//! with no record; everything under it is fetched from the store.
//!
//! Expected refusals and fallbacks come back as an [`Outcome`]; errors are
//! reserved for failures of the store or of the data itself.

mod arena;
mod config;
mod location;
mod mutations;
mod outcome;
mod pointer;
mod properties;
mod record;
mod session;
mod transfer;
mod vertex;

pub use arena::{is_legal_name, Tree, TreeError};
pub use config::{CollisionCheck, ConfigError, TreeConfig};
pub use location::{Address, CapabilityDescriptor, LinkError, Location};
pub use outcome::{Degradation, Outcome, Refusal};
pub use pointer::RetrievedPointer;
pub use properties::{FileProperties, ATTR_SYSTEM};
pub use record::{ChildLink, MetadataRecord, ParentLink, RecordError};
pub use session::Session;
pub use transfer::{ChunkRef, ContentManifest, Retriever, ShardRef, TransferError, Uploader};
pub use vertex::{Vertex, VertexId, ROOT};
