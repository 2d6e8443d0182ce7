use std::collections::{BTreeMap, BTreeSet};

use crate::crypto::{Identity, SecretKey, SymmetricKey};

use super::location::{CapabilityDescriptor, Location};
use super::outcome::{Degradation, Outcome, Refusal};
use super::pointer::RetrievedPointer;
use super::properties::FileProperties;
use super::TreeError;

/// Index of a vertex in its [`Tree`](super::Tree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) usize);

/// The session root: always the first vertex of a tree
pub const ROOT: VertexId = VertexId(0);

/// One file or directory as the session sees it
///
/// Every vertex but [`ROOT`] wraps a [`RetrievedPointer`]. ROOT has no
/// record of its own; its children are handed to it by whoever builds the
/// session's view of the tree and it never talks to the store.
///
/// `readers` and `writers` are for display. Whether a vertex can be written
/// depends only on its entry writer holding a signing key.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) pointer: Option<RetrievedPointer>,
    pub(crate) owner_name: String,
    pub(crate) readers: BTreeSet<String>,
    pub(crate) writers: BTreeSet<String>,
    pub(crate) entry_writer: Identity,
    pub(crate) children: BTreeSet<VertexId>,
    pub(crate) children_by_name: BTreeMap<String, VertexId>,
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.pointer == other.pointer
    }
}

impl Eq for Vertex {}

impl Vertex {
    pub(crate) fn new(
        pointer: Option<RetrievedPointer>,
        owner_name: String,
        readers: BTreeSet<String>,
        writers: BTreeSet<String>,
        entry_writer: Identity,
    ) -> Self {
        Self {
            pointer,
            owner_name,
            readers,
            writers,
            entry_writer,
            children: BTreeSet::new(),
            children_by_name: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.pointer.is_none()
    }

    pub fn pointer(&self) -> Option<&RetrievedPointer> {
        self.pointer.as_ref()
    }

    pub fn descriptor(&self) -> Option<&CapabilityDescriptor> {
        self.pointer.as_ref().map(|pointer| &pointer.descriptor)
    }

    pub fn location(&self) -> Option<Location> {
        self.descriptor().map(CapabilityDescriptor::location)
    }

    /// The base key this vertex was reached with
    pub fn key(&self) -> Option<&SymmetricKey> {
        self.descriptor().map(|descriptor| &descriptor.base_key)
    }

    pub fn owner(&self) -> &str {
        &self.owner_name
    }

    pub fn readers(&self) -> &BTreeSet<String> {
        &self.readers
    }

    pub fn writers(&self) -> &BTreeSet<String> {
        &self.writers
    }

    pub fn entry_writer(&self) -> &Identity {
        &self.entry_writer
    }

    pub fn is_writable(&self) -> bool {
        self.entry_writer.is_writable()
    }

    pub(crate) fn writer_secret(&self) -> Option<&SecretKey> {
        self.entry_writer.secret()
    }

    /// ROOT counts as a directory
    pub fn is_directory(&self) -> bool {
        match &self.pointer {
            None => true,
            Some(pointer) => pointer.is_directory(),
        }
    }

    /// Cached children, without touching the store
    pub fn children(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.children.iter().copied()
    }

    pub fn child_by_name(&self, name: &str) -> Option<VertexId> {
        self.children_by_name.get(name).copied()
    }

    pub fn has_child_by_name(&self, name: &str) -> bool {
        self.children_by_name.contains_key(name)
    }

    /// Cached child names, sorted
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children_by_name.keys().map(String::as_str)
    }

    /// Forget the cached children
    pub fn clear(&mut self) {
        self.children.clear();
        self.children_by_name.clear();
    }

    /// The key that opens this vertex's properties and parent link
    ///
    /// A directory's parent key is unwrapped from its base key. When that
    /// fails the base key is assumed to be a parent key already, handed
    /// over out of band, and the result is degraded.
    pub fn parent_key(&self) -> Outcome<SymmetricKey> {
        let Some(pointer) = &self.pointer else {
            return Outcome::Refused(Refusal::MissingCredential);
        };
        match pointer.parent_key() {
            Ok(key) => Outcome::Done(key),
            Err(err) => {
                tracing::warn!(
                    "could not unwrap parent key of {}: {}; assuming the held key",
                    pointer.descriptor.location(),
                    err
                );
                Outcome::Degraded(
                    pointer.descriptor.base_key.clone(),
                    Degradation::AssumedParentKey,
                )
            }
        }
    }

    /// Name, size and timestamps, read under the parent key
    pub fn properties(&self) -> Result<Outcome<FileProperties>, TreeError> {
        let Some(pointer) = &self.pointer else {
            return Ok(Outcome::Done(FileProperties::root()));
        };
        let (key, degradation) = match self.parent_key().into_parts() {
            Ok(parts) => parts,
            Err(refusal) => return Ok(Outcome::Refused(refusal)),
        };
        let properties = pointer.record.properties(&key)?;
        Ok(Outcome::from_parts(properties, degradation))
    }

    pub(crate) fn name(&self) -> Result<String, TreeError> {
        match self.properties()?.into_value() {
            Some(properties) => Ok(properties.name),
            None => Err(TreeError::RootVertex),
        }
    }

    /// Shareable link to this vertex's capability
    pub fn to_link(&self) -> Result<String, TreeError> {
        self.descriptor()
            .map(CapabilityDescriptor::to_link)
            .ok_or(TreeError::RootVertex)
    }
}
