//! The encrypted record stored at every address
//!
//! Key hierarchy
//! =============
//! A file record is opened by a single key: its base key is also its parent
//! key, and it encrypts the properties, the parent link and the content
//! manifest.
//!
//! A directory record separates three keys:
//!  - the *base key* opens the child list, and unwraps the parent key
//!  - the *parent key* opens the properties and the parent link. Holding
//!    it alone is enough to see an entry's name from its parent, not to
//!    list the entry.
//!  - a random *meta key*, wrapped under the parent key. Since only the
//!    parent key opens it, a key that unwraps the meta key is a parent key
//!    handed out on its own: a restricted capability.
//!
//! Records are bincode encoded, and every commit is signed by the writer of
//! the location it lands on.

use chrono::Utc;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::{SecretKey, SymmetricKey, SymmetricKeyError, WrappedKey};
use crate::store::{sign_removal, SignedBlob, StoreError};

use super::location::{Address, CapabilityDescriptor, Location};
use super::pointer::RetrievedPointer;
use super::properties::{FileProperties, ATTR_SYSTEM};
use super::session::Session;
use super::transfer::{ContentManifest, Retriever, TransferError};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("symmetric key error: {0}")]
    SymmetricKey(#[from] SymmetricKeyError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("record is not a directory")]
    NotDirectory,
    #[error("record is not a file")]
    NotFile,
    /// The held key is a parent key only and cannot list children
    #[error("capability cannot enumerate children")]
    RestrictedCapability,
}

/// A directory's link to one child: where it lives and the key that opens it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildLink {
    File(Location, SymmetricKey),
    Dir(Location, SymmetricKey),
}

impl ChildLink {
    pub fn location(&self) -> &Location {
        match self {
            ChildLink::File(location, _) => location,
            ChildLink::Dir(location, _) => location,
        }
    }

    pub fn key(&self) -> &SymmetricKey {
        match self {
            ChildLink::File(_, key) => key,
            ChildLink::Dir(_, key) => key,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, ChildLink::Dir(_, _))
    }
}

/// Where an entry's parent directory lives, with that directory's parent key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub location: Location,
    pub parent_key: SymmetricKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Body {
    File {
        /// [`ContentManifest`] under the base key
        content: Vec<u8>,
    },
    Dir {
        /// Parent key under the base key
        parent_key: WrappedKey,
        /// Meta key under the parent key
        meta_key: WrappedKey,
        /// `Vec<ChildLink>` under the base key
        children: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// [`FileProperties`] under the parent key
    properties: Vec<u8>,
    /// [`ParentLink`] under the parent key, absent for top level records
    parent: Option<Vec<u8>>,
    body: Body,
}

fn seal<T: Serialize + ?Sized>(key: &SymmetricKey, value: &T) -> Result<Vec<u8>, RecordError> {
    Ok(key.encrypt(&bincode::serialize(value)?)?)
}

fn open<T: DeserializeOwned>(key: &SymmetricKey, data: &[u8]) -> Result<T, RecordError> {
    Ok(bincode::deserialize(&key.decrypt(data)?)?)
}

impl MetadataRecord {
    pub fn new_file(
        key: &SymmetricKey,
        properties: &FileProperties,
        parent: Option<&ParentLink>,
        manifest: &ContentManifest,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            properties: seal(key, properties)?,
            parent: parent.map(|link| seal(key, link)).transpose()?,
            body: Body::File {
                content: seal(key, manifest)?,
            },
        })
    }

    /// An empty directory opened by `base_key`, whose entry is visible to
    /// holders of `parent_key`
    pub fn new_dir(
        base_key: &SymmetricKey,
        parent_key: &SymmetricKey,
        properties: &FileProperties,
        parent: Option<&ParentLink>,
    ) -> Result<Self, RecordError> {
        let meta_key = SymmetricKey::generate();
        Ok(Self {
            properties: seal(parent_key, properties)?,
            parent: parent.map(|link| seal(parent_key, link)).transpose()?,
            body: Body::Dir {
                parent_key: base_key.wrap_key(parent_key)?,
                meta_key: parent_key.wrap_key(&meta_key)?,
                children: seal(base_key, &Vec::<ChildLink>::new())?,
            },
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.body, Body::Dir { .. })
    }

    /// The key that opens this record's properties and parent link
    ///
    /// For a file that is the base key itself. For a directory it is the
    /// wrapped parent key; unwrapping fails when `base_key` is already a
    /// parent key.
    pub fn parent_key(&self, base_key: &SymmetricKey) -> Result<SymmetricKey, RecordError> {
        match &self.body {
            Body::File { .. } => Ok(base_key.clone()),
            Body::Dir { parent_key, .. } => Ok(base_key.unwrap_key(parent_key)?),
        }
    }

    /// Unwrap the meta key; only a directory's parent key can
    pub fn meta_key(&self, key: &SymmetricKey) -> Result<SymmetricKey, RecordError> {
        match &self.body {
            Body::File { .. } => Err(RecordError::NotDirectory),
            Body::Dir { meta_key, .. } => Ok(key.unwrap_key(meta_key)?),
        }
    }

    pub fn properties(&self, parent_key: &SymmetricKey) -> Result<FileProperties, RecordError> {
        open(parent_key, &self.properties)
    }

    pub fn set_properties(
        &mut self,
        parent_key: &SymmetricKey,
        properties: &FileProperties,
    ) -> Result<(), RecordError> {
        self.properties = seal(parent_key, properties)?;
        Ok(())
    }

    /// Rewrite the name, leaving every other property as it was
    pub fn rename(&mut self, parent_key: &SymmetricKey, name: &str) -> Result<(), RecordError> {
        let properties = self.properties(parent_key)?.with_name(name);
        self.set_properties(parent_key, &properties)
    }

    pub fn parent(&self, parent_key: &SymmetricKey) -> Result<Option<ParentLink>, RecordError> {
        self.parent
            .as_ref()
            .map(|data| open(parent_key, data))
            .transpose()
    }

    pub fn manifest(&self, base_key: &SymmetricKey) -> Result<ContentManifest, RecordError> {
        match &self.body {
            Body::File { content } => open(base_key, content),
            Body::Dir { .. } => Err(RecordError::NotFile),
        }
    }

    pub fn retriever(&self, base_key: &SymmetricKey) -> Result<Retriever, RecordError> {
        Ok(Retriever::new(self.manifest(base_key)?))
    }

    pub fn child_links(&self, base_key: &SymmetricKey) -> Result<Vec<ChildLink>, RecordError> {
        match &self.body {
            Body::File { .. } => Err(RecordError::NotDirectory),
            Body::Dir { children, .. } => open(base_key, children),
        }
    }

    fn set_child_links(
        &mut self,
        base_key: &SymmetricKey,
        links: &[ChildLink],
    ) -> Result<(), RecordError> {
        match &mut self.body {
            Body::File { .. } => Err(RecordError::NotDirectory),
            Body::Dir { children, .. } => {
                *children = seal(base_key, links)?;
                Ok(())
            }
        }
    }

    /// Append a link, replacing any earlier link to the same location
    pub fn add_child_link(
        &mut self,
        base_key: &SymmetricKey,
        link: ChildLink,
    ) -> Result<(), RecordError> {
        let mut links = self.child_links(base_key)?;
        links.retain(|existing| existing.location() != link.location());
        links.push(link);
        self.set_child_links(base_key, &links)
    }

    pub fn add_file(
        &mut self,
        base_key: &SymmetricKey,
        location: Location,
        key: SymmetricKey,
    ) -> Result<(), RecordError> {
        self.add_child_link(base_key, ChildLink::File(location, key))
    }

    pub fn add_subdir(
        &mut self,
        base_key: &SymmetricKey,
        location: Location,
        key: SymmetricKey,
    ) -> Result<(), RecordError> {
        self.add_child_link(base_key, ChildLink::Dir(location, key))
    }

    /// Drop the link to `location`; returns whether one was present
    pub fn remove_child(
        &mut self,
        base_key: &SymmetricKey,
        location: &Location,
    ) -> Result<bool, RecordError> {
        let mut links = self.child_links(base_key)?;
        let before = links.len();
        links.retain(|link| link.location() != location);
        if links.len() == before {
            return Ok(false);
        }
        self.set_child_links(base_key, &links)?;
        Ok(true)
    }

    pub async fn fetch(session: &Session, location: &Location) -> Result<Self, RecordError> {
        tracing::debug!("fetching record at {}", location);
        let bytes = session.store().get(location).await?;
        Self::from_bytes(&bytes)
    }

    /// Write this record to `location`, signed by `writer`
    pub async fn commit(
        &self,
        session: &Session,
        location: &Location,
        writer: &SecretKey,
    ) -> Result<(), RecordError> {
        let blob = SignedBlob::sign(location, self.to_bytes()?, writer);
        session.store().put(location, blob).await?;
        tracing::debug!("committed record at {}", location);
        Ok(())
    }

    /// Tombstone the record at `location`
    ///
    /// Content shards are left in place: copies of a file share them, and
    /// reclaiming them is the store's job.
    pub async fn remove(
        session: &Session,
        location: &Location,
        writer: &SecretKey,
    ) -> Result<(), RecordError> {
        session
            .store()
            .remove(location, &sign_removal(location, writer))
            .await?;
        tracing::debug!("removed record at {}", location);
        Ok(())
    }

    /// Fetch every child this key can list
    ///
    /// A key that unwraps the meta key is a restricted capability and gets
    /// [`RecordError::RestrictedCapability`]. Children whose records are
    /// gone are skipped.
    pub async fn children(
        &self,
        session: &Session,
        base_key: &SymmetricKey,
    ) -> Result<Vec<RetrievedPointer>, RecordError> {
        if self.meta_key(base_key).is_ok() {
            return Err(RecordError::RestrictedCapability);
        }

        let mut children = Vec::new();
        for link in self.child_links(base_key)? {
            let location = *link.location();
            match Self::fetch(session, &location).await {
                Ok(record) => {
                    let descriptor = CapabilityDescriptor::new(
                        location.owner,
                        location.writer,
                        location.address,
                        link.key().clone(),
                    );
                    children.push(RetrievedPointer::new(descriptor, record));
                }
                Err(RecordError::Store(StoreError::NotFound(_))) => {
                    tracing::warn!("skipping dangling child link to {}", location);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(children)
    }

    /// Create a subdirectory and link it into this directory
    ///
    /// Commits the new record, then this one. `dir` is this record's own
    /// capability; the new record lands under `writer`.
    pub async fn mkdir(
        &mut self,
        session: &Session,
        dir: &CapabilityDescriptor,
        writer: &SecretKey,
        name: &str,
        requested_key: Option<SymmetricKey>,
        is_system_folder: bool,
    ) -> Result<RetrievedPointer, RecordError> {
        let attributes = if is_system_folder { ATTR_SYSTEM } else { 0 };
        let properties = FileProperties::new(name, 0, Utc::now(), attributes, None);
        let parent = ParentLink {
            location: dir.location(),
            parent_key: self.parent_key(&dir.base_key)?,
        };

        let base_key = requested_key.unwrap_or_else(SymmetricKey::generate);
        let record =
            Self::new_dir(&base_key, &SymmetricKey::generate(), &properties, Some(&parent))?;
        let location = Location::new(dir.owner, writer.public(), Address::random());
        record.commit(session, &location, writer).await?;

        self.add_subdir(&dir.base_key, location, base_key.clone())?;
        self.commit(session, &dir.location(), writer).await?;

        let descriptor =
            CapabilityDescriptor::new(location.owner, location.writer, location.address, base_key);
        Ok(RetrievedPointer::new(descriptor, record))
    }

    /// Copy this entry into `target`, then commit `target_record`
    ///
    /// The copy gets a fresh address owned by the session user. A file copy
    /// keeps its key and shares content shards with the original. A
    /// directory copy gets a fresh key and an independent copy of every
    /// descendant.
    pub async fn copy_to(
        &self,
        session: &Session,
        source: &CapabilityDescriptor,
        target: &CapabilityDescriptor,
        target_record: &mut MetadataRecord,
        writer: &SecretKey,
    ) -> Result<RetrievedPointer, RecordError> {
        let copy = self
            .copy_into(session, source, target, target_record, writer)
            .await?;
        target_record
            .commit(session, &target.location(), writer)
            .await?;
        Ok(copy)
    }

    fn copy_into<'a>(
        &'a self,
        session: &'a Session,
        source: &'a CapabilityDescriptor,
        target: &'a CapabilityDescriptor,
        target_record: &'a mut MetadataRecord,
        writer: &'a SecretKey,
    ) -> BoxFuture<'a, Result<RetrievedPointer, RecordError>> {
        Box::pin(async move {
            let properties = self.properties(&self.parent_key(&source.base_key)?)?;
            let parent = ParentLink {
                location: target.location(),
                parent_key: target_record.parent_key(&target.base_key)?,
            };
            let location = Location::new(session.owner(), writer.public(), Address::random());

            let (key, record) = if self.is_directory() {
                let key = SymmetricKey::generate();
                let mut record =
                    Self::new_dir(&key, &SymmetricKey::generate(), &properties, Some(&parent))?;
                let descriptor = CapabilityDescriptor::new(
                    location.owner,
                    location.writer,
                    location.address,
                    key.clone(),
                );
                for child in self.children(session, &source.base_key).await? {
                    child
                        .record
                        .copy_into(session, &child.descriptor, &descriptor, &mut record, writer)
                        .await?;
                }
                target_record.add_subdir(&target.base_key, location, key.clone())?;
                (key, record)
            } else {
                let key = source.base_key.clone();
                let manifest = self.manifest(&key)?;
                let record = Self::new_file(&key, &properties, Some(&parent), &manifest)?;
                target_record.add_file(&target.base_key, location, key.clone())?;
                (key, record)
            };

            record.commit(session, &location, writer).await?;
            tracing::debug!("copied {} to {}", properties.name, location);
            let descriptor =
                CapabilityDescriptor::new(location.owner, location.writer, location.address, key);
            Ok(RetrievedPointer::new(descriptor, record))
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;

    fn dir_record(base_key: &SymmetricKey, parent_key: &SymmetricKey) -> MetadataRecord {
        let properties = FileProperties::new("docs", 0, Utc::now(), 0, None);
        MetadataRecord::new_dir(base_key, parent_key, &properties, None).unwrap()
    }

    #[test]
    fn test_directory_key_hierarchy() {
        let base_key = SymmetricKey::generate();
        let parent_key = SymmetricKey::generate();
        let record = dir_record(&base_key, &parent_key);

        assert!(record.is_directory());
        assert_eq!(record.parent_key(&base_key).unwrap(), parent_key);
        // a parent key cannot unwrap itself
        assert!(record.parent_key(&parent_key).is_err());
        // only the parent key opens the meta key
        assert!(record.meta_key(&parent_key).is_ok());
        assert!(record.meta_key(&base_key).is_err());
        assert_eq!(record.properties(&parent_key).unwrap().name, "docs");
        assert!(record.properties(&base_key).is_err());
        assert!(record.child_links(&base_key).unwrap().is_empty());
        assert!(record.parent(&parent_key).unwrap().is_none());
    }

    #[test]
    fn test_file_record_uses_one_key() {
        let key = SymmetricKey::generate();
        let manifest = ContentManifest {
            size: 0,
            data_shards: 4,
            parity_shards: 2,
            chunks: Vec::new(),
        };
        let properties = FileProperties::new("a.txt", 0, Utc::now(), 0, None);
        let record = MetadataRecord::new_file(&key, &properties, None, &manifest).unwrap();

        assert!(!record.is_directory());
        assert_eq!(record.parent_key(&key).unwrap(), key);
        assert_eq!(record.manifest(&key).unwrap(), manifest);
        assert!(matches!(record.meta_key(&key), Err(RecordError::NotDirectory)));
        assert!(matches!(
            record.child_links(&key),
            Err(RecordError::NotDirectory)
        ));
    }

    #[test]
    fn test_rename_keeps_other_properties() {
        let base_key = SymmetricKey::generate();
        let parent_key = SymmetricKey::generate();
        let mut record = dir_record(&base_key, &parent_key);
        let before = record.properties(&parent_key).unwrap();

        record.rename(&parent_key, "papers").unwrap();
        let after = record.properties(&parent_key).unwrap();
        assert_eq!(after.name, "papers");
        assert_eq!(after.modified, before.modified);
        assert_eq!(after.attributes, before.attributes);
    }

    #[test]
    fn test_child_link_edits() {
        let base_key = SymmetricKey::generate();
        let mut record = dir_record(&base_key, &SymmetricKey::generate());
        let owner = SecretKey::generate().public();
        let a = Location::new(owner, owner, Address::random());
        let b = Location::new(owner, owner, Address::random());

        record.add_file(&base_key, a, SymmetricKey::generate()).unwrap();
        record.add_subdir(&base_key, b, SymmetricKey::generate()).unwrap();
        // relinking the same location replaces the old link
        record.add_file(&base_key, a, SymmetricKey::generate()).unwrap();

        let links = record.child_links(&base_key).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|link| link.is_dir() && link.location() == &b));

        assert!(record.remove_child(&base_key, &a).unwrap());
        assert!(!record.remove_child(&base_key, &a).unwrap());
        assert_eq!(record.child_links(&base_key).unwrap().len(), 1);
    }

    #[test]
    fn test_bytes_round_trip() {
        let base_key = SymmetricKey::generate();
        let record = dir_record(&base_key, &SymmetricKey::generate());
        let decoded = MetadataRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(MetadataRecord::from_bytes(&[0xFF; 3]).is_err());
    }

    #[tokio::test]
    async fn test_mkdir_and_children() {
        let store = MemoryStore::new();
        let secret = SecretKey::generate();
        let session = Session::new("alice", secret.clone(), Arc::new(store.clone()));

        let base_key = SymmetricKey::generate();
        let mut record = dir_record(&base_key, &SymmetricKey::generate());
        let dir = CapabilityDescriptor::new(
            secret.public(),
            secret.public(),
            Address::random(),
            base_key.clone(),
        );
        record.commit(&session, &dir.location(), &secret).await.unwrap();

        let child = record
            .mkdir(&session, &dir, &secret, "notes", None, true)
            .await
            .unwrap();
        assert!(child.record.is_directory());
        assert_ne!(child.descriptor.base_key, base_key);

        let children = record.children(&session, &base_key).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].descriptor, child.descriptor);
        let properties = children[0].properties().unwrap();
        assert_eq!(properties.name, "notes");
        assert!(properties.is_system());

        // the child's parent link leads back here
        let parent_key = child.record.parent_key(&child.descriptor.base_key).unwrap();
        let link = child.record.parent(&parent_key).unwrap().unwrap();
        assert_eq!(link.location, dir.location());

        // a dangling link is skipped
        assert!(store.drop_blob(&child.descriptor.location()));
        assert!(record.children(&session, &base_key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restricted_key_cannot_list() {
        let store = MemoryStore::new();
        let session = Session::new("alice", SecretKey::generate(), Arc::new(store));
        let base_key = SymmetricKey::generate();
        let parent_key = SymmetricKey::generate();
        let record = dir_record(&base_key, &parent_key);

        assert!(matches!(
            record.children(&session, &parent_key).await,
            Err(RecordError::RestrictedCapability)
        ));
    }

    #[tokio::test]
    async fn test_remove_needs_writer_signature() {
        let store = MemoryStore::new();
        let secret = SecretKey::generate();
        let session = Session::new("alice", secret.clone(), Arc::new(store.clone()));
        let base_key = SymmetricKey::generate();
        let record = dir_record(&base_key, &SymmetricKey::generate());
        let location = Location::new(secret.public(), secret.public(), Address::random());
        record.commit(&session, &location, &secret).await.unwrap();

        let result = MetadataRecord::remove(&session, &location, &SecretKey::generate()).await;
        assert!(matches!(
            result,
            Err(RecordError::Store(StoreError::Unauthorized(_)))
        ));
        assert!(store.contains(&location));

        MetadataRecord::remove(&session, &location, &secret).await.unwrap();
        assert!(!store.contains(&location));
    }
}
