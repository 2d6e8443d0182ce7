//! Structural changes to the tree
//!
//! Every mutation checks its preconditions first and refuses, without
//! touching the store, when one does not hold. It then edits a copy of the
//! affected record, commits it under the vertex's entry writer, and only
//! once the commit lands updates the record and child cache held locally.

use std::io::Read;

use chrono::Utc;

use crate::crypto::{SecretKey, SymmetricKey};

use super::arena::{is_legal_name, Tree, TreeError};
use super::config::CollisionCheck;
use super::location::{Address, CapabilityDescriptor, Location};
use super::outcome::{Outcome, Refusal};
use super::pointer::RetrievedPointer;
use super::properties::FileProperties;
use super::record::{ChildLink, MetadataRecord, ParentLink};
use super::transfer::Uploader;
use super::vertex::{VertexId, ROOT};

macro_rules! refuse {
    ($refusal:expr) => {
        if let Some(refusal) = $refusal {
            return Ok(Outcome::Refused(refusal));
        }
    };
}

impl Tree {
    /// Why `dir` cannot take a new entry, if it cannot
    fn refuse_dir(&self, dir: VertexId) -> Result<Option<Refusal>, TreeError> {
        let vertex = self.vertex(dir)?;
        if vertex.is_root() {
            // ROOT has no record to link into
            return Ok(Some(Refusal::NotWritable));
        }
        if !vertex.is_directory() {
            return Ok(Some(Refusal::NotDirectory));
        }
        if !vertex.is_writable() {
            return Ok(Some(Refusal::NotWritable));
        }
        Ok(None)
    }

    /// Why `name` cannot be added to `dir`, if it cannot
    async fn refuse_name(
        &mut self,
        dir: VertexId,
        name: &str,
    ) -> Result<Option<Refusal>, TreeError> {
        if !is_legal_name(name) {
            return Ok(Some(Refusal::IllegalName(name.to_string())));
        }
        if self.name_taken(dir, name).await? {
            return Ok(Some(Refusal::NameCollision(name.to_string())));
        }
        Ok(None)
    }

    async fn name_taken(&mut self, dir: VertexId, name: &str) -> Result<bool, TreeError> {
        if self.config.collision_check == CollisionCheck::Refresh {
            let _ = self.get_children(dir).await?;
        }
        Ok(self.vertex(dir)?.has_child_by_name(name))
    }

    /// A copy of the pointer to edit, and the key to commit it with
    fn writable_pointer(&self, id: VertexId) -> Result<(RetrievedPointer, SecretKey), TreeError> {
        let vertex = self.vertex(id)?;
        let pointer = vertex.pointer().cloned().ok_or(TreeError::RootVertex)?;
        let secret = vertex
            .writer_secret()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("vertex {:?} is not writable", id))?;
        Ok((pointer, secret))
    }

    /// Keep a committed pointer as the vertex's current state
    fn store_pointer(&mut self, id: VertexId, pointer: RetrievedPointer) -> Result<(), TreeError> {
        self.vertex_mut(id)?.pointer = Some(pointer);
        Ok(())
    }

    /// Register a vertex created under `parent` and cache it there
    fn adopt(
        &mut self,
        parent: VertexId,
        pointer: RetrievedPointer,
        name: &str,
    ) -> Result<VertexId, TreeError> {
        let vertex = self.vertex(parent)?;
        let owner_name = vertex.owner_name.clone();
        let readers = vertex.readers.clone();
        let writers = vertex.writers.clone();
        let entry_writer = vertex.entry_writer.clone();
        let child = self.insert(pointer, owner_name, readers, writers, entry_writer);
        self.attach(parent, child, name.to_string())?;
        Ok(child)
    }

    /// Link an existing entry into `dir`
    pub async fn add_link_to(
        &mut self,
        dir: VertexId,
        node: VertexId,
    ) -> Result<Outcome, TreeError> {
        refuse!(self.refuse_dir(dir)?);
        let target = self.vertex(node)?;
        let name = target.name()?;
        let descriptor = target.descriptor().cloned().ok_or(TreeError::RootVertex)?;
        let link = if target.is_directory() {
            ChildLink::Dir(descriptor.location(), descriptor.base_key)
        } else {
            ChildLink::File(descriptor.location(), descriptor.base_key)
        };
        if self.name_taken(dir, &name).await? {
            return Ok(Outcome::Refused(Refusal::NameCollision(name)));
        }

        let (mut pointer, writer) = self.writable_pointer(dir)?;
        pointer
            .record
            .add_child_link(&pointer.descriptor.base_key, link)?;
        pointer
            .record
            .commit(&self.session, &pointer.descriptor.location(), &writer)
            .await?;
        self.store_pointer(dir, pointer)?;
        self.attach(dir, node, name.clone())?;

        tracing::info!("linked {} into {:?}", name, dir);
        Ok(Outcome::Done(()))
    }

    /// Store `content` as a new file named `name` in `dir`
    ///
    /// The file gets a fresh random key. `progress` receives the running
    /// count of bytes stored.
    pub async fn upload_file<R, F>(
        &mut self,
        dir: VertexId,
        name: &str,
        content: R,
        progress: F,
    ) -> Result<Outcome<VertexId>, TreeError>
    where
        R: Read,
        F: FnMut(u64),
    {
        refuse!(self.refuse_dir(dir)?);
        refuse!(self.refuse_name(dir, name).await?);

        let (mut parent, writer) = self.writable_pointer(dir)?;
        let key = SymmetricKey::generate();
        let manifest = Uploader::new(
            &self.session,
            self.config.codec()?,
            self.config.chunk_size,
            &key,
            parent.descriptor.owner,
            &writer,
        )
        .upload(content, progress)
        .await?;

        let properties = FileProperties::new(name, manifest.size, Utc::now(), 0, None);
        let parent_link = ParentLink {
            location: parent.descriptor.location(),
            parent_key: parent.parent_key()?,
        };
        let record = MetadataRecord::new_file(&key, &properties, Some(&parent_link), &manifest)?;
        let location = Location::new(parent.descriptor.owner, writer.public(), Address::random());
        record.commit(&self.session, &location, &writer).await?;

        parent
            .record
            .add_file(&parent.descriptor.base_key, location, key.clone())?;
        parent
            .record
            .commit(&self.session, &parent.descriptor.location(), &writer)
            .await?;
        self.store_pointer(dir, parent)?;

        let descriptor =
            CapabilityDescriptor::new(location.owner, location.writer, location.address, key);
        let child = self.adopt(dir, RetrievedPointer::new(descriptor, record), name)?;
        tracing::info!("uploaded {} ({} bytes)", name, manifest.size);
        Ok(Outcome::Done(child))
    }

    /// Create a subdirectory of `dir`
    ///
    /// The new directory is opened by `requested_key` when given, otherwise
    /// by a fresh random key. System folders carry the system attribute.
    pub async fn mkdir(
        &mut self,
        dir: VertexId,
        name: &str,
        requested_key: Option<SymmetricKey>,
        is_system_folder: bool,
    ) -> Result<Outcome<VertexId>, TreeError> {
        refuse!(self.refuse_dir(dir)?);
        refuse!(self.refuse_name(dir, name).await?);

        let (mut parent, writer) = self.writable_pointer(dir)?;
        let created = parent
            .record
            .mkdir(
                &self.session,
                &parent.descriptor,
                &writer,
                name,
                requested_key,
                is_system_folder,
            )
            .await?;
        self.store_pointer(dir, parent)?;

        let child = self.adopt(dir, created, name)?;
        tracing::info!("created directory {}", name);
        Ok(Outcome::Done(child))
    }

    /// Give `id` a new name, checking for collisions among the children of
    /// `parent` when one is given
    ///
    /// A `parent` that does not hold `id` under its current name is a
    /// caller error.
    ///
    /// Only the name changes. Degraded when the properties had to be read
    /// with the held key standing in for the parent key.
    pub async fn rename(
        &mut self,
        id: VertexId,
        new_name: &str,
        parent: Option<VertexId>,
    ) -> Result<Outcome, TreeError> {
        let vertex = self.vertex(id)?;
        if vertex.is_root() {
            return Err(TreeError::RootVertex);
        }
        if !vertex.is_writable() {
            return Ok(Outcome::Refused(Refusal::NotWritable));
        }
        if !is_legal_name(new_name) {
            return Ok(Outcome::Refused(Refusal::IllegalName(new_name.to_string())));
        }
        if let Some(parent) = parent {
            let old_name = vertex.name()?;
            if self.vertex(parent)?.child_by_name(&old_name) != Some(id) {
                return Err(TreeError::NotAChild { parent, child: id });
            }
            if self.name_taken(parent, new_name).await? {
                return Ok(Outcome::Refused(Refusal::NameCollision(new_name.to_string())));
            }
        }

        let (key, degradation) = match self.vertex(id)?.parent_key().into_parts() {
            Ok(parts) => parts,
            Err(refusal) => return Ok(Outcome::Refused(refusal)),
        };
        let (mut pointer, writer) = self.writable_pointer(id)?;
        let old_name = pointer.record.properties(&key)?.name;
        pointer.record.rename(&key, new_name)?;
        pointer
            .record
            .commit(&self.session, &pointer.descriptor.location(), &writer)
            .await?;
        self.store_pointer(id, pointer)?;

        if let Some(parent) = parent {
            self.detach(parent, id)?;
            self.attach(parent, id, new_name.to_string())?;
        }

        tracing::info!("renamed {} to {}", old_name, new_name);
        Ok(Outcome::from_parts((), degradation))
    }

    /// Copy `id` into the directory `target`
    ///
    /// A copied file keeps its key and shares content with the original. A
    /// copied directory gets a fresh key and a copy of everything under it.
    pub async fn copy_to(
        &mut self,
        id: VertexId,
        target: VertexId,
    ) -> Result<Outcome<VertexId>, TreeError> {
        refuse!(self.refuse_dir(target)?);
        let source = self
            .vertex(id)?
            .pointer()
            .cloned()
            .ok_or(TreeError::RootVertex)?;
        let name = self.vertex(id)?.name()?;
        if self.name_taken(target, &name).await? {
            return Ok(Outcome::Refused(Refusal::NameCollision(name)));
        }

        let (mut destination, writer) = self.writable_pointer(target)?;
        let copy = source
            .record
            .copy_to(
                &self.session,
                &source.descriptor,
                &destination.descriptor,
                &mut destination.record,
                &writer,
            )
            .await?;
        self.store_pointer(target, destination)?;

        let child = self.adopt(target, copy, &name)?;
        tracing::info!("copied {} into {:?}", name, target);
        Ok(Outcome::Done(child))
    }

    /// Unlink `child` from `dir`
    ///
    /// ROOT has no record, so unlinking from it only drops the cached entry.
    pub async fn remove_child(
        &mut self,
        dir: VertexId,
        child: VertexId,
    ) -> Result<Outcome, TreeError> {
        if dir == ROOT {
            self.detach(ROOT, child)?;
            return Ok(Outcome::Done(()));
        }
        refuse!(self.refuse_dir(dir)?);
        let location = self
            .vertex(child)?
            .location()
            .ok_or(TreeError::RootVertex)?;

        let (mut pointer, writer) = self.writable_pointer(dir)?;
        if pointer
            .record
            .remove_child(&pointer.descriptor.base_key, &location)?
        {
            pointer
                .record
                .commit(&self.session, &pointer.descriptor.location(), &writer)
                .await?;
            self.store_pointer(dir, pointer)?;
        }
        self.detach(dir, child)?;
        Ok(Outcome::Done(()))
    }

    /// Delete `id`: unlink it from `parent` when given, then tombstone its
    /// record
    pub async fn remove(
        &mut self,
        id: VertexId,
        parent: Option<VertexId>,
    ) -> Result<Outcome, TreeError> {
        if id == ROOT {
            return Err(TreeError::RootVertex);
        }
        if !self.vertex(id)?.is_writable() {
            return Ok(Outcome::Refused(Refusal::NotWritable));
        }
        if let Some(parent) = parent {
            refuse!(self.remove_child(parent, id).await?.refusal().cloned());
        }

        let (pointer, writer) = self.writable_pointer(id)?;
        let location = pointer.descriptor.location();
        MetadataRecord::remove(&self.session, &location, &writer).await?;
        self.forget(id);

        tracing::info!("removed {}", location);
        Ok(Outcome::Done(()))
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;
    use crate::tree::{Session, TreeConfig};

    async fn setup() -> (Tree, VertexId) {
        let session = Session::new("alice", SecretKey::generate(), Arc::new(MemoryStore::new()));
        let mut tree = Tree::new(session, TreeConfig::default()).unwrap();
        let home = tree
            .create_root_directory("alice")
            .await
            .unwrap()
            .into_value()
            .unwrap();
        (tree, home)
    }

    #[tokio::test]
    async fn test_root_refuses_mutations() {
        let (mut tree, _) = setup().await;
        assert_eq!(
            tree.mkdir(ROOT, "x", None, false).await.unwrap(),
            Outcome::Refused(Refusal::NotWritable)
        );
        assert!(matches!(
            tree.remove(ROOT, None).await,
            Err(TreeError::RootVertex)
        ));
        assert!(matches!(
            tree.rename(ROOT, "x", None).await,
            Err(TreeError::RootVertex)
        ));
    }

    #[tokio::test]
    async fn test_file_is_not_a_directory() {
        let (mut tree, home) = setup().await;
        let file = tree
            .upload_file(home, "a.txt", Cursor::new(b"abc".to_vec()), |_| {})
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(
            tree.mkdir(file, "x", None, false).await.unwrap(),
            Outcome::Refused(Refusal::NotDirectory)
        );
        assert_eq!(
            tree.upload_file(file, "b.txt", Cursor::new(Vec::new()), |_| {})
                .await
                .unwrap(),
            Outcome::Refused(Refusal::NotDirectory)
        );
    }

    #[tokio::test]
    async fn test_illegal_names_are_refused() {
        let (mut tree, home) = setup().await;
        assert_eq!(
            tree.mkdir(home, "a/b", None, false).await.unwrap(),
            Outcome::Refused(Refusal::IllegalName("a/b".to_string()))
        );
        assert_eq!(
            tree.upload_file(home, "", Cursor::new(Vec::new()), |_| {})
                .await
                .unwrap(),
            Outcome::Refused(Refusal::IllegalName(String::new()))
        );
        assert_eq!(tree.vertex(home).unwrap().children().count(), 0);
    }

    #[tokio::test]
    async fn test_requested_key_opens_new_directory() {
        let (mut tree, home) = setup().await;
        let key = SymmetricKey::generate();
        let dir = tree
            .mkdir(home, "shared", Some(key.clone()), false)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(tree.vertex(dir).unwrap().key(), Some(&key));
    }
}
