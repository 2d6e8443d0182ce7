use std::collections::{BTreeSet, HashMap};

use chrono::Utc;

use erasure::codec::ErasureError;

use crate::crypto::{Identity, SymmetricKey};
use crate::store::StoreError;

use super::config::{ConfigError, TreeConfig};
use super::location::{Address, CapabilityDescriptor, Location};
use super::outcome::{Degradation, Outcome, Refusal};
use super::pointer::RetrievedPointer;
use super::properties::FileProperties;
use super::record::{MetadataRecord, RecordError};
use super::session::Session;
use super::transfer::TransferError;
use super::vertex::{Vertex, VertexId, ROOT};

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("tree error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("erasure error: {0}")]
    Erasure(#[from] ErasureError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown vertex {0:?}")]
    UnknownVertex(VertexId),
    #[error("operation needs a vertex with a record, not the session root")]
    RootVertex,
    #[error("duplicate child name: {0}")]
    DuplicateChild(String),
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: VertexId, child: VertexId },
}

/// Every vertex the session has seen, indexed by [`VertexId`]
///
/// The tree owns its vertices; parents refer to children by id, and a
/// `Location` index lets a re-fetch reuse the vertex already standing for a
/// record instead of minting a new one. Vertex [`ROOT`] always exists.
#[derive(Debug)]
pub struct Tree {
    pub(crate) session: Session,
    pub(crate) config: TreeConfig,
    vertices: Vec<Option<Vertex>>,
    by_location: HashMap<Location, VertexId>,
}

impl Tree {
    /// An empty tree holding only ROOT
    ///
    /// # Errors
    ///
    /// Fails when `config` does not validate.
    pub fn new(session: Session, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        let root = Vertex::new(
            None,
            session.username().to_string(),
            BTreeSet::new(),
            BTreeSet::new(),
            session.identity().clone(),
        );
        Ok(Self {
            session,
            config,
            vertices: vec![Some(root)],
            by_location: HashMap::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn root(&self) -> &Vertex {
        // ROOT is never removed
        self.vertices[ROOT.0]
            .as_ref()
            .unwrap_or_else(|| unreachable!("session root removed"))
    }

    pub fn vertex(&self, id: VertexId) -> Result<&Vertex, TreeError> {
        self.vertices
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(TreeError::UnknownVertex(id))
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex, TreeError> {
        self.vertices
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::UnknownVertex(id))
    }

    /// Find the vertex standing for a record, if the session has seen it
    pub fn lookup(&self, location: &Location) -> Option<VertexId> {
        self.by_location.get(location).copied()
    }

    /// Register a retrieved record as a vertex
    ///
    /// The pointer is re-targeted at `entry_writer`, who commits every
    /// later change to it. If a vertex already stands for that location its
    /// pointer is refreshed and its id returned.
    pub fn insert(
        &mut self,
        pointer: RetrievedPointer,
        owner_name: impl Into<String>,
        readers: BTreeSet<String>,
        writers: BTreeSet<String>,
        entry_writer: Identity,
    ) -> VertexId {
        let pointer = pointer.with_writer(entry_writer.public());
        let location = pointer.descriptor.location();
        if let Some(id) = self.lookup(&location) {
            if let Ok(vertex) = self.vertex_mut(id) {
                vertex.pointer = Some(pointer);
                return id;
            }
        }

        let id = VertexId(self.vertices.len());
        self.vertices.push(Some(Vertex::new(
            Some(pointer),
            owner_name.into(),
            readers,
            writers,
            entry_writer,
        )));
        self.by_location.insert(location, id);
        id
    }

    /// Drop a vertex from the arena and from every cache holding it; its id
    /// is never reused
    pub(crate) fn forget(&mut self, id: VertexId) {
        if id == ROOT {
            return;
        }
        if let Some(vertex) = self.vertices.get_mut(id.0).and_then(Option::take) {
            if let Some(location) = vertex.location() {
                self.by_location.remove(&location);
            }
        }
        for vertex in self.vertices.iter_mut().flatten() {
            if vertex.children.remove(&id) {
                vertex.children_by_name.retain(|_, child| *child != id);
            }
        }
    }

    /// Add `child` to `parent`'s cache under `name`
    ///
    /// A name already taken is a no-op for ROOT and an error for any other
    /// vertex.
    pub(crate) fn attach(
        &mut self,
        parent: VertexId,
        child: VertexId,
        name: String,
    ) -> Result<(), TreeError> {
        let vertex = self.vertex_mut(parent)?;
        if let Some(existing) = vertex.children_by_name.get(&name) {
            if *existing == child {
                return Ok(());
            }
            if parent == ROOT {
                tracing::debug!("root already has a child named {}", name);
                return Ok(());
            }
            return Err(TreeError::DuplicateChild(name));
        }
        vertex.children.insert(child);
        vertex.children_by_name.insert(name, child);
        Ok(())
    }

    /// Remove `child` from `parent`'s cache
    pub(crate) fn detach(&mut self, parent: VertexId, child: VertexId) -> Result<(), TreeError> {
        let vertex = self.vertex_mut(parent)?;
        vertex.children.remove(&child);
        vertex.children_by_name.retain(|_, id| *id != child);
        Ok(())
    }

    /// Cache `child` under `parent` by its current name
    ///
    /// This is how the session root gets populated.
    pub fn add_child(&mut self, parent: VertexId, child: VertexId) -> Result<(), TreeError> {
        let name = self.vertex(child)?.name()?;
        self.attach(parent, child, name)
    }

    /// Forget `id`'s cached children
    pub fn clear(&mut self, id: VertexId) -> Result<(), TreeError> {
        self.vertex_mut(id)?.clear();
        Ok(())
    }

    /// Fetch the record a capability opens and register it
    pub async fn retrieve(
        &mut self,
        descriptor: CapabilityDescriptor,
        owner_name: impl Into<String>,
        entry_writer: Identity,
    ) -> Result<VertexId, TreeError> {
        let pointer = RetrievedPointer::retrieve(&self.session, descriptor).await?;
        Ok(self.insert(
            pointer,
            owner_name,
            BTreeSet::new(),
            BTreeSet::new(),
            entry_writer,
        ))
    }

    /// Create a top level directory for the session user and hang it off
    /// ROOT
    pub async fn create_root_directory(
        &mut self,
        name: &str,
    ) -> Result<Outcome<VertexId>, TreeError> {
        let Some(secret) = self.session.identity().secret().cloned() else {
            return Ok(Outcome::Refused(Refusal::NotWritable));
        };
        if !is_legal_name(name) {
            return Ok(Outcome::Refused(Refusal::IllegalName(name.to_string())));
        }
        if self.root().has_child_by_name(name) {
            return Ok(Outcome::Refused(Refusal::NameCollision(name.to_string())));
        }

        let base_key = SymmetricKey::generate();
        let properties = FileProperties::new(name, 0, Utc::now(), 0, None);
        let record =
            MetadataRecord::new_dir(&base_key, &SymmetricKey::generate(), &properties, None)?;
        let location = Location::new(secret.public(), secret.public(), Address::random());
        record.commit(&self.session, &location, &secret).await?;

        let descriptor =
            CapabilityDescriptor::new(location.owner, location.writer, location.address, base_key);
        let username = self.session.username().to_string();
        let identity = self.session.identity().clone();
        let id = self.insert(
            RetrievedPointer::new(descriptor, record),
            username.clone(),
            BTreeSet::new(),
            BTreeSet::from([username]),
            identity,
        );
        self.attach(ROOT, id, name.to_string())?;
        tracing::info!("created root directory {}", name);
        Ok(Outcome::Done(id))
    }

    /// Children of `id`, fetched fresh where possible
    ///
    /// ROOT always serves its cache. Any other directory re-fetches its own
    /// record and lists it, and the listing replaces the cache. When either
    /// step fails the cache is served as is and the outcome is degraded.
    pub async fn get_children(
        &mut self,
        id: VertexId,
    ) -> Result<Outcome<Vec<VertexId>>, TreeError> {
        let vertex = self.vertex(id)?;
        let cached: Vec<VertexId> = vertex.children().collect();
        let Some(pointer) = vertex.pointer.as_ref() else {
            return Ok(Outcome::Done(cached));
        };
        if !pointer.is_directory() {
            return Ok(Outcome::Done(Vec::new()));
        }

        let location = pointer.descriptor.location();
        let base_key = pointer.descriptor.base_key.clone();
        let fetched = async {
            let record = MetadataRecord::fetch(&self.session, &location).await?;
            let children = record.children(&self.session, &base_key).await?;
            Ok::<_, RecordError>((record, children))
        }
        .await;
        let (record, pointers) = match fetched {
            Ok(fetched) => fetched,
            Err(RecordError::RestrictedCapability) => {
                return Ok(Outcome::Degraded(cached, Degradation::RestrictedCapability));
            }
            Err(err) => {
                tracing::warn!(
                    "listing children of {} failed, serving cache: {}",
                    location,
                    err
                );
                return Ok(Outcome::Degraded(
                    cached,
                    Degradation::FetchFailed(err.to_string()),
                ));
            }
        };

        if let Some(pointer) = self.vertex_mut(id)?.pointer.as_mut() {
            pointer.record = record;
        }
        self.merge_children(id, pointers).map(Outcome::Done)
    }

    /// Replace `id`'s cache with a fresh listing
    fn merge_children(
        &mut self,
        id: VertexId,
        pointers: Vec<RetrievedPointer>,
    ) -> Result<Vec<VertexId>, TreeError> {
        let parent = self.vertex(id)?;
        let owner_name = parent.owner_name.clone();
        let readers = parent.readers.clone();
        let writers = parent.writers.clone();
        let entry_writer = parent.entry_writer.clone();

        let mut children = Vec::with_capacity(pointers.len());
        for pointer in pointers {
            let name = match pointer.properties() {
                Ok(properties) => properties.name,
                Err(err) => {
                    tracing::warn!(
                        "skipping unreadable child {}: {}",
                        pointer.descriptor.location(),
                        err
                    );
                    continue;
                }
            };
            let child = self.insert(
                pointer,
                owner_name.clone(),
                readers.clone(),
                writers.clone(),
                entry_writer.clone(),
            );
            children.push((name, child));
        }

        let vertex = self.vertex_mut(id)?;
        vertex.clear();
        for (name, child) in children {
            if vertex.children_by_name.contains_key(&name) {
                tracing::warn!("listing has two children named {}, keeping the first", name);
                continue;
            }
            vertex.children.insert(child);
            vertex.children_by_name.insert(name, child);
        }
        Ok(vertex.children().collect())
    }

    /// Walk `path` down from `id`, one `/` separated segment at a time
    ///
    /// Every step re-lists the directory it passes through. Empty segments
    /// are skipped, so `""` resolves to `id` itself.
    pub async fn resolve_path(
        &mut self,
        id: VertexId,
        path: &str,
    ) -> Result<Option<VertexId>, TreeError> {
        let mut current = id;
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            let _ = self.get_children(current).await?;
            match self.vertex(current)?.child_by_name(segment) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// The directory `id` lives in
    ///
    /// ROOT has no parent; a record without a parent link is a top level
    /// entry whose parent is ROOT. The parent is reached with the key its
    /// child stored for it, which is that directory's parent key: enough
    /// to read its name, not to list it.
    pub async fn retrieve_parent(&mut self, id: VertexId) -> Result<Option<VertexId>, TreeError> {
        let vertex = self.vertex(id)?;
        let Some(pointer) = vertex.pointer.as_ref() else {
            return Ok(None);
        };
        let Some(key) = vertex.parent_key().into_value() else {
            return Ok(None);
        };
        let Some(link) = pointer.record.parent(&key)? else {
            return Ok(Some(ROOT));
        };

        let owner_name = vertex.owner_name.clone();
        let entry_writer = vertex.entry_writer.clone();
        let location = Location::new(
            link.location.owner,
            entry_writer.public(),
            link.location.address,
        );
        if let Some(existing) = self.lookup(&location) {
            return Ok(Some(existing));
        }

        let descriptor = CapabilityDescriptor::new(
            link.location.owner,
            link.location.writer,
            link.location.address,
            link.parent_key,
        );
        self.retrieve(descriptor, owner_name, entry_writer)
            .await
            .map(Some)
    }

    /// Locations of `id`'s children, read from its record without fetching
    /// them
    pub fn children_locations(&self, id: VertexId) -> Result<Vec<Location>, TreeError> {
        let vertex = self.vertex(id)?;
        match vertex.pointer.as_ref() {
            None => vertex
                .children()
                .map(|child| {
                    self.vertex(child)?
                        .location()
                        .ok_or(TreeError::RootVertex)
                })
                .collect(),
            Some(pointer) => Ok(pointer
                .record
                .child_links(&pointer.descriptor.base_key)?
                .iter()
                .map(|link| *link.location())
                .collect()),
        }
    }

    /// Read a file's content back, repairing lost shards on the way
    pub async fn read_file<F>(&self, id: VertexId, progress: F) -> Result<Vec<u8>, TreeError>
    where
        F: FnMut(u64),
    {
        let vertex = self.vertex(id)?;
        let pointer = vertex.pointer.as_ref().ok_or(TreeError::RootVertex)?;
        let base_key = &pointer.descriptor.base_key;
        let retriever = pointer.record.retriever(base_key)?;
        let size = retriever.manifest().size;
        Ok(retriever
            .get_file(&self.session, base_key, size, progress)
            .await?)
    }

    pub fn to_link(&self, id: VertexId) -> Result<String, TreeError> {
        self.vertex(id)?.to_link()
    }
}

/// Names are non-empty and never contain a path separator
pub fn is_legal_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}
