//! Shared test utilities for tree integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use common::crypto::SecretKey;
use common::store::MemoryStore;
use common::tree::{Session, Tree, TreeConfig, VertexId};

/// Route tree logs to the test harness, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Small chunks and shards so tests exercise multi-chunk content
pub fn test_config() -> TreeConfig {
    TreeConfig {
        chunk_size: 64,
        data_shards: 3,
        parity_shards: 2,
        ..TreeConfig::default()
    }
}

/// Set up a tree over a fresh in-memory store, with a home directory for
/// the session user hanging off the root
pub async fn setup_test_env() -> (Tree, VertexId, MemoryStore, SecretKey) {
    setup_with_config(test_config()).await
}

pub async fn setup_with_config(config: TreeConfig) -> (Tree, VertexId, MemoryStore, SecretKey) {
    init_tracing();
    let store = MemoryStore::new();
    let secret = SecretKey::generate();
    let session = Session::new("alice", secret.clone(), Arc::new(store.clone()));
    let mut tree = Tree::new(session, config).unwrap();
    let home = tree
        .create_root_directory("alice")
        .await
        .unwrap()
        .into_value()
        .unwrap();
    (tree, home, store, secret)
}

/// A second session over the same store
pub fn second_tree(store: &MemoryStore, username: &str, secret: SecretKey) -> Tree {
    let session = Session::new(username, secret, Arc::new(store.clone()));
    Tree::new(session, test_config()).unwrap()
}

pub async fn upload(tree: &mut Tree, dir: VertexId, name: &str, data: &[u8]) -> VertexId {
    tree.upload_file(dir, name, Cursor::new(data.to_vec()), |_| {})
        .await
        .unwrap()
        .into_value()
        .unwrap()
}

pub async fn mkdir(tree: &mut Tree, dir: VertexId, name: &str) -> VertexId {
    tree.mkdir(dir, name, None, false)
        .await
        .unwrap()
        .into_value()
        .unwrap()
}

/// Names of `dir`'s children after a fresh listing
pub async fn child_names(tree: &mut Tree, dir: VertexId) -> Vec<String> {
    let _ = tree.get_children(dir).await.unwrap();
    tree.vertex(dir)
        .unwrap()
        .child_names()
        .map(str::to_string)
        .collect()
}

pub fn name_of(tree: &Tree, id: VertexId) -> String {
    tree.vertex(id)
        .unwrap()
        .properties()
        .unwrap()
        .into_value()
        .unwrap()
        .name
}
