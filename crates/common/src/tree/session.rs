use std::sync::Arc;

use crate::crypto::{Identity, PublicKey};
use crate::store::Store;

/// The local user and the store they talk to
///
/// Passed to every record operation that does network I/O. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Session {
    username: String,
    identity: Identity,
    store: Arc<dyn Store>,
}

impl Session {
    pub fn new(
        username: impl Into<String>,
        identity: impl Into<Identity>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            username: username.into(),
            identity: identity.into(),
            store,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Public key records created by this session are owned by
    pub fn owner(&self) -> PublicKey {
        self.identity.public()
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}
