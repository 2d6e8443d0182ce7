use super::keys::{PublicKey, SecretKey};

/// An identity as seen by the local session
///
/// Every identity is known by its public key. Only identities whose signing
/// key is held locally are [`Owned`](Identity::Owned), and only those can
/// commit records: the store rejects writes not signed by the location's
/// writer.
#[derive(Debug, Clone)]
pub enum Identity {
    /// Someone else's identity, or our own without the private half
    Public(PublicKey),
    /// An identity we hold the signing key for
    Owned(SecretKey),
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.public() == other.public()
    }
}

impl Eq for Identity {}

impl From<PublicKey> for Identity {
    fn from(key: PublicKey) -> Self {
        Identity::Public(key)
    }
}

impl From<SecretKey> for Identity {
    fn from(key: SecretKey) -> Self {
        Identity::Owned(key)
    }
}

impl Identity {
    pub fn public(&self) -> PublicKey {
        match self {
            Identity::Public(key) => *key,
            Identity::Owned(secret) => secret.public(),
        }
    }

    /// Whether records written under this identity can be committed locally
    pub fn is_writable(&self) -> bool {
        matches!(self, Identity::Owned(_))
    }

    /// The signing key, if held
    pub fn secret(&self) -> Option<&SecretKey> {
        match self {
            Identity::Public(_) => None,
            Identity::Owned(secret) => Some(secret),
        }
    }

    /// Forget the signing key
    pub fn to_public(&self) -> Identity {
        Identity::Public(self.public())
    }
}
