use crate::crypto::{PublicKey, SymmetricKey};

use super::location::CapabilityDescriptor;
use super::properties::FileProperties;
use super::record::{MetadataRecord, RecordError};
use super::session::Session;

/// A capability together with the record it opens
///
/// Two pointers are equal when their capabilities are; the record is a
/// fetched copy and may lag the store.
#[derive(Debug, Clone)]
pub struct RetrievedPointer {
    pub descriptor: CapabilityDescriptor,
    pub record: MetadataRecord,
}

impl PartialEq for RetrievedPointer {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl Eq for RetrievedPointer {}

impl RetrievedPointer {
    pub fn new(descriptor: CapabilityDescriptor, record: MetadataRecord) -> Self {
        Self { descriptor, record }
    }

    /// Fetch the record a capability points at
    pub async fn retrieve(
        session: &Session,
        descriptor: CapabilityDescriptor,
    ) -> Result<Self, RecordError> {
        let record = MetadataRecord::fetch(session, &descriptor.location()).await?;
        Ok(Self { descriptor, record })
    }

    /// Same record, committed under another writer from now on
    pub fn with_writer(self, writer: PublicKey) -> Self {
        Self {
            descriptor: self.descriptor.with_writer(writer),
            record: self.record,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.record.is_directory()
    }

    pub fn parent_key(&self) -> Result<SymmetricKey, RecordError> {
        self.record.parent_key(&self.descriptor.base_key)
    }

    /// Properties, read under the parent key
    pub fn properties(&self) -> Result<FileProperties, RecordError> {
        self.record.properties(&self.parent_key()?)
    }
}
