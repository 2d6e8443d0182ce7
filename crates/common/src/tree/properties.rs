use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute bit marking folders the client manages itself
pub const ATTR_SYSTEM: u32 = 1 << 0;

/// Name, size and timestamps of a file or directory
///
/// Stored encrypted in the record under the entry's parent key, so anyone
/// able to locate an entry from its parent can read its properties without
/// being able to list or read its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProperties {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub attributes: u32,
    pub thumbnail: Option<Vec<u8>>,
}

impl FileProperties {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        modified: DateTime<Utc>,
        attributes: u32,
        thumbnail: Option<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
            attributes,
            thumbnail,
        }
    }

    /// Properties reported for the synthetic session root
    pub fn root() -> Self {
        Self::new("/", 0, DateTime::<Utc>::MIN_UTC, 0, None)
    }

    /// Copy of these properties under a new name; nothing else changes
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn is_system(&self) -> bool {
        self.attributes & ATTR_SYSTEM != 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_with_name_keeps_other_fields() {
        let props = FileProperties::new("a.txt", 42, Utc::now(), ATTR_SYSTEM, Some(vec![1, 2, 3]));
        let renamed = props.with_name("b.txt");
        assert_eq!(renamed.name, "b.txt");
        assert_eq!(renamed.size, props.size);
        assert_eq!(renamed.modified, props.modified);
        assert_eq!(renamed.attributes, props.attributes);
        assert_eq!(renamed.thumbnail, props.thumbnail);
        assert!(renamed.is_system());
    }

    #[test]
    fn test_bincode_round_trip() {
        let props = FileProperties::new("notes", 0, Utc::now(), 0, None);
        let bytes = bincode::serialize(&props).unwrap();
        let decoded: FileProperties = bincode::deserialize(&bytes).unwrap();
        assert_eq!(props, decoded);
    }
}
