use serde::{Deserialize, Serialize};

use erasure::codec::{ErasureCodec, ErasureError};

/// Default plaintext bytes per stored chunk (5 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;
pub const DEFAULT_DATA_SHARDS: usize = 4;
pub const DEFAULT_PARITY_SHARDS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("erasure parameters: {0}")]
    Erasure(#[from] ErasureError),
}

/// How name collisions are checked before structural mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionCheck {
    /// Trust the destination's cached child names. A stale cache can hide a
    /// collision with a concurrent writer's entry.
    #[default]
    Cached,
    /// Re-fetch the destination's children before checking
    Refresh,
}

/// Tunables for a [`Tree`](super::Tree)
///
/// ```toml
/// collision_check = "refresh"
/// chunk_size = 1048576
/// data_shards = 6
/// parity_shards = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default)]
    pub collision_check: CollisionCheck,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_data_shards")]
    pub data_shards: usize,
    #[serde(default = "default_parity_shards")]
    pub parity_shards: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_data_shards() -> usize {
    DEFAULT_DATA_SHARDS
}

fn default_parity_shards() -> usize {
    DEFAULT_PARITY_SHARDS
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            collision_check: CollisionCheck::default(),
            chunk_size: default_chunk_size(),
            data_shards: default_data_shards(),
            parity_shards: default_parity_shards(),
        }
    }
}

impl TreeConfig {
    /// Parse and validate a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        self.codec()?;
        Ok(())
    }

    /// Erasure codec for the configured shard layout
    pub fn codec(&self) -> Result<ErasureCodec, ErasureError> {
        ErasureCodec::new(self.data_shards, self.parity_shards)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = TreeConfig::from_toml_str("").unwrap();
        assert_eq!(config, TreeConfig::default());
        assert_eq!(config.collision_check, CollisionCheck::Cached);
    }

    #[test]
    fn test_parse_overrides() {
        let config = TreeConfig::from_toml_str(
            r#"
            collision_check = "refresh"
            chunk_size = 1024
            data_shards = 6
            parity_shards = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.collision_check, CollisionCheck::Refresh);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.codec().unwrap().total_shards(), 9);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            TreeConfig::from_toml_str("chunk_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TreeConfig::from_toml_str("data_shards = 0"),
            Err(ConfigError::Erasure(_))
        ));
        assert!(matches!(
            TreeConfig::from_toml_str("collision_check = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = TreeConfig {
            collision_check: CollisionCheck::Refresh,
            ..TreeConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"refresh\""));
        let decoded: TreeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, decoded);
    }
}
