//! Storage trait definitions.

use crate::errors::{Result, StorageError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Outcome of a single pipelined command: number of entries removed
pub type CommandResult = Result<u64>;

/// Key-value store interface
///
/// This trait abstracts the underlying store (RocksDB) so that services can
/// be tested against wrappers that inject failures.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a single hash field
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Get every field of a hash. An absent key yields an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Set a hash field, returning `true` if the field was newly created
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// Add a member to a set, returning `true` if it was not present
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// Check set membership
    async fn sismember(&self, key: &str, member: &str) -> Result<bool>;

    /// List all members of a set
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Add a member to a sorted set with a score, returning `true` if new
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<bool>;

    /// Get the score of a sorted set member
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Set a scalar value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Get a scalar value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Check whether a key holds any structure
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Submit every command of a pipeline in one call
    ///
    /// The outer `Err` means the submission itself failed and nothing can be
    /// said about which commands were applied. Otherwise one result is
    /// returned per command, in order. Commands are applied independently:
    /// a failing command does not undo or prevent the others.
    async fn exec(&self, pipeline: &Pipeline) -> Result<Vec<CommandResult>>;
}

/// A single deletion command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Remove fields from a hash
    HDel { key: String, fields: Vec<String> },
    /// Remove members from a set
    SRem { key: String, members: Vec<String> },
    /// Remove members from a sorted set
    ZRem { key: String, members: Vec<String> },
    /// Delete a key of any kind
    Del { key: String },
}

impl Command {
    /// Key the command operates on
    pub fn key(&self) -> &str {
        match self {
            Command::HDel { key, .. }
            | Command::SRem { key, .. }
            | Command::ZRem { key, .. }
            | Command::Del { key } => key,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, key, args) = match self {
            Command::HDel { key, fields } => ("HDEL", key, fields.as_slice()),
            Command::SRem { key, members } => ("SREM", key, members.as_slice()),
            Command::ZRem { key, members } => ("ZREM", key, members.as_slice()),
            Command::Del { key } => ("DEL", key, &[][..]),
        };

        write!(f, "{} {}", name, key)?;
        for arg in args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Ordered list of commands submitted together
///
/// Batching saves round trips; it gives no atomicity guarantee across
/// commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue removal of hash fields
    pub fn hdel<I, F>(&mut self, key: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.commands.push(Command::HDel {
            key: key.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Queue removal of a set member
    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::SRem {
            key: key.into(),
            members: vec![member.into()],
        });
        self
    }

    /// Queue removal of a sorted set member
    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::ZRem {
            key: key.into(),
            members: vec![member.into()],
        });
        self
    }

    /// Queue deletion of a key
    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Del { key: key.into() });
        self
    }

    /// Queued commands, in submission order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<Command> for Pipeline {
    fn from_iter<T: IntoIterator<Item = Command>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

/// Helper function to serialize a key
pub(crate) fn serialize_key<K: Serialize>(key: &K) -> Result<Vec<u8>> {
    bincode::serialize(key).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Helper function to serialize a value
pub(crate) fn serialize_value<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Helper function to deserialize a value (or a composite key)
pub(crate) fn deserialize_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_preserves_order() {
        let mut pipeline = Pipeline::new();
        pipeline
            .hdel("users-alias", ["bob", "Bob"])
            .srem("users-public", "42")
            .del("42!data");

        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.commands()[0].key(), "users-alias");
        assert_eq!(pipeline.commands()[2], Command::Del { key: "42!data".to_string() });
    }

    #[test]
    fn test_command_display() {
        let mut pipeline = Pipeline::new();
        pipeline.hdel("users-alias", ["bob", "Bob"]).zrem("7!members", "7!members!42");

        let rendered: Vec<String> = pipeline.commands().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["HDEL users-alias bob Bob", "ZREM 7!members 7!members!42"]);
    }

    #[test]
    fn test_composite_key_shares_prefix() {
        let prefix = serialize_key(&"users-alias").unwrap();
        let full = serialize_key(&("users-alias", "bob")).unwrap();
        let other = serialize_key(&("users-alias-x", "bob")).unwrap();

        assert!(full.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }
}
