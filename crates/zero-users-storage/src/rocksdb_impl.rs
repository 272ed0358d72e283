//! RocksDB storage implementation.

use crate::{
    column_families::{all_column_families, CF_HASHES, CF_SETS, CF_STRINGS, CF_ZSETS},
    errors::{Result, StorageError},
    traits::{
        deserialize_value, serialize_key, serialize_value, Command, CommandResult, KeyValueStore,
        Pipeline,
    },
};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::{collections::HashMap, path::Path, sync::Arc};
use tracing::debug;

/// RocksDB storage implementation
pub struct RocksDbStorage {
    db: Arc<DB>,
}

impl RocksDbStorage {
    /// Open RocksDB database at the specified path
    ///
    /// Creates all required column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, &path, all_column_families())
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!("Opened RocksDB at {:?}", path.as_ref());

        Ok(Self { db: Arc::new(db) })
    }

    /// Open a database in a fresh temporary directory
    ///
    /// The directory is removed when the returned `TempDir` is dropped, so
    /// callers must keep it alive for as long as the storage is used.
    pub fn open_test() -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::TempDir::new().map_err(StorageError::IoError)?;
        let storage = Self::open(temp_dir.path())?;
        Ok((storage, temp_dir))
    }

    /// Get column family handle
    fn cf_handle(&self, cf: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
    }

    /// All `(member, raw value)` entries stored under a logical key
    fn scan_entries(&self, cf: &str, key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let cf_handle = self.cf_handle(cf)?;
        let prefix_bytes = serialize_key(&key)?;

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf_handle, IteratorMode::From(&prefix_bytes, Direction::Forward));

        for item in iter {
            let (raw_key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;

            // Keys are sorted, so once we're past the prefix, we're done
            if !raw_key.starts_with(&prefix_bytes) {
                break;
            }

            let (_, member): (String, String) = deserialize_value(&raw_key)?;
            results.push((member, value.to_vec()));
        }

        Ok(results)
    }

    fn read(&self, cf: &str, key_bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf_handle = self.cf_handle(cf)?;
        self.db
            .get_cf(cf_handle, key_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn write_one(&self, cf: &str, key_bytes: &[u8], value_bytes: &[u8]) -> Result<()> {
        let cf_handle = self.cf_handle(cf)?;
        self.db
            .put_cf(cf_handle, key_bytes, value_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Remove the given members of one logical key, counting those present
    fn remove_members(&self, cf: &str, key: &str, members: &[String]) -> CommandResult {
        let cf_handle = self.cf_handle(cf)?;
        let mut write_batch = WriteBatch::default();
        let mut removed = 0;

        for member in members {
            let key_bytes = serialize_key(&(key, member.as_str()))?;
            if self.read(cf, &key_bytes)?.is_some() {
                removed += 1;
            }
            write_batch.delete_cf(cf_handle, &key_bytes);
        }

        self.db
            .write(write_batch)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(removed)
    }

    /// Delete a logical key from every column family
    fn delete_key(&self, key: &str) -> CommandResult {
        let mut write_batch = WriteBatch::default();
        let mut existed = false;

        for cf in [CF_HASHES, CF_SETS, CF_ZSETS] {
            let cf_handle = self.cf_handle(cf)?;
            for (member, _) in self.scan_entries(cf, key)? {
                existed = true;
                write_batch.delete_cf(cf_handle, serialize_key(&(key, member.as_str()))?);
            }
        }

        let scalar_key = serialize_key(&key)?;
        if self.read(CF_STRINGS, &scalar_key)?.is_some() {
            existed = true;
            write_batch.delete_cf(self.cf_handle(CF_STRINGS)?, &scalar_key);
        }

        self.db
            .write(write_batch)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(u64::from(existed))
    }

    fn apply(&self, command: &Command) -> CommandResult {
        match command {
            Command::HDel { key, fields } => self.remove_members(CF_HASHES, key, fields),
            Command::SRem { key, members } => self.remove_members(CF_SETS, key, members),
            Command::ZRem { key, members } => self.remove_members(CF_ZSETS, key, members),
            Command::Del { key } => self.delete_key(key),
        }
    }
}

#[async_trait]
impl KeyValueStore for RocksDbStorage {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let key_bytes = serialize_key(&(key, field))?;
        match self.read(CF_HASHES, &key_bytes)? {
            Some(bytes) => Ok(Some(deserialize_value(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.scan_entries(CF_HASHES, key)?
            .into_iter()
            .map(|(field, bytes)| Ok((field, deserialize_value(&bytes)?)))
            .collect()
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let key_bytes = serialize_key(&(key, field))?;
        let created = self.read(CF_HASHES, &key_bytes)?.is_none();
        self.write_one(CF_HASHES, &key_bytes, &serialize_value(&value)?)?;
        Ok(created)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let key_bytes = serialize_key(&(key, member))?;
        let created = self.read(CF_SETS, &key_bytes)?.is_none();
        self.write_one(CF_SETS, &key_bytes, &serialize_value(&())?)?;
        Ok(created)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let key_bytes = serialize_key(&(key, member))?;
        Ok(self.read(CF_SETS, &key_bytes)?.is_some())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .scan_entries(CF_SETS, key)?
            .into_iter()
            .map(|(member, _)| member)
            .collect())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<bool> {
        let key_bytes = serialize_key(&(key, member))?;
        let created = self.read(CF_ZSETS, &key_bytes)?.is_none();
        self.write_one(CF_ZSETS, &key_bytes, &serialize_value(&score)?)?;
        Ok(created)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let key_bytes = serialize_key(&(key, member))?;
        match self.read(CF_ZSETS, &key_bytes)? {
            Some(bytes) => Ok(Some(deserialize_value(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write_one(CF_STRINGS, &serialize_key(&key)?, &serialize_value(&value)?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.read(CF_STRINGS, &serialize_key(&key)?)? {
            Some(bytes) => Ok(Some(deserialize_value(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if self.read(CF_STRINGS, &serialize_key(&key)?)?.is_some() {
            return Ok(true);
        }

        for cf in [CF_HASHES, CF_SETS, CF_ZSETS] {
            if !self.scan_entries(cf, key)?.is_empty() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn exec(&self, pipeline: &Pipeline) -> Result<Vec<CommandResult>> {
        let results: Vec<CommandResult> = pipeline
            .commands()
            .iter()
            .map(|command| self.apply(command))
            .collect();

        debug!(
            commands = pipeline.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "Pipeline executed"
        );
        Ok(results)
    }
}
