//! Store-backed identity resolution and metadata lookup.

use crate::{
    errors::{RemovalError, Result},
    indices::{data_key, metadata_key, USERS_ALIAS_TO_ID, USERS_USERNAME_TO_ID},
    traits::{IdentityResolver, MetadataProvider},
    types::{AudienceMetadata, UserRecord},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use zero_users_storage::KeyValueStore;

/// Resolves handles through the username and alias indices
pub struct StoreIdentityResolver<S: KeyValueStore> {
    storage: Arc<S>,
}

impl<S: KeyValueStore> StoreIdentityResolver<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Lookup order: username, lower-cased alias, then the handle as an id
    async fn fetch_user_id(&self, handle: &str) -> Result<Option<String>> {
        if let Some(id) = self.storage.hget(USERS_USERNAME_TO_ID, handle).await? {
            return Ok(Some(id));
        }

        if let Some(id) = self
            .storage
            .hget(USERS_ALIAS_TO_ID, &handle.to_lowercase())
            .await?
        {
            return Ok(Some(id));
        }

        if self.storage.exists(&data_key(handle)).await? {
            return Ok(Some(handle.to_string()));
        }

        Ok(None)
    }
}

#[async_trait]
impl<S: KeyValueStore + 'static> IdentityResolver for StoreIdentityResolver<S> {
    async fn resolve(&self, handle: &str) -> Result<UserRecord> {
        let user_id = self
            .fetch_user_id(handle)
            .await?
            .ok_or_else(|| RemovalError::NotFound(handle.to_string()))?;

        let fields = self.storage.hgetall(&data_key(&user_id)).await?;
        if fields.is_empty() {
            return Err(RemovalError::NotFound(handle.to_string()));
        }

        debug!("Resolved {} to user {}", handle, user_id);
        UserRecord::from_fields(&user_id, &fields)
    }
}

/// Reads `{id}!metadata!{audience}` hashes
pub struct StoreMetadataProvider<S: KeyValueStore> {
    storage: Arc<S>,
}

impl<S: KeyValueStore> StoreMetadataProvider<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: KeyValueStore + 'static> MetadataProvider for StoreMetadataProvider<S> {
    async fn get_metadata(&self, user_id: &str, audience: &str) -> Result<AudienceMetadata> {
        let key = metadata_key(user_id, audience);
        let raw = self.storage.hgetall(&key).await?;
        AudienceMetadata::from_fields(&key, raw)
    }

    async fn metadata_fields(&self, user_id: &str, audience: &str) -> Result<Vec<String>> {
        let raw = self.storage.hgetall(&metadata_key(user_id, audience)).await?;
        let mut fields: Vec<String> = raw.into_keys().collect();
        fields.sort();
        Ok(fields)
    }
}
