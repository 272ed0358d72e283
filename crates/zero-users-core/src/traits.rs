//! User removal trait definitions.

use crate::{errors::Result, types::*};
use async_trait::async_trait;

/// Resolves a handle (username, alias or id) to the canonical user record
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Fails with `RemovalError::NotFound` when nothing matches
    async fn resolve(&self, handle: &str) -> Result<UserRecord>;
}

/// Fetches audience-scoped user metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Metadata of `user_id` for `audience`; empty when none is stored
    async fn get_metadata(&self, user_id: &str, audience: &str) -> Result<AudienceMetadata>;

    /// Field names of the metadata of `user_id` for `audience`, sorted
    ///
    /// Values are not read or parsed.
    async fn metadata_fields(&self, user_id: &str, audience: &str) -> Result<Vec<String>>;
}

/// Cache layer holding sorted materializations of listing indices
///
/// Injected into the removal service so the cache backend can be swapped
/// without touching the removal flow.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Mark cached views of `index` stale as of `timestamp` (ms)
    ///
    /// Returns once the invalidation is acknowledged.
    async fn invalidate(&self, index: &str, timestamp: u64) -> Result<()>;
}

/// User removal subsystem trait
#[async_trait]
pub trait UserRemoval: Send + Sync {
    /// Remove the user a handle resolves to, along with every index entry
    async fn remove_user(&self, handle: &str) -> Result<RemovalReport>;

    /// Remove an already resolved user
    ///
    /// Safe to call again with the same record after a failure or after a
    /// completed removal; every step is a delete.
    async fn remove_record(&self, record: &UserRecord) -> Result<RemovalReport>;
}
