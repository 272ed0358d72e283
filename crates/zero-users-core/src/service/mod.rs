//! User removal service implementation.

mod cascade;
mod guard;
mod organizations;
mod pipeline;

pub use guard::AuthorizationGuard;
pub(crate) use pipeline::check_pipeline;

use crate::{
    cache::{next_timestamp, SortedViewCache},
    errors::Result,
    indices::{USERS_INDEX, USERS_PUBLIC_INDEX},
    resolver::{StoreIdentityResolver, StoreMetadataProvider},
    traits::*,
    types::*,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use zero_users_storage::KeyValueStore;

/// User removal service implementation
///
/// Holds no per-request state: everything it needs besides the injected
/// collaborators is in the removal configuration.
pub struct UserRemovalService<R, M, C, S>
where
    R: IdentityResolver,
    M: MetadataProvider,
    C: CacheInvalidator,
    S: KeyValueStore,
{
    pub(super) resolver: Arc<R>,
    pub(super) metadata: Arc<M>,
    pub(super) cache: Arc<C>,
    pub(super) storage: Arc<S>,
    pub(super) config: RemovalConfig,
    pub(super) guard: AuthorizationGuard,
}

/// Removal service with every collaborator backed by the same store
pub type StoreBackedRemoval<S> =
    UserRemovalService<StoreIdentityResolver<S>, StoreMetadataProvider<S>, SortedViewCache<S>, S>;

impl<R, M, C, S> UserRemovalService<R, M, C, S>
where
    R: IdentityResolver,
    M: MetadataProvider,
    C: CacheInvalidator,
    S: KeyValueStore,
{
    /// Create a new user removal service
    pub fn new(
        resolver: Arc<R>,
        metadata: Arc<M>,
        cache: Arc<C>,
        storage: Arc<S>,
        config: RemovalConfig,
    ) -> Self {
        let guard = AuthorizationGuard::new(&config.protected_roles);
        Self {
            resolver,
            metadata,
            cache,
            storage,
            config,
            guard,
        }
    }

    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Invalidate cached views of both listing indices with one timestamp
    ///
    /// Both signals are issued concurrently and both must be acknowledged.
    async fn invalidate_listing_caches(&self) -> Result<u64> {
        let now = next_timestamp();
        tokio::try_join!(
            self.cache.invalidate(USERS_INDEX, now),
            self.cache.invalidate(USERS_PUBLIC_INDEX, now),
        )?;
        Ok(now)
    }
}

impl<S: KeyValueStore + 'static> StoreBackedRemoval<S> {
    /// Wire the store-backed resolver, metadata provider and view cache
    pub fn with_store(storage: Arc<S>, config: RemovalConfig) -> Self {
        Self::new(
            Arc::new(StoreIdentityResolver::new(storage.clone())),
            Arc::new(StoreMetadataProvider::new(storage.clone())),
            Arc::new(SortedViewCache::new(storage.clone())),
            storage,
            config,
        )
    }
}

#[async_trait]
impl<R, M, C, S> UserRemoval for UserRemovalService<R, M, C, S>
where
    R: IdentityResolver + 'static,
    M: MetadataProvider + 'static,
    C: CacheInvalidator + 'static,
    S: KeyValueStore + 'static,
{
    async fn remove_user(&self, handle: &str) -> Result<RemovalReport> {
        let record = self.resolver.resolve(handle).await?;
        self.remove_record(&record).await
    }

    async fn remove_record(&self, record: &UserRecord) -> Result<RemovalReport> {
        info!("Removing user: {}", record.id);

        let metadata = self
            .metadata
            .get_metadata(&record.id, &self.config.default_audience)
            .await?;
        if let Err(e) = self.guard.check(&record.id, &metadata) {
            warn!("Refusing to remove user {}: {}", record.id, e);
            return Err(e);
        }

        // Captured before the primary pipeline: the organizations audience
        // may be the default audience, whose metadata is deleted below.
        let organizations = self.user_organizations(&record.id).await?;

        let results = self.delete_cascade(record).await.inspect_err(|e| {
            warn!("Primary removal of user {} failed: {}", record.id, e);
        })?;

        self.remove_organization_memberships(&record.id, &organizations)
            .await
            .inspect_err(|e| {
                warn!(
                    "User {} removed but organization cleanup failed: {}",
                    record.id, e
                );
            })?;

        let invalidated_at = self.invalidate_listing_caches().await?;

        info!(
            "User removed: {} ({} organizations)",
            record.id,
            organizations.len()
        );
        Ok(RemovalReport {
            user_id: record.id.clone(),
            results,
            organizations,
            invalidated_at,
        })
    }
}
