//! Organization membership cleanup.

use crate::{
    errors::Result,
    indices::{organization_member_entry, organization_members_key},
    traits::{CacheInvalidator, IdentityResolver, MetadataProvider},
};
use tracing::debug;
use zero_users_storage::{KeyValueStore, Pipeline};

use super::{check_pipeline, UserRemovalService};

impl<R, M, C, S> UserRemovalService<R, M, C, S>
where
    R: IdentityResolver,
    M: MetadataProvider,
    C: CacheInvalidator,
    S: KeyValueStore,
{
    /// Organization ids listed in the user's organizations-audience metadata
    ///
    /// Only the field names are read; membership values are opaque. Not read
    /// atomically with the primary pipeline: a concurrent change to the
    /// user's organizations may be missed.
    pub(super) async fn user_organizations(&self, user_id: &str) -> Result<Vec<String>> {
        self.metadata
            .metadata_fields(user_id, &self.config.organizations_audience)
            .await
    }

    /// Drop the user's member entry from every listed organization
    pub(super) async fn remove_organization_memberships(
        &self,
        user_id: &str,
        organizations: &[String],
    ) -> Result<Vec<u64>> {
        if organizations.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = Pipeline::new();
        for organization_id in organizations {
            pipeline.zrem(
                organization_members_key(organization_id),
                organization_member_entry(organization_id, user_id),
            );
        }

        let results = self.storage.exec(&pipeline).await?;
        let removed = check_pipeline(&pipeline, results)?;

        debug!(
            "Removed user {} from {} organization(s)",
            user_id,
            organizations.len()
        );
        Ok(removed)
    }
}
