//! Primary removal pipeline: user record plus every directly keyed index.

use crate::{
    errors::Result,
    indices::{data_key, metadata_key, SecondaryIndexSet},
    traits::{CacheInvalidator, IdentityResolver, MetadataProvider},
    types::{RemovalConfig, UserRecord},
};
use tracing::debug;
use zero_users_storage::{KeyValueStore, Pipeline};

use super::{check_pipeline, UserRemovalService};

/// Build the primary removal pipeline for `record`
///
/// Order: lookup indices (alias, username, federated identities, listings),
/// then the data and metadata records, then token store and throttle
/// counters. Every command is a delete.
pub(crate) fn build_removal_pipeline(record: &UserRecord, config: &RemovalConfig) -> Pipeline {
    let indices = SecondaryIndexSet::from_config(config);
    let mut pipeline = Pipeline::new();

    for index in indices.lookups() {
        index.queue_removal(record, &mut pipeline);
    }

    pipeline
        .del(data_key(&record.id))
        .del(metadata_key(&record.id, &config.default_audience));

    for index in indices.owned() {
        index.queue_removal(record, &mut pipeline);
    }

    pipeline
}

impl<R, M, C, S> UserRemovalService<R, M, C, S>
where
    R: IdentityResolver,
    M: MetadataProvider,
    C: CacheInvalidator,
    S: KeyValueStore,
{
    /// Submit the primary pipeline and check every command result
    pub(super) async fn delete_cascade(&self, record: &UserRecord) -> Result<Vec<u64>> {
        let pipeline = build_removal_pipeline(record, &self.config);
        let results = self.storage.exec(&pipeline).await?;
        let removed = check_pipeline(&pipeline, results)?;

        debug!(
            "Primary pipeline for {}: {} commands, {} entries removed",
            record.id,
            removed.len(),
            removed.iter().sum::<u64>()
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SsoBinding, SsoProvider};
    use std::collections::BTreeMap;

    fn record(alias: Option<&str>, sso: &[(SsoProvider, &str)]) -> UserRecord {
        UserRecord {
            id: "42".to_string(),
            username: "bob@example.com".to_string(),
            alias: alias.map(str::to_string),
            sso: sso
                .iter()
                .map(|(provider, uid)| (*provider, SsoBinding { uid: uid.to_string() }))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn rendered(pipeline: &Pipeline) -> Vec<String> {
        pipeline.commands().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_full_pipeline_layout() {
        let pipeline = build_removal_pipeline(
            &record(Some("Bob"), &[(SsoProvider::Google, "g-123")]),
            &RemovalConfig::default(),
        );

        assert_eq!(
            rendered(&pipeline),
            vec![
                "HDEL users-alias bob Bob",
                "HDEL users-username bob@example.com",
                "HDEL users-sso-hash!google g-123",
                "SREM users-public 42",
                "SREM user-iterator-set 42",
                "DEL 42!data",
                "DEL 42!metadata!*.localhost",
                "DEL 42!tokens",
                "DEL throttle!activate!42",
                "DEL throttle!password!42",
                "DEL throttle!register!42",
                "DEL throttle!reset!42",
            ]
        );
    }

    #[test]
    fn test_absent_alias_and_bindings_skipped() {
        let pipeline = build_removal_pipeline(&record(None, &[]), &RemovalConfig::default());

        assert_eq!(pipeline.len(), 10);
        assert_eq!(rendered(&pipeline)[0], "HDEL users-username bob@example.com");
    }

    #[test]
    fn test_unconfigured_provider_ignored() {
        let config = RemovalConfig {
            sso_providers: vec![SsoProvider::Facebook],
            ..RemovalConfig::default()
        };
        let pipeline =
            build_removal_pipeline(&record(None, &[(SsoProvider::Google, "g-123")]), &config);

        assert!(!rendered(&pipeline).iter().any(|c| c.contains("users-sso-hash")));
    }
}
