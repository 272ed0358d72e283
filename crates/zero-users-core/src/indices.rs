//! Store key layout and the set of secondary indices kept per user.
//!
//! Keys are segments joined with `!`, e.g. `42!metadata!*.localhost`.

use crate::types::{RemovalConfig, SsoProvider, ThrottleAction, UserRecord};
use zero_users_storage::Pipeline;

/// Global listing: set of every user id
pub const USERS_INDEX: &str = "user-iterator-set";

/// Public listing: set of publicly visible user ids
pub const USERS_PUBLIC_INDEX: &str = "users-public";

/// Alias index: alias → id
pub const USERS_ALIAS_TO_ID: &str = "users-alias";

/// Username index: username → id
pub const USERS_USERNAME_TO_ID: &str = "users-username";

/// Federated identity index prefix: `users-sso-hash!{provider}` maps uid → id
pub const USERS_SSO_TO_ID: &str = "users-sso-hash";

/// Primary data record suffix
pub const USERS_DATA: &str = "data";

/// Audience metadata suffix
pub const USERS_METADATA: &str = "metadata";

/// Session token store suffix
pub const USERS_TOKENS: &str = "tokens";

/// Throttle counter prefix
pub const THROTTLE_PREFIX: &str = "throttle";

/// Organization membership suffix
pub const ORGANIZATIONS_MEMBERS: &str = "members";

/// Separator between key segments
pub const KEY_SEPARATOR: &str = "!";

/// Join key segments
pub fn key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

/// `{id}!data`
pub fn data_key(user_id: &str) -> String {
    key(&[user_id, USERS_DATA])
}

/// `{id}!metadata!{audience}`
pub fn metadata_key(user_id: &str, audience: &str) -> String {
    key(&[user_id, USERS_METADATA, audience])
}

/// `{id}!tokens`
pub fn tokens_key(user_id: &str) -> String {
    key(&[user_id, USERS_TOKENS])
}

/// `users-sso-hash!{provider}`
pub fn sso_index_key(provider: SsoProvider) -> String {
    key(&[USERS_SSO_TO_ID, provider.as_str()])
}

/// `throttle!{action}!{id}`
pub fn throttle_key(action: ThrottleAction, user_id: &str) -> String {
    key(&[THROTTLE_PREFIX, action.as_str(), user_id])
}

/// `{org}!members`: sorted set of the organization's member entries
pub fn organization_members_key(organization_id: &str) -> String {
    key(&[organization_id, ORGANIZATIONS_MEMBERS])
}

/// `{org}!members!{id}`: member entry of a user inside an organization
pub fn organization_member_entry(organization_id: &str, user_id: &str) -> String {
    key(&[organization_id, ORGANIZATIONS_MEMBERS, user_id])
}

/// A store structure that references a user id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryIndex {
    /// alias → id hash
    Alias,
    /// username → id hash
    Username,
    /// provider uid → id hash
    FederatedIdentity(SsoProvider),
    /// set of public ids
    PublicListing,
    /// set of all ids
    GlobalListing,
    /// per-user token store
    SessionTokens,
    /// per-user, per-action rate-limit counter
    Throttle(ThrottleAction),
}

impl SecondaryIndex {
    /// Queue the command that drops `record` from this index
    ///
    /// Indices the record has no entry in (no alias, no binding for the
    /// provider) queue nothing.
    pub fn queue_removal(&self, record: &UserRecord, pipeline: &mut Pipeline) {
        match self {
            SecondaryIndex::Alias => {
                let fields = record.alias_fields();
                if !fields.is_empty() {
                    pipeline.hdel(USERS_ALIAS_TO_ID, fields);
                }
            }
            SecondaryIndex::Username => {
                pipeline.hdel(USERS_USERNAME_TO_ID, [record.username.as_str()]);
            }
            SecondaryIndex::FederatedIdentity(provider) => {
                if let Some(uid) = record.sso_uid(*provider) {
                    pipeline.hdel(sso_index_key(*provider), [uid]);
                }
            }
            SecondaryIndex::PublicListing => {
                pipeline.srem(USERS_PUBLIC_INDEX, record.id.as_str());
            }
            SecondaryIndex::GlobalListing => {
                pipeline.srem(USERS_INDEX, record.id.as_str());
            }
            SecondaryIndex::SessionTokens => {
                pipeline.del(tokens_key(&record.id));
            }
            SecondaryIndex::Throttle(action) => {
                pipeline.del(throttle_key(*action, &record.id));
            }
        }
    }
}

/// Every secondary index directly keyed by a user, for one configuration
///
/// Organization membership sets are keyed by organization and are cleaned
/// in a separate pass, so they are not part of this set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndexSet {
    lookups: Vec<SecondaryIndex>,
    owned: Vec<SecondaryIndex>,
}

impl SecondaryIndexSet {
    pub fn from_config(config: &RemovalConfig) -> Self {
        let mut lookups = vec![SecondaryIndex::Alias, SecondaryIndex::Username];
        lookups.extend(
            config
                .sso_providers
                .iter()
                .map(|provider| SecondaryIndex::FederatedIdentity(*provider)),
        );
        lookups.push(SecondaryIndex::PublicListing);
        lookups.push(SecondaryIndex::GlobalListing);

        let mut owned = vec![SecondaryIndex::SessionTokens];
        owned.extend(
            config
                .throttle_actions
                .iter()
                .map(|action| SecondaryIndex::Throttle(*action)),
        );

        Self { lookups, owned }
    }

    /// Indices that resolve some natural key or listing to the user
    pub fn lookups(&self) -> &[SecondaryIndex] {
        &self.lookups
    }

    /// Structures owned by the user and deleted as a whole
    pub fn owned(&self) -> &[SecondaryIndex] {
        &self.owned
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecondaryIndex> {
        self.lookups.iter().chain(self.owned.iter())
    }
}
