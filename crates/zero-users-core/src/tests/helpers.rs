//! Shared fixtures for service tests.

use crate::indices::*;
use crate::*;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zero_users_storage::{
    Command, CommandResult, KeyValueStore, Pipeline, RocksDbStorage, StorageError,
};

// Helper to create test storage
pub(super) fn create_test_storage() -> (Arc<RocksDbStorage>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = RocksDbStorage::open(temp_dir.path()).unwrap();
    (Arc::new(db), temp_dir)
}

// Helper to create a removal service over any store
pub(super) fn create_test_service<S: KeyValueStore + 'static>(
    storage: Arc<S>,
) -> StoreBackedRemoval<S> {
    UserRemovalService::with_store(storage, RemovalConfig::default())
}

/// User as registration would have written it
pub(super) struct SeedUser {
    pub id: String,
    pub username: String,
    pub alias: Option<String>,
    pub sso: Vec<(SsoProvider, String)>,
    pub roles: Vec<String>,
    pub organizations: Vec<String>,
}

impl SeedUser {
    pub fn new(username: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            alias: None,
            sso: Vec::new(),
            roles: Vec::new(),
            organizations: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn sso(mut self, provider: SsoProvider, uid: &str) -> Self {
        self.sso.push((provider, uid.to_string()));
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    pub fn organization(mut self, organization_id: &str) -> Self {
        self.organizations.push(organization_id.to_string());
        self
    }
}

// Write the user record and every index entry registration maintains
pub(super) async fn seed_user<S: KeyValueStore>(storage: &S, user: &SeedUser) {
    let config = RemovalConfig::default();
    let id = user.id.as_str();
    let data = data_key(id);

    storage.hset(&data, "id", id).await.unwrap();
    storage.hset(&data, "username", &user.username).await.unwrap();
    storage.hset(USERS_USERNAME_TO_ID, &user.username, id).await.unwrap();

    if let Some(alias) = &user.alias {
        storage.hset(&data, "alias", alias).await.unwrap();
        storage.hset(USERS_ALIAS_TO_ID, &alias.to_lowercase(), id).await.unwrap();
        storage.hset(USERS_ALIAS_TO_ID, alias, id).await.unwrap();
    }

    for (provider, uid) in &user.sso {
        let binding = json!({ "uid": uid, "email": user.username }).to_string();
        storage.hset(&data, provider.as_str(), &binding).await.unwrap();
        storage.hset(&sso_index_key(*provider), uid, id).await.unwrap();
    }

    storage.sadd(USERS_INDEX, id).await.unwrap();
    storage.sadd(USERS_PUBLIC_INDEX, id).await.unwrap();

    let metadata = metadata_key(id, &config.default_audience);
    storage.hset(&metadata, "roles", &json!(user.roles).to_string()).await.unwrap();
    storage.hset(&metadata, "created", &current_timestamp_millis().to_string()).await.unwrap();

    storage.hset(&tokens_key(id), "token-1", "1").await.unwrap();
    for action in ThrottleAction::ALL {
        storage.set(&throttle_key(action, id), "1").await.unwrap();
    }

    let organizations = metadata_key(id, &config.organizations_audience);
    for organization_id in &user.organizations {
        storage
            .hset(&organizations, organization_id, &json!({ "joinedAt": 1 }).to_string())
            .await
            .unwrap();
        storage
            .zadd(
                &organization_members_key(organization_id),
                1.0,
                &organization_member_entry(organization_id, id),
            )
            .await
            .unwrap();
    }
}

// Snapshot of every entry that references the user, for before/after comparisons
pub(super) async fn snapshot<S: KeyValueStore>(storage: &S, user: &SeedUser) -> Vec<String> {
    let config = RemovalConfig::default();
    let id = user.id.as_str();
    let mut state = Vec::new();

    let owned = [
        data_key(id),
        metadata_key(id, &config.default_audience),
        metadata_key(id, &config.organizations_audience),
        tokens_key(id),
    ];
    for key in owned {
        let mut entries: Vec<_> = storage.hgetall(&key).await.unwrap().into_iter().collect();
        entries.sort();
        state.push(format!("{key} {entries:?}"));
    }

    let mut lookups = vec![USERS_USERNAME_TO_ID.to_string(), USERS_ALIAS_TO_ID.to_string()];
    lookups.extend(SsoProvider::ALL.into_iter().map(sso_index_key));
    for index in lookups {
        let mut entries: Vec<_> = storage
            .hgetall(&index)
            .await
            .unwrap()
            .into_iter()
            .filter(|(_, value)| value == id)
            .collect();
        entries.sort();
        state.push(format!("{index} {entries:?}"));
    }

    for index in [USERS_INDEX, USERS_PUBLIC_INDEX] {
        let member = storage.sismember(index, id).await.unwrap();
        state.push(format!("{index} {member}"));
    }
    for action in ThrottleAction::ALL {
        let key = throttle_key(action, id);
        let value = storage.get(&key).await.unwrap();
        state.push(format!("{key} {value:?}"));
    }
    for organization_id in &user.organizations {
        let key = organization_members_key(organization_id);
        let score = storage
            .zscore(&key, &organization_member_entry(organization_id, id))
            .await
            .unwrap();
        state.push(format!("{key} {score:?}"));
    }

    state
}

// Assert that no structure still references the user
pub(super) async fn assert_user_gone<S: KeyValueStore>(storage: &S, user: &SeedUser) {
    let config = RemovalConfig::default();
    let id = user.id.as_str();

    assert!(storage.hgetall(&data_key(id)).await.unwrap().is_empty());
    assert!(storage
        .hgetall(&metadata_key(id, &config.default_audience))
        .await
        .unwrap()
        .is_empty());
    assert!(!storage.exists(&tokens_key(id)).await.unwrap());
    assert_eq!(storage.hget(USERS_USERNAME_TO_ID, &user.username).await.unwrap(), None);

    if let Some(alias) = &user.alias {
        assert_eq!(storage.hget(USERS_ALIAS_TO_ID, &alias.to_lowercase()).await.unwrap(), None);
        assert_eq!(storage.hget(USERS_ALIAS_TO_ID, alias).await.unwrap(), None);
    }
    for (provider, uid) in &user.sso {
        assert_eq!(storage.hget(&sso_index_key(*provider), uid).await.unwrap(), None);
    }

    assert!(!storage.sismember(USERS_INDEX, id).await.unwrap());
    assert!(!storage.sismember(USERS_PUBLIC_INDEX, id).await.unwrap());

    for action in ThrottleAction::ALL {
        assert!(!storage.exists(&throttle_key(action, id)).await.unwrap());
    }
    for organization_id in &user.organizations {
        let score = storage
            .zscore(
                &organization_members_key(organization_id),
                &organization_member_entry(organization_id, id),
            )
            .await
            .unwrap();
        assert_eq!(score, None, "still a member of {organization_id}");
    }
}

/// Store wrapper that simulates a connection dropping mid-pipeline
///
/// The first pipeline containing a command whose rendering starts with the
/// armed prefix applies every command before it; that command and all
/// following ones fail without being applied. The fault fires once.
pub(super) struct FailingStore {
    inner: Arc<RocksDbStorage>,
    armed: Mutex<Option<String>>,
    pipelines: Mutex<Vec<Vec<Command>>>,
}

impl FailingStore {
    pub fn new(inner: Arc<RocksDbStorage>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
            pipelines: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_at(&self, command_prefix: &str) {
        *self.armed.lock().unwrap() = Some(command_prefix.to_string());
    }

    /// Every pipeline submitted so far
    pub fn pipelines(&self) -> Vec<Vec<Command>> {
        self.pipelines.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn hget(&self, key: &str, field: &str) -> zero_users_storage::Result<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> zero_users_storage::Result<HashMap<String, String>> {
        self.inner.hgetall(key).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> zero_users_storage::Result<bool> {
        self.inner.hset(key, field, value).await
    }

    async fn sadd(&self, key: &str, member: &str) -> zero_users_storage::Result<bool> {
        self.inner.sadd(key, member).await
    }

    async fn sismember(&self, key: &str, member: &str) -> zero_users_storage::Result<bool> {
        self.inner.sismember(key, member).await
    }

    async fn smembers(&self, key: &str) -> zero_users_storage::Result<Vec<String>> {
        self.inner.smembers(key).await
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> zero_users_storage::Result<bool> {
        self.inner.zadd(key, score, member).await
    }

    async fn zscore(&self, key: &str, member: &str) -> zero_users_storage::Result<Option<f64>> {
        self.inner.zscore(key, member).await
    }

    async fn set(&self, key: &str, value: &str) -> zero_users_storage::Result<()> {
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> zero_users_storage::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> zero_users_storage::Result<bool> {
        self.inner.exists(key).await
    }

    async fn exec(&self, pipeline: &Pipeline) -> zero_users_storage::Result<Vec<CommandResult>> {
        self.pipelines
            .lock()
            .unwrap()
            .push(pipeline.commands().to_vec());

        let failing_from = {
            let mut armed = self.armed.lock().unwrap();
            let position = armed.as_ref().and_then(|prefix| {
                pipeline
                    .commands()
                    .iter()
                    .position(|command| command.to_string().starts_with(prefix.as_str()))
            });
            if position.is_some() {
                *armed = None;
            }
            position
        };

        let Some(failing_from) = failing_from else {
            return self.inner.exec(pipeline).await;
        };

        let applied: Pipeline = pipeline.commands()[..failing_from].iter().cloned().collect();
        let mut results = self.inner.exec(&applied).await?;
        for _ in failing_from..pipeline.len() {
            results.push(Err(StorageError::Connection(
                "connection reset by peer".to_string(),
            )));
        }
        Ok(results)
    }
}
