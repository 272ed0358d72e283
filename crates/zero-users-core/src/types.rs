//! User removal type definitions.

use crate::errors::{RemovalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Data record field holding the stable identifier
pub const USERS_ID_FIELD: &str = "id";

/// Data record field holding the canonical username
pub const USERS_USERNAME_FIELD: &str = "username";

/// Data record field holding the optional alias
pub const USERS_ALIAS_FIELD: &str = "alias";

/// Metadata field holding the role list
pub const USERS_ROLES_FIELD: &str = "roles";

/// Administrator role
pub const USERS_ADMIN_ROLE: &str = "admin";

/// Super-administrator role
pub const USERS_SUPER_ADMIN_ROLE: &str = "super-admin";

/// Federated identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsoProvider {
    Facebook,
    Google,
    Apple,
}

impl SsoProvider {
    /// Every supported provider
    pub const ALL: [SsoProvider; 3] = [SsoProvider::Facebook, SsoProvider::Google, SsoProvider::Apple];

    /// Name used both as data record field and index key segment
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoProvider::Facebook => "facebook",
            SsoProvider::Google => "google",
            SsoProvider::Apple => "apple",
        }
    }
}

impl std::fmt::Display for SsoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SsoProvider {
    type Err = RemovalError;

    fn from_str(s: &str) -> Result<Self> {
        SsoProvider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| RemovalError::UnknownProvider(s.to_string()))
    }
}

/// Throttled user action with its own rate-limit counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleAction {
    Activate,
    Password,
    Register,
    Reset,
}

impl ThrottleAction {
    /// Every throttled action
    pub const ALL: [ThrottleAction; 4] = [
        ThrottleAction::Activate,
        ThrottleAction::Password,
        ThrottleAction::Register,
        ThrottleAction::Reset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleAction::Activate => "activate",
            ThrottleAction::Password => "password",
            ThrottleAction::Register => "register",
            ThrottleAction::Reset => "reset",
        }
    }
}

/// Binding of a user to an account at a federated identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoBinding {
    /// Provider-specific unique id
    pub uid: String,
}

/// Canonical user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub alias: Option<String>,
    pub sso: BTreeMap<SsoProvider, SsoBinding>,
}

impl UserRecord {
    /// Build a record from the fields of its data hash
    ///
    /// `id` is the identifier the record was found under; it is used when the
    /// hash carries no `id` field of its own.
    pub fn from_fields(id: &str, fields: &HashMap<String, String>) -> Result<Self> {
        let malformed = |reason: String| RemovalError::MalformedRecord {
            key: id.to_string(),
            reason,
        };

        let username = fields
            .get(USERS_USERNAME_FIELD)
            .cloned()
            .ok_or_else(|| malformed("missing username".to_string()))?;

        let mut sso = BTreeMap::new();
        for provider in SsoProvider::ALL {
            if let Some(raw) = fields.get(provider.as_str()) {
                let binding: SsoBinding = serde_json::from_str(raw)
                    .map_err(|e| malformed(format!("invalid {} binding: {}", provider, e)))?;
                sso.insert(provider, binding);
            }
        }

        Ok(Self {
            id: fields
                .get(USERS_ID_FIELD)
                .cloned()
                .unwrap_or_else(|| id.to_string()),
            username,
            alias: fields
                .get(USERS_ALIAS_FIELD)
                .filter(|alias| !alias.is_empty())
                .cloned(),
            sso,
        })
    }

    /// Provider uid the user is bound to, if any
    pub fn sso_uid(&self, provider: SsoProvider) -> Option<&str> {
        self.sso.get(&provider).map(|binding| binding.uid.as_str())
    }

    /// Alias index fields to clear: lower-cased and original spelling
    pub fn alias_fields(&self) -> Vec<String> {
        let Some(alias) = &self.alias else {
            return Vec::new();
        };

        let lower = alias.to_lowercase();
        if lower == *alias {
            vec![lower]
        } else {
            vec![lower, alias.clone()]
        }
    }
}

/// Metadata of one user for one audience
///
/// Field values are JSON documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceMetadata {
    pub fields: BTreeMap<String, Value>,
}

impl AudienceMetadata {
    /// Parse the raw fields of a metadata hash
    pub fn from_fields(key: &str, raw: HashMap<String, String>) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (field, value) in raw {
            let parsed = serde_json::from_str(&value).map_err(|e| RemovalError::MalformedRecord {
                key: key.to_string(),
                reason: format!("field {}: {}", field, e),
            })?;
            fields.insert(field, parsed);
        }
        Ok(Self { fields })
    }

    /// Roles granted in this audience; a missing list means none
    pub fn roles(&self) -> Vec<String> {
        match self.fields.get(USERS_ROLES_FIELD) {
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(|role| role.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Field names, e.g. organization ids for the organizations audience
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Removal configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Audience whose metadata carries the user's roles
    pub default_audience: String,

    /// Audience whose metadata lists the user's organizations
    pub organizations_audience: String,

    /// Federated identity providers whose indices are maintained
    pub sso_providers: Vec<SsoProvider>,

    /// Actions with per-user throttle counters
    pub throttle_actions: Vec<ThrottleAction>,

    /// Roles that protect a user from removal
    pub protected_roles: Vec<String>,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            default_audience: "*.localhost".to_string(),
            organizations_audience: "*.organizations".to_string(),
            sso_providers: SsoProvider::ALL.to_vec(),
            throttle_actions: ThrottleAction::ALL.to_vec(),
            protected_roles: vec![
                USERS_ADMIN_ROLE.to_string(),
                USERS_SUPER_ADMIN_ROLE.to_string(),
            ],
        }
    }
}

/// Result of a completed removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub user_id: String,
    /// Entries removed by each command of the primary pipeline, in order
    pub results: Vec<u64>,
    /// Organizations the user was unlinked from
    pub organizations: Vec<String>,
    /// Timestamp both listing caches were invalidated with
    pub invalidated_at: u64,
}

/// Current timestamp in milliseconds since the Unix epoch
pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
