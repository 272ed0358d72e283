use anyhow::{Context, Result};
use std::path::PathBuf;
use zero_users_core::{RemovalConfig, SsoProvider};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to RocksDB database
    pub database_path: PathBuf,

    /// Removal settings passed to the service
    pub removal: RemovalConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = RemovalConfig::default();

        let database_path = lookup("DATABASE_PATH")
            .unwrap_or_else(|| "./data/zero-users.db".to_string())
            .into();

        let default_audience = lookup("DEFAULT_AUDIENCE").unwrap_or(defaults.default_audience);

        let organizations_audience =
            lookup("ORGANIZATIONS_AUDIENCE").unwrap_or(defaults.organizations_audience);

        let sso_providers = match lookup("SSO_PROVIDERS") {
            Some(raw) => split_list(&raw)
                .map(|name| name.parse::<SsoProvider>())
                .collect::<Result<Vec<_>, _>>()
                .context("invalid SSO_PROVIDERS")?,
            None => defaults.sso_providers,
        };

        let protected_roles = match lookup("PROTECTED_ROLES") {
            Some(raw) => split_list(&raw).map(str::to_string).collect(),
            None => defaults.protected_roles,
        };

        if protected_roles.is_empty() {
            anyhow::bail!("PROTECTED_ROLES must name at least one role");
        }

        Ok(Config {
            database_path,
            removal: RemovalConfig {
                default_audience,
                organizations_audience,
                sso_providers,
                throttle_actions: defaults.throttle_actions,
                protected_roles,
            },
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}
