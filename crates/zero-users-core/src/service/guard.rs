//! Protection of privileged users against removal.

use crate::{
    errors::{RemovalError, Result},
    types::AudienceMetadata,
};
use std::collections::BTreeSet;

/// Rejects removal of users holding a protected role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGuard {
    protected_roles: BTreeSet<String>,
}

impl AuthorizationGuard {
    pub fn new<I, R>(protected_roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        Self {
            protected_roles: protected_roles
                .into_iter()
                .map(|role| role.as_ref().to_string())
                .collect(),
        }
    }

    /// Check the user's default-audience metadata
    ///
    /// Fails with `Forbidden` listing the protected roles the user holds.
    pub fn check(&self, user_id: &str, metadata: &AudienceMetadata) -> Result<()> {
        let held: BTreeSet<String> = metadata
            .roles()
            .into_iter()
            .filter(|role| self.protected_roles.contains(role))
            .collect();

        if held.is_empty() {
            return Ok(());
        }

        Err(RemovalError::Forbidden {
            user_id: user_id.to_string(),
            roles: held.into_iter().collect(),
        })
    }
}
