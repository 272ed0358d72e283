//! User removal error types.

use thiserror::Error;
use zero_users_storage::StorageError;

/// User removal errors
#[derive(Debug, Error)]
pub enum RemovalError {
    /// Handle does not resolve to any user
    #[error("User not found: {0}")]
    NotFound(String),

    /// User holds a role that protects it from removal
    #[error("Can't remove protected user {user_id} (roles: {roles:?})")]
    Forbidden { user_id: String, roles: Vec<String> },

    /// A command inside a submitted pipeline failed
    #[error("Pipeline command #{index} `{command}` failed: {source}")]
    CommandFailed {
        index: usize,
        command: String,
        #[source]
        source: StorageError,
    },

    /// Stored record could not be interpreted
    #[error("Malformed record at {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    /// Federated identity provider name not recognised
    #[error("Unknown federated identity provider: {0}")]
    UnknownProvider(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RemovalError {
    /// Whether the caller is at fault (bad handle, protected user)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RemovalError::NotFound(_)
                | RemovalError::Forbidden { .. }
                | RemovalError::UnknownProvider(_)
        )
    }

    /// HTTP-style status classification
    pub fn status_code(&self) -> u16 {
        match self {
            RemovalError::NotFound(_) => 404,
            RemovalError::Forbidden { .. } | RemovalError::UnknownProvider(_) => 400,
            _ => 500,
        }
    }

    /// Whether running the whole removal again may succeed
    ///
    /// Store failures can leave some deletes applied; since every command is
    /// a delete, re-running the removal converges on the same end state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemovalError::CommandFailed { .. } | RemovalError::Storage(_)
        )
    }
}

/// Result type for user removal operations
pub type Result<T> = std::result::Result<T, RemovalError>;
