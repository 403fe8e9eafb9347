//! Engine error types.
//!
//! Every failure surfaced to the host maps to one variant here. Nothing in
//! this crate retries; `is_retryable` tells the host which failures are worth
//! retrying on its own schedule.

use crate::registry::RegistryError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors returned by backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Malformed or invalid request input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A required request field is absent or empty
    #[error("missing {0}")]
    MissingField(&'static str),

    /// No connection has been configured yet
    #[error("connection is not configured")]
    NotConfigured,

    /// The registry could not be reached or answered with a server error
    #[error("registry unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The registry rejected the configured credentials
    #[error("registry authentication failed: {0}")]
    UpstreamAuthFailed(String),

    /// Credential requested for a role that does not exist
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// The registry refused or failed to mint a token
    #[error("failed to create a new token: {0}")]
    UpstreamTokenCreationFailed(#[source] RegistryError),

    /// Lease data handed back by the host does not carry what revoke needs
    #[error("malformed secret: {0}")]
    MalformedSecret(String),

    /// Deleting the upstream token failed for a reason other than absence
    #[error("could not delete token: {0}")]
    UpstreamRevokeFailed(#[source] RegistryError),

    /// No handler for this operation on this path
    #[error("unsupported operation '{operation}' on path '{path}'")]
    UnsupportedOperation {
        /// Requested operation
        operation: String,
        /// Requested path
        path: String,
    },

    /// Storage collaborator failure
    #[error("storage error while trying to {context}: {source}")]
    Storage {
        /// The engine step that hit the failure
        context: &'static str,
        /// Underlying storage error
        #[source]
        source: StorageError,
    },

    /// Stored or outgoing JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Process configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Check if the host may retry the failed operation later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnreachable(_) | Self::UpstreamRevokeFailed(_) | Self::Storage { .. }
        )
    }

    /// Check if the error is the caller's to fix.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::MissingField(_)
                | Self::NotConfigured
                | Self::UnknownRole(_)
                | Self::UnsupportedOperation { .. }
        )
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a malformed secret error.
    #[must_use]
    pub fn malformed_secret(msg: impl Into<String>) -> Self {
        Self::MalformedSecret(msg.into())
    }

    /// Wrap a storage error with the step that hit it.
    #[must_use]
    pub const fn storage(context: &'static str, source: StorageError) -> Self {
        Self::Storage { context, source }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Connection-level registry failures: building a client or verifying it.
impl From<RegistryError> for BackendError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AuthFailed(msg) => Self::UpstreamAuthFailed(msg),
            RegistryError::InvalidConnection(msg) => Self::Validation(msg),
            other => Self::UpstreamUnreachable(other.to_string()),
        }
    }
}
