//! Registry client errors.

use thiserror::Error;

/// Errors talking to the npm registry token API.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Transport failure: DNS, connect, TLS or timeout
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// Credentials rejected (401/403)
    #[error("registry authentication failed: {0}")]
    AuthFailed(String),

    /// The addressed resource does not exist (404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("registry rejected request with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("invalid registry response: {0}")]
    Decode(String),

    /// The stored connection cannot be turned into a client
    #[error("invalid connection: {0}")]
    InvalidConnection(String),
}

/// Result type for registry calls.
pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if the registry reported the resource as absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Create an unreachable error.
    #[must_use]
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(RegistryError::unreachable("timeout").is_retryable());
        assert!(RegistryError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(RegistryError::Rejected { status: 429, body: String::new() }.is_retryable());
        assert!(!RegistryError::Rejected { status: 400, body: String::new() }.is_retryable());
        assert!(!RegistryError::NotFound("token".to_string()).is_retryable());
        assert!(!RegistryError::AuthFailed("401".to_string()).is_retryable());
    }

    #[test]
    fn test_not_found() {
        assert!(RegistryError::NotFound("abc".to_string()).is_not_found());
        assert!(!RegistryError::unreachable("abc").is_not_found());
    }
}
