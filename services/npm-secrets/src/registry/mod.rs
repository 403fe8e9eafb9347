//! npm registry token API collaborator.
//!
//! `RegistryClient` is the authenticated handle the engine calls;
//! `RegistryConnector` turns a stored connection into one. Building a client
//! never touches the network.

pub mod error;
pub mod http;
pub mod mock;

pub use error::{RegistryError, RegistryResult};
pub use http::{HttpConnector, HttpRegistryClient};
pub use mock::{MockConnector, MockRegistry};

use crate::connection::ConnectionConfig;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Scoping parameters for a new token.
pub struct TokenSettings<'a> {
    /// Password of the account the token is created for
    pub password: &'a SecretString,
    /// Whether the token may only read
    pub readonly: bool,
    /// Networks the token may be used from; empty means unrestricted
    pub cidr_whitelist: Vec<String>,
}

impl fmt::Debug for TokenSettings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("password", &"[REDACTED]")
            .field("readonly", &self.readonly)
            .field("cidr_whitelist", &self.cidr_whitelist)
            .finish()
    }
}

/// A token freshly minted by the registry.
pub struct CreatedToken {
    /// Opaque token handed to the credential consumer
    pub token: SecretString,
    /// Registry-side identifier used to delete the token
    pub id: String,
    /// Read-only flag as echoed by the registry
    pub readonly: bool,
    /// CIDR whitelist as echoed by the registry
    pub cidr_whitelist: Vec<String>,
}

impl fmt::Debug for CreatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedToken")
            .field("token", &"[REDACTED]")
            .field("id", &self.id)
            .field("readonly", &self.readonly)
            .field("cidr_whitelist", &self.cidr_whitelist)
            .finish()
    }
}

/// A token as listed by the registry. The token value itself is masked
/// upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    /// Registry-side identifier
    pub key: String,
    /// Masked token prefix
    #[serde(default)]
    pub token: String,
    /// Read-only flag
    #[serde(default)]
    pub readonly: bool,
    /// CIDR whitelist, if any
    #[serde(default)]
    pub cidr_whitelist: Option<Vec<String>>,
    /// Creation timestamp as reported by the registry
    #[serde(default)]
    pub created: Option<String>,
}

/// Authenticated handle to the registry's token API.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Name of the authenticated account.
    async fn whoami(&self) -> RegistryResult<String>;

    /// List the account's tokens.
    async fn list_tokens(&self) -> RegistryResult<Vec<TokenSummary>>;

    /// Mint a new token.
    async fn create_token(&self, settings: &TokenSettings<'_>) -> RegistryResult<CreatedToken>;

    /// Delete a token by its identifier. A missing token yields
    /// [`RegistryError::NotFound`].
    async fn delete_token(&self, id: &str) -> RegistryResult<()>;
}

/// Builds registry clients from connection configuration.
pub trait RegistryConnector: Send + Sync {
    /// Build a client for `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConnection`] when the configuration
    /// cannot describe a reachable registry.
    fn connect(&self, connection: &ConnectionConfig) -> RegistryResult<Arc<dyn RegistryClient>>;
}

/// Split a stored comma-separated CIDR whitelist into entries.
#[must_use]
pub fn parse_cidr_whitelist(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|cidr| !cidr.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr_whitelist() {
        assert!(parse_cidr_whitelist(None).is_empty());
        assert!(parse_cidr_whitelist(Some("")).is_empty());
        assert_eq!(
            parse_cidr_whitelist(Some("10.0.0.0/8, 192.168.0.0/16,,")),
            vec!["10.0.0.0/8", "192.168.0.0/16"]
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let password = SecretString::from("hunter2".to_string());
        let settings = TokenSettings {
            password: &password,
            readonly: true,
            cidr_whitelist: Vec::new(),
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));

        let created = CreatedToken {
            token: SecretString::from("npm_secret".to_string()),
            id: "abc".to_string(),
            readonly: false,
            cidr_whitelist: Vec::new(),
        };
        let debug = format!("{created:?}");
        assert!(!debug.contains("npm_secret"));
        assert!(debug.contains("abc"));
    }
}
