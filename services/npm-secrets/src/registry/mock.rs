//! In-process registry for tests and local runs.
//!
//! Tokens live in a map keyed by id; every call is recorded so tests can
//! assert on what reached the "registry" and with which parameters.

use super::{
    CreatedToken, RegistryClient, RegistryConnector, RegistryError, RegistryResult, TokenSettings,
    TokenSummary,
};
use crate::connection::ConnectionConfig;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A call received by [`MockRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `whoami`
    Whoami,
    /// `list_tokens`
    ListTokens,
    /// `create_token` with the password exposed for assertions
    CreateToken {
        /// Password sent to the registry
        password: String,
        /// Read-only flag
        readonly: bool,
        /// CIDR whitelist
        cidr_whitelist: Vec<String>,
    },
    /// `delete_token`
    DeleteToken(String),
}

/// Failure to inject into every subsequent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Transport failure
    Unreachable,
    /// 401 from the registry
    AuthFailed,
    /// Any other status
    Status(u16),
}

impl MockFailure {
    fn to_error(self) -> RegistryError {
        match self {
            Self::Unreachable => RegistryError::unreachable("connection refused"),
            Self::AuthFailed => RegistryError::AuthFailed("status 401 Unauthorized".to_string()),
            Self::Status(status) => RegistryError::Rejected {
                status,
                body: "mock failure".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct MockToken {
    readonly: bool,
    cidr_whitelist: Vec<String>,
}

/// Registry double holding tokens in memory.
#[derive(Debug)]
pub struct MockRegistry {
    username: String,
    tokens: RwLock<BTreeMap<String, MockToken>>,
    calls: RwLock<Vec<MockCall>>,
    failure: RwLock<Option<MockFailure>>,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new("admin")
    }
}

impl MockRegistry {
    /// Create a registry whose `whoami` answers `username`.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tokens: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
        }
    }

    /// Make every following call fail, or clear the failure with `None`.
    pub async fn fail_with(&self, failure: Option<MockFailure>) {
        *self.failure.write().await = failure;
    }

    /// Recorded calls, oldest first.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    /// Number of recorded calls.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Whether a token with `id` is live.
    pub async fn contains(&self, id: &str) -> bool {
        self.tokens.read().await.contains_key(id)
    }

    /// Number of live tokens.
    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }

    async fn record(&self, call: MockCall) -> RegistryResult<()> {
        self.calls.write().await.push(call);
        match *self.failure.read().await {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn whoami(&self) -> RegistryResult<String> {
        self.record(MockCall::Whoami).await?;
        Ok(self.username.clone())
    }

    async fn list_tokens(&self) -> RegistryResult<Vec<TokenSummary>> {
        self.record(MockCall::ListTokens).await?;
        Ok(self
            .tokens
            .read()
            .await
            .iter()
            .map(|(id, token)| TokenSummary {
                key: id.clone(),
                token: format!("{}...", &id[..6.min(id.len())]),
                readonly: token.readonly,
                cidr_whitelist: Some(token.cidr_whitelist.clone()),
                created: None,
            })
            .collect())
    }

    async fn create_token(&self, settings: &TokenSettings<'_>) -> RegistryResult<CreatedToken> {
        self.record(MockCall::CreateToken {
            password: settings.password.expose_secret().to_owned(),
            readonly: settings.readonly,
            cidr_whitelist: settings.cidr_whitelist.clone(),
        })
        .await?;

        let id = Uuid::new_v4().simple().to_string();
        let token = format!("npm_{}", Uuid::new_v4().simple());
        self.tokens.write().await.insert(
            id.clone(),
            MockToken {
                readonly: settings.readonly,
                cidr_whitelist: settings.cidr_whitelist.clone(),
            },
        );

        Ok(CreatedToken {
            token: SecretString::from(token),
            id,
            readonly: settings.readonly,
            cidr_whitelist: settings.cidr_whitelist.clone(),
        })
    }

    async fn delete_token(&self, id: &str) -> RegistryResult<()> {
        self.record(MockCall::DeleteToken(id.to_string())).await?;
        match self.tokens.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotFound(format!("token {id}"))),
        }
    }
}

/// Connection parameters seen by [`MockConnector::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRecord {
    /// Registry URI
    pub uri: String,
    /// Username
    pub username: String,
    /// Password, exposed for assertions
    pub password: String,
}

/// Connector handing out one shared [`MockRegistry`].
#[derive(Debug, Default)]
pub struct MockConnector {
    registry: Arc<MockRegistry>,
    connects: Mutex<Vec<ConnectRecord>>,
}

impl MockConnector {
    /// Create a connector around `registry`.
    #[must_use]
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        Self {
            registry,
            connects: Mutex::new(Vec::new()),
        }
    }

    /// The registry every client talks to.
    #[must_use]
    pub fn registry(&self) -> Arc<MockRegistry> {
        Arc::clone(&self.registry)
    }

    /// Every connection built so far, oldest first.
    #[must_use]
    pub fn connects(&self) -> Vec<ConnectRecord> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RegistryConnector for MockConnector {
    fn connect(&self, connection: &ConnectionConfig) -> RegistryResult<Arc<dyn RegistryClient>> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ConnectRecord {
                uri: connection.connection_uri.clone(),
                username: connection.username.clone(),
                password: connection.password.expose_secret().to_owned(),
            });
        let registry: Arc<dyn RegistryClient> = self.registry();
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_delete_token() {
        let registry = MockRegistry::default();
        let password = SecretString::from("admin-pass".to_string());
        let settings = TokenSettings {
            password: &password,
            readonly: true,
            cidr_whitelist: vec!["10.0.0.0/8".to_string()],
        };

        let created = registry.create_token(&settings).await.unwrap();
        assert!(registry.contains(&created.id).await);
        assert!(created.token.expose_secret().starts_with("npm_"));

        registry.delete_token(&created.id).await.unwrap();
        assert!(!registry.contains(&created.id).await);

        let again = registry.delete_token(&created.id).await;
        assert!(matches!(again, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let registry = MockRegistry::default();
        registry.fail_with(Some(MockFailure::AuthFailed)).await;
        assert!(matches!(
            registry.list_tokens().await,
            Err(RegistryError::AuthFailed(_))
        ));

        registry.fail_with(None).await;
        assert!(registry.list_tokens().await.unwrap().is_empty());
        assert_eq!(registry.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_connector_records_connections() {
        let connector = MockConnector::default();
        let connection = ConnectionConfig::new("http://localhost:4873", "guest", "guest");

        let client = connector.connect(&connection).unwrap();
        assert_eq!(client.whoami().await.unwrap(), "admin");
        assert_eq!(
            connector.connects(),
            vec![ConnectRecord {
                uri: "http://localhost:4873".to_string(),
                username: "guest".to_string(),
                password: "guest".to_string(),
            }]
        );
    }
}
