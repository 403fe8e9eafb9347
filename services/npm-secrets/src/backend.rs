//! Engine entry point and request router.
//!
//! The host calls [`Backend::handle`] with an operation, a path and a JSON
//! payload. Payloads are decoded into typed structs once, here; everything
//! below the router works on typed values.

use crate::client_cache::{Client, ClientCache};
use crate::config::Config;
use crate::connection::{ConnectionUpdate, CONNECTION_PATH};
use crate::error::{BackendError, BackendResult};
use crate::lease::{LeaseConfig, LEASE_PATH};
use crate::registry::{HttpConnector, RegistryConnector};
use crate::roles::{RoleEntry, RoleUpdate};
use crate::secret::Secret;
use crate::storage::Storage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

const ROLES_PREFIX: &str = "roles/";
const CREDS_PREFIX: &str = "creds/";

/// Operations the host can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read a record or issue a credential
    Read,
    /// Create or replace a record
    Update,
    /// Delete a record
    Delete,
    /// List records under a prefix
    List,
    /// Renew a secret's lease
    Renew,
    /// Revoke a secret
    Revoke,
}

impl Operation {
    /// Wire name of the operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Renew => "renew",
            Self::Revoke => "revoke",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "update" | "write" | "create" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            "renew" => Ok(Self::Renew),
            "revoke" => Ok(Self::Revoke),
            _ => Err(BackendError::validation(format!("unknown operation '{s}'"))),
        }
    }
}

/// A request from the host.
#[derive(Debug, Clone)]
pub struct Request {
    /// Requested operation
    pub operation: Operation,
    /// Path relative to the engine mount
    pub path: String,
    /// Request payload; `null` when absent
    pub data: Value,
    /// Secret being renewed or revoked
    pub secret: Option<Secret>,
}

impl Request {
    /// Create a request without payload.
    #[must_use]
    pub fn new(operation: Operation, path: impl Into<String>) -> Self {
        Self {
            operation,
            path: path.into(),
            data: Value::Null,
            secret: None,
        }
    }

    /// Attach a JSON payload. Anything but an object or `null` is rejected
    /// when the payload is decoded.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Attach the secret a renew or revoke applies to.
    #[must_use]
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// A response to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    /// Data returned to the caller
    pub data: Map<String, Value>,
    /// Secret the host should track, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<Secret>,
}

impl Response {
    /// A response carrying only data.
    #[must_use]
    pub fn data(data: Value) -> Self {
        match data {
            Value::Object(data) => Self { data, secret: None },
            _ => Self::default(),
        }
    }
}

/// The npm secrets engine.
pub struct Backend {
    storage: Arc<dyn Storage>,
    clients: ClientCache,
}

impl Backend {
    /// Create an engine over `storage`, building registry clients with
    /// `connector`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, connector: Arc<dyn RegistryConnector>) -> Self {
        Self {
            storage,
            clients: ClientCache::new(connector),
        }
    }

    /// Create an engine talking to real registries over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> BackendResult<Self> {
        let connector = HttpConnector::new(&config.http_config())
            .map_err(|e| BackendError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(storage, Arc::new(connector)))
    }

    /// The storage collaborator.
    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// The connector used for new clients.
    #[must_use]
    pub fn connector(&self) -> &dyn RegistryConnector {
        self.clients.connector()
    }

    /// The cached-client holder.
    #[must_use]
    pub const fn clients(&self) -> &ClientCache {
        &self.clients
    }

    /// The current registry client, built on first use.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a stored connection; storage or client
    /// construction errors otherwise.
    pub async fn client(&self) -> BackendResult<Client> {
        self.clients.get_client(self.storage()).await
    }

    /// Route a host request to its operation.
    ///
    /// Returns `Ok(None)` when the operation succeeded with nothing to
    /// return, including reads of absent records.
    ///
    /// # Errors
    ///
    /// Whatever the routed operation returns, `Validation` for payloads that
    /// do not decode, `UnsupportedOperation` for unknown routes.
    #[instrument(skip(self, request), fields(operation = %request.operation, path = %request.path))]
    pub async fn handle(&self, request: Request) -> BackendResult<Option<Response>> {
        let Request {
            operation,
            path,
            data,
            secret,
        } = request;
        debug!("handling request");

        match (operation, path.as_str()) {
            (Operation::Renew, _) => {
                let secret = secret.ok_or_else(|| BackendError::malformed_secret("no secret supplied"))?;
                let renewed = self.renew_secret(secret).await?;
                Ok(Some(Response {
                    data: Map::new(),
                    secret: Some(renewed),
                }))
            }
            (Operation::Revoke, _) => {
                let secret = secret.ok_or_else(|| BackendError::malformed_secret("no secret supplied"))?;
                self.revoke_secret(&secret).await?;
                Ok(None)
            }

            (Operation::Update, CONNECTION_PATH) => {
                let (config, verify) = decode::<ConnectionUpdate>(data)?.into_config()?;
                self.update_connection(config, verify).await?;
                Ok(None)
            }
            (Operation::Read, CONNECTION_PATH) => Ok(self.read_connection().await?.map(|config| {
                Response::data(json!({
                    "connection_uri": config.connection_uri,
                    "username": config.username,
                }))
            })),

            (Operation::Update, LEASE_PATH) => {
                self.update_lease(decode::<LeaseConfig>(data)?).await?;
                Ok(None)
            }
            (Operation::Read, LEASE_PATH) => Ok(self
                .lease()
                .await?
                .map(|lease| serde_json::to_value(lease).map(Response::data))
                .transpose()?),

            (Operation::List, "roles" | ROLES_PREFIX) => {
                let keys = self.list_roles().await?;
                Ok(Some(Response::data(json!({ "keys": keys }))))
            }
            (operation, path) if path.starts_with(ROLES_PREFIX) => {
                let name = &path[ROLES_PREFIX.len()..];
                self.handle_role(operation, name, data).await
            }

            (Operation::Read, path) if path.starts_with(CREDS_PREFIX) => {
                let name = &path[CREDS_PREFIX.len()..];
                let issued = self.issue_credential(name).await?;
                Ok(Some(issued.into_response()))
            }

            (operation, path) => Err(BackendError::UnsupportedOperation {
                operation: operation.to_string(),
                path: path.to_string(),
            }),
        }
    }

    async fn handle_role(
        &self,
        operation: Operation,
        name: &str,
        data: Value,
    ) -> BackendResult<Option<Response>> {
        match operation {
            Operation::Read => {
                if name.is_empty() {
                    return Err(BackendError::MissingField("name"));
                }
                Ok(self
                    .role(name)
                    .await?
                    .map(|role| serde_json::to_value(role).map(Response::data))
                    .transpose()?)
            }
            Operation::Update => {
                let role = RoleEntry::from(decode::<RoleUpdate>(data)?);
                self.upsert_role(name, role).await?;
                Ok(None)
            }
            Operation::Delete => {
                self.delete_role(name).await?;
                Ok(None)
            }
            other => Err(BackendError::UnsupportedOperation {
                operation: other.to_string(),
                path: format!("{ROLES_PREFIX}{name}"),
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> BackendResult<T> {
    let data = match data {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        _ => return Err(BackendError::validation("request data must be a JSON object")),
    };
    serde_json::from_value(Value::Object(data))
        .map_err(|e| BackendError::validation(format!("invalid request data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MockConnector;
    use crate::storage::InMemoryStorage;

    fn backend() -> Backend {
        Backend::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(MockConnector::default()),
        )
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("read".parse::<Operation>().unwrap(), Operation::Read);
        assert_eq!("UPDATE".parse::<Operation>().unwrap(), Operation::Update);
        assert_eq!("write".parse::<Operation>().unwrap(), Operation::Update);
        assert_eq!("revoke".parse::<Operation>().unwrap(), Operation::Revoke);
        assert!("patch".parse::<Operation>().is_err());
        assert_eq!(Operation::List.to_string(), "list");
    }

    #[tokio::test]
    async fn test_non_object_payload_is_rejected() {
        let backend = backend();
        for (path, body) in [
            (CONNECTION_PATH, json!([1])),
            ("roles/npm", json!("guest")),
            (LEASE_PATH, json!(60)),
        ] {
            let request = Request::new(Operation::Update, path).with_data(body);
            match backend.handle(request).await {
                Err(BackendError::Validation(msg)) => {
                    assert_eq!(msg, "request data must be a JSON object");
                }
                other => panic!("expected validation error on {path}, got {other:?}"),
            }
        }
        assert!(backend.storage().list("role/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_name_checked_once_on_update() {
        let backend = backend();
        let request = Request::new(Operation::Update, "roles/-npm")
            .with_data(json!({"password": "guest"}));
        assert!(matches!(
            backend.handle(request).await,
            Err(BackendError::Validation(msg)) if msg.contains("invalid role name")
        ));

        let request = Request::new(Operation::Update, "roles/").with_data(json!({"password": "guest"}));
        assert!(matches!(
            backend.handle(request).await,
            Err(BackendError::MissingField("name"))
        ));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let result = backend().handle(Request::new(Operation::Read, "unknown/path")).await;
        assert!(matches!(
            result,
            Err(BackendError::UnsupportedOperation { ref operation, ref path })
                if operation == "read" && path == "unknown/path"
        ));

        let result = backend().handle(Request::new(Operation::Delete, "creds/npm")).await;
        assert!(matches!(result, Err(BackendError::UnsupportedOperation { .. })));

        let result = backend().handle(Request::new(Operation::List, "roles/npm")).await;
        assert!(matches!(result, Err(BackendError::UnsupportedOperation { .. })));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_validation_error() {
        let request = Request::new(Operation::Update, "roles/npm")
            .with_data(json!({"password": "guest", "readonly": "sometimes"}));
        assert!(matches!(
            backend().handle(request).await,
            Err(BackendError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_renew_and_revoke_require_secret() {
        let backend = backend();
        for operation in [Operation::Renew, Operation::Revoke] {
            assert!(matches!(
                backend.handle(Request::new(operation, "creds/npm")).await,
                Err(BackendError::MalformedSecret(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_reads_of_absent_records() {
        let backend = backend();
        for path in [CONNECTION_PATH, LEASE_PATH, "roles/npm"] {
            assert!(backend
                .handle(Request::new(Operation::Read, path))
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_list_roles_empty() {
        let response = backend()
            .handle(Request::new(Operation::List, "roles/"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.data["keys"], json!([]));
    }
}
