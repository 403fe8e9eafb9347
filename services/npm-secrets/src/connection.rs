//! Registry connection configuration.
//!
//! The connection is a singleton record. Writes always replace the whole
//! record and invalidate the cached client before returning.

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::storage::{Storage, StorageEntry};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::{info, instrument, warn};

/// Storage key of the connection record.
pub const CONNECTION_PATH: &str = "config/connection";

/// Information required to talk to an npm registry as its administrator.
#[derive(Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Registry base URI
    pub connection_uri: String,
    /// Account with permission to manage tokens
    pub username: String,
    /// Password for `username`
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("connection_uri", &self.connection_uri)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a configuration.
    #[must_use]
    pub fn new(
        connection_uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            connection_uri: connection_uri.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Reject configurations with an empty field.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] naming the first empty field.
    pub fn validate(&self) -> BackendResult<()> {
        if self.connection_uri.is_empty() {
            return Err(BackendError::validation("missing connection_uri"));
        }
        if self.username.is_empty() {
            return Err(BackendError::validation("missing username"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(BackendError::validation("missing password"));
        }
        Ok(())
    }
}

/// Payload of an update on `config/connection`.
#[derive(Deserialize)]
pub struct ConnectionUpdate {
    /// Registry base URI
    #[serde(default)]
    pub connection_uri: String,
    /// Administrator username
    #[serde(default)]
    pub username: String,
    /// Administrator password
    #[serde(default)]
    pub password: String,
    /// Check the credentials against the registry before storing them
    #[serde(default = "default_verify_connection")]
    pub verify_connection: bool,
}

const fn default_verify_connection() -> bool {
    true
}

impl ConnectionUpdate {
    /// Split into a validated configuration and the verify flag.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] if a field is empty.
    pub fn into_config(self) -> BackendResult<(ConnectionConfig, bool)> {
        let config = ConnectionConfig::new(self.connection_uri, self.username, self.password);
        config.validate()?;
        Ok((config, self.verify_connection))
    }
}

/// Load the stored connection, if one exists.
///
/// # Errors
///
/// Returns an error if storage fails or the record does not decode.
pub async fn load_connection(storage: &dyn Storage) -> BackendResult<Option<ConnectionConfig>> {
    let Some(entry) = storage
        .get(CONNECTION_PATH)
        .await
        .map_err(|e| BackendError::storage("read connection configuration", e))?
    else {
        return Ok(None);
    };
    Ok(Some(entry.decode_json()?))
}

impl Backend {
    /// Replace the connection configuration.
    ///
    /// With `verify`, a transient client lists tokens first; any failure
    /// leaves the previous configuration in place. On success the record is
    /// written and the cached client dropped.
    ///
    /// # Errors
    ///
    /// `Validation` for empty fields, `UpstreamUnreachable` or
    /// `UpstreamAuthFailed` when verification fails, `Storage` on write
    /// failure.
    #[instrument(skip(self, config), fields(uri = %config.connection_uri, username = %config.username))]
    pub async fn update_connection(&self, config: ConnectionConfig, verify: bool) -> BackendResult<()> {
        config.validate()?;

        if verify {
            let client = self.connector().connect(&config)?;
            if let Err(e) = client.list_tokens().await {
                warn!(error = %e, "connection verification failed");
                return Err(e.into());
            }
        }

        let entry = StorageEntry::json(CONNECTION_PATH, &config)?;
        self.storage()
            .put(entry)
            .await
            .map_err(|e| BackendError::storage("write connection configuration", e))?;

        self.clients().invalidate().await;

        info!(verified = verify, "connection configuration updated");
        Ok(())
    }

    /// Read the stored connection configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the record does not decode.
    pub async fn read_connection(&self) -> BackendResult<Option<ConnectionConfig>> {
        load_connection(self.storage()).await
    }
}
