//! On-demand token issuance.

use crate::backend::{Backend, Response};
use crate::error::{BackendError, BackendResult};
use crate::registry::{parse_cidr_whitelist, TokenSettings};
use crate::secret::{LeaseOptions, Secret, SecretType, TOKEN_ID_KEY};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{info, instrument};

/// A freshly minted token bound to its upstream identity.
pub struct IssuedSecret {
    token: SecretString,
    id: String,
    lease: LeaseOptions,
}

impl fmt::Debug for IssuedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedSecret")
            .field("token", &"[REDACTED]")
            .field("id", &self.id)
            .field("lease", &self.lease)
            .finish()
    }
}

impl IssuedSecret {
    /// Kind of the issued secret.
    #[must_use]
    pub const fn secret_type(&self) -> SecretType {
        SecretType::Creds
    }

    /// The token handed to the consumer.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    /// Upstream identifier needed to revoke the token.
    #[must_use]
    pub fn internal_id(&self) -> &str {
        &self.id
    }

    /// Lease bookkeeping for the host.
    #[must_use]
    pub const fn lease(&self) -> &LeaseOptions {
        &self.lease
    }

    /// The host-side secret record: internal id only, no token.
    #[must_use]
    pub fn secret(&self) -> Secret {
        let mut internal = Map::new();
        internal.insert(TOKEN_ID_KEY.to_string(), Value::String(self.id.clone()));
        Secret::new(self.secret_type(), internal, self.lease.clone())
    }

    /// Package for the caller: the token in public data, the id only in the
    /// secret's internal data.
    #[must_use]
    pub fn into_response(self) -> Response {
        let secret = self.secret();
        let mut data = Map::new();
        data.insert(
            "token".to_string(),
            Value::String(self.token.expose_secret().to_owned()),
        );
        Response {
            data,
            secret: Some(secret),
        }
    }
}

impl Backend {
    /// Mint a new registry token for `role_name`.
    ///
    /// The token is created with the connection's administrator password,
    /// scoped by the role's read-only flag and CIDR whitelist. Every call
    /// creates a distinct upstream token.
    ///
    /// # Errors
    ///
    /// `MissingField` for an empty name, `UnknownRole` when the role does
    /// not exist (the registry is not contacted), `NotConfigured` or
    /// connection errors from the client cache, and
    /// `UpstreamTokenCreationFailed` when the registry call fails.
    #[instrument(skip(self))]
    pub async fn issue_credential(&self, role_name: &str) -> BackendResult<IssuedSecret> {
        if role_name.is_empty() {
            return Err(BackendError::MissingField("name"));
        }

        let role = self
            .role(role_name)
            .await?
            .ok_or_else(|| BackendError::UnknownRole(role_name.to_string()))?;

        let client = self.client().await?;
        let lease = LeaseOptions::issued_now(self.lease().await?);

        // Nothing fallible between create and return: a dropped id orphans the token.
        let settings = TokenSettings {
            password: client.admin_password(),
            readonly: role.readonly,
            cidr_whitelist: parse_cidr_whitelist(role.cidr_whitelist.as_deref()),
        };
        let created = client
            .registry()
            .create_token(&settings)
            .await
            .map_err(BackendError::UpstreamTokenCreationFailed)?;

        info!(token_id = %created.id, readonly = role.readonly, "credential issued");

        Ok(IssuedSecret {
            token: created.token,
            id: created.id,
            lease,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_separates_token_and_id() {
        let issued = IssuedSecret {
            token: SecretString::from("npm_abc".to_string()),
            id: "key-1".to_string(),
            lease: LeaseOptions::default(),
        };
        assert_eq!(issued.internal_id(), "key-1");
        assert!(!format!("{issued:?}").contains("npm_abc"));

        let response = issued.into_response();
        assert_eq!(response.data.get("token"), Some(&Value::from("npm_abc")));
        assert!(response.data.get("id").is_none());

        let secret = response.secret.unwrap();
        assert_eq!(secret.secret_type, SecretType::Creds);
        assert_eq!(secret.token_id(), Some("key-1"));
        assert!(secret.internal_data.get("token").is_none());
    }
}
