//! Leased secrets and their lifecycle.
//!
//! A secret is what the host keeps for every credential handed out: its
//! kind, the internal data needed to find the upstream resource again, and
//! lease bookkeeping. Renew and revoke are dispatched on the kind.

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::lease::{duration_secs, LeaseConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Internal-data key holding the upstream token id.
pub const TOKEN_ID_KEY: &str = "id";

/// Kinds of secret this engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    /// npm registry access token
    Creds,
}

impl SecretType {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creds => "creds",
        }
    }

    /// Lifecycle handler for the kind.
    #[must_use]
    pub fn handler(&self) -> &'static dyn SecretKind {
        match self {
            Self::Creds => &CredsSecret,
        }
    }
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lease bookkeeping carried with a secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOptions {
    /// Lease duration; zero leaves it to the host
    #[serde(default, with = "duration_secs")]
    pub ttl: Duration,
    /// Maximum lifetime; zero leaves it to the host
    #[serde(default, with = "duration_secs")]
    pub max_ttl: Duration,
    /// Whether the host may renew the lease
    #[serde(default)]
    pub renewable: bool,
    /// When the secret was issued
    #[serde(default)]
    pub issue_time: Option<DateTime<Utc>>,
    /// When the lease was last renewed
    #[serde(default)]
    pub last_renewal_time: Option<DateTime<Utc>>,
}

impl LeaseOptions {
    /// Lease options for a secret issued now.
    #[must_use]
    pub fn issued_now(lease: Option<LeaseConfig>) -> Self {
        let mut options = Self {
            renewable: true,
            issue_time: Some(Utc::now()),
            ..Self::default()
        };
        options.apply(lease);
        options
    }

    fn apply(&mut self, lease: Option<LeaseConfig>) {
        if let Some(lease) = lease {
            self.ttl = lease.ttl;
            self.max_ttl = lease.max_ttl;
        }
    }
}

/// A secret tracked by the host's lease system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Kind of secret
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    /// Data retained by the host but never returned to the consumer
    #[serde(default)]
    pub internal_data: Map<String, Value>,
    /// Lease bookkeeping
    #[serde(default)]
    pub lease: LeaseOptions,
}

impl Secret {
    /// Create a secret of `secret_type` with the given internal data.
    #[must_use]
    pub fn new(secret_type: SecretType, internal_data: Map<String, Value>, lease: LeaseOptions) -> Self {
        Self {
            secret_type,
            internal_data,
            lease,
        }
    }

    /// Upstream token id stored in the internal data.
    #[must_use]
    pub fn token_id(&self) -> Option<&str> {
        self.internal_data
            .get(TOKEN_ID_KEY)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Renew and revoke behaviour of one kind of secret.
#[async_trait]
pub trait SecretKind: Send + Sync {
    /// Acknowledge a lease renewal, returning the secret to keep.
    async fn renew(&self, backend: &Backend, secret: Secret) -> BackendResult<Secret>;

    /// Destroy the upstream resource behind the secret.
    async fn revoke(&self, backend: &Backend, secret: &Secret) -> BackendResult<()>;
}

/// Lifecycle of issued npm tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredsSecret;

#[async_trait]
impl SecretKind for CredsSecret {
    async fn renew(&self, backend: &Backend, mut secret: Secret) -> BackendResult<Secret> {
        let lease = backend.lease().await?;
        secret.lease.apply(lease);
        secret.lease.last_renewal_time = Some(Utc::now());
        Ok(secret)
    }

    async fn revoke(&self, backend: &Backend, secret: &Secret) -> BackendResult<()> {
        let id = secret
            .token_id()
            .ok_or_else(|| BackendError::malformed_secret("secret is missing id internal data"))?;

        let client = backend.client().await?;

        match client.registry().delete_token(id).await {
            Ok(()) => {
                info!(token_id = id, "token revoked");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(token_id = id, "token already absent upstream");
                Ok(())
            }
            Err(e) => Err(BackendError::UpstreamRevokeFailed(e)),
        }
    }
}

impl Backend {
    /// Renew a secret's lease. Never contacts the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease configuration cannot be read.
    #[instrument(skip(self, secret), fields(secret_type = %secret.secret_type))]
    pub async fn renew_secret(&self, secret: Secret) -> BackendResult<Secret> {
        secret.secret_type.handler().renew(self, secret).await
    }

    /// Revoke a secret's upstream resource. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// `MalformedSecret` when the internal id is missing, `NotConfigured`
    /// without a connection, `UpstreamRevokeFailed` when the registry fails.
    #[instrument(skip(self, secret), fields(secret_type = %secret.secret_type))]
    pub async fn revoke_secret(&self, secret: &Secret) -> BackendResult<()> {
        secret.secret_type.handler().revoke(self, secret).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret_with(internal: Value) -> Secret {
        let Value::Object(map) = internal else {
            panic!("internal data must be an object");
        };
        Secret::new(SecretType::Creds, map, LeaseOptions::default())
    }

    #[test]
    fn test_token_id() {
        assert_eq!(secret_with(json!({"id": "abc"})).token_id(), Some("abc"));
        assert_eq!(secret_with(json!({})).token_id(), None);
        assert_eq!(secret_with(json!({"id": ""})).token_id(), None);
        assert_eq!(secret_with(json!({"id": 42})).token_id(), None);
    }

    #[test]
    fn test_secret_wire_format() {
        let secret = secret_with(json!({"id": "abc"}));
        let value = serde_json::to_value(&secret).unwrap();
        assert_eq!(value["type"], "creds");
        assert_eq!(value["internal_data"]["id"], "abc");

        let decoded: Secret =
            serde_json::from_value(json!({"type": "creds", "internal_data": {"id": "abc"}})).unwrap();
        assert_eq!(decoded.token_id(), Some("abc"));
        assert_eq!(decoded.lease, LeaseOptions::default());
    }

    #[test]
    fn test_issued_lease_options() {
        let options = LeaseOptions::issued_now(Some(LeaseConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(600),
        )));
        assert!(options.renewable);
        assert!(options.issue_time.is_some());
        assert_eq!(options.ttl, Duration::from_secs(60));
        assert_eq!(options.max_ttl, Duration::from_secs(600));

        let options = LeaseOptions::issued_now(None);
        assert_eq!(options.ttl, Duration::ZERO);
    }
}
