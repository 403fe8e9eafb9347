//! Lease policy for issued credentials.
//!
//! The host owns lease timers. This record only tells it which TTL and
//! maximum TTL to put on secrets issued or renewed by this engine; zero means
//! "use the host default".

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::storage::StorageEntry;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// Storage key of the lease record.
pub const LEASE_PATH: &str = "config/lease";

/// TTL policy attached to issued secrets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Lease duration for new and renewed secrets
    #[serde(default, with = "duration_secs")]
    pub ttl: Duration,
    /// Upper bound on the total lifetime of a secret
    #[serde(default, with = "duration_secs")]
    pub max_ttl: Duration,
}

impl LeaseConfig {
    /// Create a lease policy.
    #[must_use]
    pub const fn new(ttl: Duration, max_ttl: Duration) -> Self {
        Self { ttl, max_ttl }
    }

    /// `ttl` may not exceed a non-zero `max_ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when the bounds are inverted.
    pub fn validate(&self) -> BackendResult<()> {
        if !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(BackendError::validation(format!(
                "ttl ({}s) cannot be greater than max_ttl ({}s)",
                self.ttl.as_secs(),
                self.max_ttl.as_secs()
            )));
        }
        Ok(())
    }
}

/// Serde adapter storing a `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl Backend {
    /// Read the lease policy, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the record does not decode.
    pub async fn lease(&self) -> BackendResult<Option<LeaseConfig>> {
        let entry = self
            .storage()
            .get(LEASE_PATH)
            .await
            .map_err(|e| BackendError::storage("read lease configuration", e))?;
        entry.map(|entry| entry.decode_json()).transpose().map_err(Into::into)
    }

    /// Replace the lease policy.
    ///
    /// # Errors
    ///
    /// `Validation` for inverted bounds, `Storage` on write failure.
    #[instrument(skip(self), fields(ttl = lease.ttl.as_secs(), max_ttl = lease.max_ttl.as_secs()))]
    pub async fn update_lease(&self, lease: LeaseConfig) -> BackendResult<()> {
        lease.validate()?;
        let entry = StorageEntry::json(LEASE_PATH, &lease)?;
        self.storage()
            .put(entry)
            .await
            .map_err(|e| BackendError::storage("write lease configuration", e))?;
        info!("lease configuration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds() {
        let ok = LeaseConfig::new(Duration::from_secs(60), Duration::from_secs(3600));
        assert!(ok.validate().is_ok());

        let unbounded = LeaseConfig::new(Duration::from_secs(600), Duration::ZERO);
        assert!(unbounded.validate().is_ok());

        let inverted = LeaseConfig::new(Duration::from_secs(7200), Duration::from_secs(3600));
        assert!(matches!(inverted.validate(), Err(BackendError::Validation(_))));
    }

    #[test]
    fn test_serialized_as_seconds() {
        let lease = LeaseConfig::new(Duration::from_secs(90), Duration::from_secs(900));
        let value = serde_json::to_value(lease).unwrap();
        assert_eq!(value, serde_json::json!({"ttl": 90, "max_ttl": 900}));

        let partial: LeaseConfig = serde_json::from_value(serde_json::json!({"ttl": 30})).unwrap();
        assert_eq!(partial.ttl, Duration::from_secs(30));
        assert_eq!(partial.max_ttl, Duration::ZERO);
    }
}
