//! Role definitions.
//!
//! A role describes how tokens are minted for it: read-only or not, and the
//! networks they are restricted to. Its `password` is what credential
//! consumers are told to use downstream; token creation itself authenticates
//! with the connection's administrator password.

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::storage::StorageEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Storage prefix of role records.
pub const ROLE_PREFIX: &str = "role/";

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w(?:[\w.-]*\w)?$").expect("role name pattern compiles"));

/// Role that defines the capabilities of the credentials issued against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Password for the account the token is created for
    pub password: String,
    /// Whether issued tokens are read-only
    #[serde(default)]
    pub readonly: bool,
    /// Comma-separated CIDR list the token is restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_whitelist: Option<String>,
}

impl RoleEntry {
    /// Create a role without a CIDR restriction.
    #[must_use]
    pub fn new(password: impl Into<String>, readonly: bool) -> Self {
        Self {
            password: password.into(),
            readonly,
            cidr_whitelist: None,
        }
    }

    /// Restrict issued tokens to a comma-separated CIDR list.
    #[must_use]
    pub fn with_cidr_whitelist(mut self, cidrs: impl Into<String>) -> Self {
        self.cidr_whitelist = Some(cidrs.into());
        self
    }
}

/// Payload of an update on `roles/<name>`.
#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    /// Password for the account the token is created for
    #[serde(default)]
    pub password: String,
    /// Whether issued tokens are read-only
    #[serde(default)]
    pub readonly: bool,
    /// Comma-separated CIDR whitelist
    #[serde(default)]
    pub cidr_whitelist: Option<String>,
}

impl From<RoleUpdate> for RoleEntry {
    fn from(update: RoleUpdate) -> Self {
        Self {
            password: update.password,
            readonly: update.readonly,
            cidr_whitelist: update.cidr_whitelist.filter(|cidrs| !cidrs.trim().is_empty()),
        }
    }
}

/// Check a role name: non-empty, word characters at both ends, word
/// characters, dots or dashes in between.
///
/// # Errors
///
/// `MissingField` for an empty name, `Validation` for a malformed one.
pub fn validate_role_name(name: &str) -> BackendResult<()> {
    if name.is_empty() {
        return Err(BackendError::MissingField("name"));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(BackendError::validation(format!("invalid role name '{name}'")));
    }
    Ok(())
}

fn role_key(name: &str) -> String {
    format!("{ROLE_PREFIX}{name}")
}

impl Backend {
    /// Read a role.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails or the record does not decode.
    pub async fn role(&self, name: &str) -> BackendResult<Option<RoleEntry>> {
        let entry = self
            .storage()
            .get(&role_key(name))
            .await
            .map_err(|e| BackendError::storage("read role", e))?;
        entry.map(|entry| entry.decode_json()).transpose().map_err(Into::into)
    }

    /// List role names in storage order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list_roles(&self) -> BackendResult<Vec<String>> {
        self.storage()
            .list(ROLE_PREFIX)
            .await
            .map_err(|e| BackendError::storage("list roles", e))
    }

    /// Create or replace a role.
    ///
    /// # Errors
    ///
    /// `MissingField` for an empty name, `Validation` for a malformed name
    /// or empty password, `Storage` on write failure.
    #[instrument(skip(self, role), fields(readonly = role.readonly))]
    pub async fn upsert_role(&self, name: &str, role: RoleEntry) -> BackendResult<()> {
        validate_role_name(name)?;
        if role.password.is_empty() {
            return Err(BackendError::validation("password not specified"));
        }

        let entry = StorageEntry::json(role_key(name), &role)?;
        self.storage()
            .put(entry)
            .await
            .map_err(|e| BackendError::storage("write role", e))?;

        info!("role written");
        Ok(())
    }

    /// Delete a role. Deleting a missing role succeeds.
    ///
    /// # Errors
    ///
    /// `MissingField` for an empty name, `Storage` on failure.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, name: &str) -> BackendResult<()> {
        if name.is_empty() {
            return Err(BackendError::MissingField("name"));
        }
        self.storage()
            .delete(&role_key(name))
            .await
            .map_err(|e| BackendError::storage("delete role", e))?;
        info!("role deleted");
        Ok(())
    }
}
