//! Test fixtures with sample data.
//!
//! The JSON bodies mirror the npm registry token API so HTTP mocks can
//! answer with realistic payloads.

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

/// Sample registry connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleConnection {
    /// Registry base URI
    pub uri: String,
    /// Administrator username
    pub username: String,
    /// Administrator password
    pub password: String,
}

impl SampleConnection {
    /// A local registry with guest credentials.
    #[must_use]
    pub fn local() -> Self {
        Self {
            uri: "http://localhost:4873".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
        }
    }

    /// A second, distinct connection for cache invalidation tests.
    #[must_use]
    pub fn rotated() -> Self {
        Self {
            uri: "https://registry.internal:8443".to_string(),
            username: "publisher".to_string(),
            password: "R0tated-Pa55".to_string(),
        }
    }

    /// Request body for the connection update path.
    #[must_use]
    pub fn update_body(&self, verify: bool) -> Value {
        json!({
            "connection_uri": self.uri,
            "username": self.username,
            "password": self.password,
            "verify_connection": verify,
        })
    }
}

/// Sample role definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRole {
    /// Role name
    pub name: String,
    /// Password advertised to credential consumers
    pub password: String,
    /// Whether issued tokens are read-only
    pub readonly: bool,
    /// Comma-separated CIDR whitelist
    pub cidr_whitelist: Option<String>,
}

impl SampleRole {
    /// The `npm` role used by end-to-end scenarios.
    #[must_use]
    pub fn npm() -> Self {
        Self {
            name: "npm".to_string(),
            password: "guest".to_string(),
            readonly: false,
            cidr_whitelist: None,
        }
    }

    /// A read-only role restricted to CI networks.
    #[must_use]
    pub fn readonly_ci() -> Self {
        Self {
            name: "ci-readonly".to_string(),
            password: "ci-pass".to_string(),
            readonly: true,
            cidr_whitelist: Some("10.0.0.0/8,192.168.1.0/24".to_string()),
        }
    }

    /// Request body for the role update path.
    #[must_use]
    pub fn update_body(&self) -> Value {
        let mut body = json!({
            "password": self.password,
            "readonly": self.readonly,
        });
        if let Some(cidrs) = &self.cidr_whitelist {
            body["cidr_whitelist"] = json!(cidrs);
        }
        body
    }
}

/// A fresh opaque token value in the registry's `npm_` format.
#[must_use]
pub fn sample_token() -> String {
    format!("npm_{}", Uuid::new_v4().simple())
}

/// Body returned by `POST /-/npm/v1/tokens`.
#[must_use]
pub fn token_created_body(token: &str, key: &str, readonly: bool, cidr_whitelist: &[&str]) -> Value {
    json!({
        "token": token,
        "key": key,
        "readonly": readonly,
        "cidr_whitelist": cidr_whitelist,
        "created": Utc::now().to_rfc3339(),
    })
}

/// Body returned by `GET /-/npm/v1/tokens`.
#[must_use]
pub fn token_list_body(keys: &[&str]) -> Value {
    let created = Utc::now().to_rfc3339();
    let objects: Vec<Value> = keys
        .iter()
        .map(|key| {
            json!({
                "token": format!("{}...", &key[..key.len().min(6)]),
                "key": key,
                "readonly": false,
                "cidr_whitelist": null,
                "created": created,
                "updated": created,
            })
        })
        .collect();

    json!({
        "objects": objects,
        "total": keys.len(),
        "urls": {},
    })
}

/// Body returned by `GET /-/whoami`.
#[must_use]
pub fn whoami_body(username: &str) -> Value {
    json!({ "username": username })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_role_body() {
        let body = SampleRole::readonly_ci().update_body();
        assert_eq!(body["readonly"], json!(true));
        assert_eq!(body["cidr_whitelist"], json!("10.0.0.0/8,192.168.1.0/24"));

        let body = SampleRole::npm().update_body();
        assert!(body.get("cidr_whitelist").is_none());
    }

    #[test]
    fn test_sample_token_is_unique() {
        let a = sample_token();
        let b = sample_token();
        assert!(a.starts_with("npm_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_list_body() {
        let body = token_list_body(&["abcdef0123", "fedcba9876"]);
        assert_eq!(body["total"], json!(2));
        assert_eq!(body["objects"][0]["key"], json!("abcdef0123"));
        assert_eq!(body["objects"][0]["token"], json!("abcdef..."));
    }
}
