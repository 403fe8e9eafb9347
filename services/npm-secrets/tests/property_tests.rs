//! Property-based tests for the engine's stores and issuance.

use npm_secrets::registry::mock::MockCall;
use npm_secrets::registry::{parse_cidr_whitelist, MockConnector, MockRegistry};
use npm_secrets::roles::validate_role_name;
use npm_secrets::{
    Backend, BackendError, ConnectionConfig, InMemoryStorage, LeaseConfig, LeaseOptions,
    RoleEntry, Secret, SecretType,
};
use proptest::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;
use test_utils::generators::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn backend() -> (Backend, Arc<MockConnector>, Arc<MockRegistry>) {
    let registry = Arc::new(MockRegistry::default());
    let connector = Arc::new(MockConnector::new(Arc::clone(&registry)));
    let backend = Backend::new(Arc::new(InMemoryStorage::new()), connector.clone());
    (backend, connector, registry)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Generated names are accepted, malformed ones rejected.
    #[test]
    fn prop_role_name_validation(valid in role_name_strategy(), invalid in invalid_role_name_strategy()) {
        prop_assert!(validate_role_name(&valid).is_ok());
        prop_assert!(matches!(validate_role_name(&invalid), Err(BackendError::Validation(_))));
    }

    /// A stored role reads back exactly as written.
    #[test]
    fn prop_role_round_trip(
        name in role_name_strategy(),
        password in password_strategy(),
        readonly in any::<bool>(),
        cidrs in prop::option::of(cidr_whitelist_strategy()),
    ) {
        let (backend, _, _) = backend();
        let mut role = RoleEntry::new(password, readonly);
        if let Some(cidrs) = cidrs {
            role = role.with_cidr_whitelist(cidrs);
        }

        let read = runtime().block_on(async {
            backend.upsert_role(&name, role.clone()).await.unwrap();
            backend.role(&name).await.unwrap()
        });
        prop_assert_eq!(read, Some(role));
    }

    /// The client after an update is built from exactly the written triple.
    #[test]
    fn prop_client_reflects_latest_connection(
        first in (connection_uri_strategy(), username_strategy(), password_strategy()),
        second in (connection_uri_strategy(), username_strategy(), password_strategy()),
    ) {
        let (backend, connector, _) = backend();
        runtime().block_on(async {
            for (uri, username, password) in [&first, &second] {
                backend
                    .update_connection(ConnectionConfig::new(uri, username, password), false)
                    .await
                    .unwrap();
                let client = backend.client().await.unwrap();
                assert_eq!(&client.connection().connection_uri, uri);
                assert_eq!(&client.connection().username, username);
            }
        });

        let connects = connector.connects();
        prop_assert_eq!(connects.len(), 2);
        prop_assert_eq!(&connects[1].uri, &second.0);
        prop_assert_eq!(&connects[1].password, &second.2);
    }

    /// Issuance forwards the role's scope and the admin password.
    #[test]
    fn prop_issue_forwards_role_scope(
        admin_password in password_strategy(),
        role_password in password_strategy(),
        readonly in any::<bool>(),
        cidrs in cidr_whitelist_strategy(),
    ) {
        let (backend, _, registry) = backend();
        let calls = runtime().block_on(async {
            backend
                .update_connection(ConnectionConfig::new("http://localhost:4873", "admin", admin_password.as_str()), false)
                .await
                .unwrap();
            backend
                .upsert_role("npm", RoleEntry::new(role_password, readonly).with_cidr_whitelist(cidrs.clone()))
                .await
                .unwrap();
            let issued = backend.issue_credential("npm").await.unwrap();
            assert!(registry.contains(issued.internal_id()).await);
            registry.calls().await
        });

        prop_assert_eq!(calls, vec![MockCall::CreateToken {
            password: admin_password,
            readonly,
            cidr_whitelist: parse_cidr_whitelist(Some(&cidrs)),
        }]);
    }

    /// Revoking any id is idempotent, whether or not the registry still
    /// holds it, and targets exactly that id.
    #[test]
    fn prop_revoke_idempotent_for_any_id(id in token_key_strategy()) {
        let (backend, _, registry) = backend();
        let mut internal = Map::new();
        internal.insert("id".to_string(), Value::String(id.clone()));
        let secret = Secret::new(SecretType::Creds, internal, LeaseOptions::default());

        let calls = runtime().block_on(async {
            backend
                .update_connection(ConnectionConfig::new("http://localhost:4873", "admin", "admin"), false)
                .await
                .unwrap();
            backend.revoke_secret(&secret).await.unwrap();
            backend.revoke_secret(&secret).await.unwrap();
            registry.calls().await
        });

        prop_assert_eq!(calls, vec![MockCall::DeleteToken(id.clone()), MockCall::DeleteToken(id)]);
    }

    /// ttl above a non-zero max_ttl is always rejected.
    #[test]
    fn prop_lease_bounds(ttl in ttl_strategy(), max_ttl in ttl_strategy()) {
        let lease = LeaseConfig::new(ttl, max_ttl);
        prop_assert_eq!(lease.validate().is_ok(), ttl <= max_ttl);
        prop_assert!(LeaseConfig::new(ttl, std::time::Duration::ZERO).validate().is_ok());
    }

    /// Whitelist parsing keeps every generated block in order.
    #[test]
    fn prop_cidr_whitelist_parsing(cidrs in prop::collection::vec(cidr_strategy(), 1..5)) {
        let joined = cidrs.join(" , ");
        prop_assert_eq!(parse_cidr_whitelist(Some(&joined)), cidrs);
    }
}
