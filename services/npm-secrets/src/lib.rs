//! Dynamic npm registry credentials.
//!
//! The engine stores one administrator connection to an npm registry and a
//! set of named roles. Reading `creds/<role>` mints a fresh registry token
//! scoped by the role; the token's upstream id rides along as internal
//! secret data so revoke can delete it again.
//!
//! State lives behind the [`storage::Storage`] trait and the registry
//! behind [`registry::RegistryClient`], so the whole engine runs against
//! in-memory doubles in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod client_cache;
pub mod config;
pub mod connection;
pub mod creds;
pub mod error;
pub mod lease;
pub mod registry;
pub mod roles;
pub mod secret;
pub mod storage;

pub use backend::{Backend, Operation, Request, Response};
pub use client_cache::{Client, ClientCache};
pub use config::Config;
pub use connection::ConnectionConfig;
pub use creds::IssuedSecret;
pub use error::{BackendError, BackendResult};
pub use lease::LeaseConfig;
pub use roles::RoleEntry;
pub use secret::{LeaseOptions, Secret, SecretKind, SecretType};
pub use storage::{InMemoryStorage, Storage};
