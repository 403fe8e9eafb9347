//! Shared library for cross-cutting concerns in npm-secrets crates.
//!
//! This crate provides centralized implementations for:
//! - HTTP client configuration and building for registry access
//! - Tracing subscriber setup for binaries

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod tracing_config;

pub use http::{build_http_client, HttpConfig};
pub use tracing_config::{init_tracing, TracingConfig};
