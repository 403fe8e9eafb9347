//! Shared test utilities for npm-secrets crates.
//!
//! This crate provides:
//! - Proptest generators for connection, role and token values
//! - Fixtures shaped like npm registry token API payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use generators::*;
