//! Key/value storage collaborator.
//!
//! The engine persists two record families: the connection singleton and
//! one record per role. Values are JSON bytes; the store guarantees per-key
//! consistency only.

pub mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store could not complete the call
    #[error("storage I/O error: {0}")]
    Io(String),
}

impl StorageError {
    /// Create an I/O error.
    #[must_use]
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

/// A single stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Full storage key
    pub key: String,
    /// JSON-encoded value
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Encode a value as a JSON entry under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            key: key.into(),
            value: serde_json::to_vec(value)?,
        })
    }

    /// Decode the entry's JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored bytes do not decode into `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.value)
    }
}

/// Storage interface consumed by the backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the entry at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError>;

    /// Write an entry, replacing any previous value.
    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError>;

    /// Delete the entry at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List keys directly under `prefix`, with the prefix stripped.
    ///
    /// Nested keys are collapsed into their first segment followed by `/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
