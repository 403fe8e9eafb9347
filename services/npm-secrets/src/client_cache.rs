//! Cached registry client.
//!
//! One slot, one lock. The slot holds the client built from the connection
//! generation current at build time; `invalidate` empties it and advances the
//! generation so the next `get_client` rebuilds from storage.

use crate::connection::{load_connection, ConnectionConfig};
use crate::error::{BackendError, BackendResult};
use crate::registry::{RegistryClient, RegistryConnector};
use crate::storage::Storage;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Registry client paired with the connection it was built from.
#[derive(Clone)]
pub struct Client {
    registry: Arc<dyn RegistryClient>,
    connection: Arc<ConnectionConfig>,
    generation: u64,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connection", &self.connection)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// The registry handle.
    #[must_use]
    pub fn registry(&self) -> &dyn RegistryClient {
        self.registry.as_ref()
    }

    /// The connection this client was built from.
    #[must_use]
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Administrator password of the connection.
    #[must_use]
    pub fn admin_password(&self) -> &SecretString {
        &self.connection.password
    }

    /// Configuration generation the client belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
struct Slot {
    generation: u64,
    client: Option<Client>,
}

/// Process-wide holder of the current registry client.
pub struct ClientCache {
    connector: Arc<dyn RegistryConnector>,
    slot: Mutex<Slot>,
}

impl ClientCache {
    /// Create an empty cache building clients with `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn RegistryConnector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// The connector used to build clients.
    #[must_use]
    pub fn connector(&self) -> &dyn RegistryConnector {
        self.connector.as_ref()
    }

    /// Return the cached client, building it from the stored connection
    /// when the slot is empty.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no connection is stored; storage and client
    /// construction errors otherwise.
    pub async fn get_client(&self, storage: &dyn Storage) -> BackendResult<Client> {
        let mut slot = self.slot.lock().await;

        if let Some(client) = &slot.client {
            return Ok(client.clone());
        }

        let connection = load_connection(storage)
            .await?
            .ok_or(BackendError::NotConfigured)?;
        let registry = self.connector.connect(&connection)?;

        let client = Client {
            registry,
            connection: Arc::new(connection),
            generation: slot.generation,
        };
        debug!(generation = slot.generation, "built registry client");

        slot.client = Some(client.clone());
        Ok(client)
    }

    /// Drop the cached client unconditionally.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        slot.client = None;
        slot.generation = slot.generation.wrapping_add(1);
        debug!(generation = slot.generation, "registry client invalidated");
    }

    /// Current configuration generation.
    pub async fn generation(&self) -> u64 {
        self.slot.lock().await.generation
    }

    /// Whether a client is currently cached.
    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.client.is_some()
    }
}
