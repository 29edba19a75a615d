//! Name-keyed cache of database connections against the running server.

use crate::server::{
    domain::{DatabaseName, ServerConfig},
    ports::{DatabaseClient, DatabaseClientError, DatabaseConnector},
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Database-scoped handle shared between the registry and its callers.
pub type Connection<K> = Arc<<<K as DatabaseConnector>::Client as DatabaseClient>::Database>;

/// Result type for registry operations.
pub type ConnectionRegistryResult<T> = Result<T, ConnectionRegistryError>;

/// Errors returned while opening registry connections.
#[derive(Debug, Clone, Error)]
pub enum ConnectionRegistryError {
    /// A connection was requested before the server confirmed readiness.
    #[error("cannot open a connection before the server is started")]
    ServerNotStarted,

    /// The underlying client failed to connect.
    #[error(transparent)]
    Connection(#[from] DatabaseClientError),
}

/// Aggregate of every client close failure seen during one drain.
#[derive(Debug, Clone, Error)]
#[error("failed to close {} database client(s)", .failures.len())]
pub struct ShutdownError {
    failures: Vec<DatabaseClientError>,
}

impl ShutdownError {
    /// Returns the individual close failures.
    #[must_use]
    pub fn failures(&self) -> &[DatabaseClientError] {
        &self.failures
    }
}

type Slot<K> = Arc<OnceCell<Connection<K>>>;

/// Hands out one connection per database name.
///
/// Each name maps to a slot that is filled at most once, so concurrent
/// requests for the same name share a single connect. Every client opened
/// along the way is kept until [`ConnectionRegistry::drain_and_close`].
pub struct ConnectionRegistry<K>
where
    K: DatabaseConnector,
{
    connector: Arc<K>,
    connections: Mutex<HashMap<DatabaseName, Slot<K>>>,
    clients: Mutex<Vec<K::Client>>,
}

impl<K> ConnectionRegistry<K>
where
    K: DatabaseConnector,
{
    /// Creates an empty registry that opens clients through `connector`.
    #[must_use]
    pub fn new(connector: Arc<K>) -> Self {
        Self {
            connector,
            connections: Mutex::new(HashMap::new()),
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Returns the cached connection for `name`, opening it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionRegistryError::ServerNotStarted`] when `config`
    /// is not started, or [`ConnectionRegistryError::Connection`] when the
    /// connect fails. A failed connect caches nothing.
    pub async fn get_or_open(
        &self,
        config: &ServerConfig,
        name: &DatabaseName,
    ) -> ConnectionRegistryResult<Connection<K>> {
        if !config.is_started() {
            return Err(ConnectionRegistryError::ServerNotStarted);
        }

        let slot = Arc::clone(self.lock_connections().entry(name.clone()).or_default());
        let opened = slot
            .get_or_try_init(|| self.open(config, name))
            .await
            .cloned();

        if opened.is_err() {
            self.discard_empty_slot(name, &slot);
        }
        opened
    }

    /// Returns the cached connection for `name` without any network activity.
    #[must_use]
    pub fn cached(&self, name: &DatabaseName) -> Option<Connection<K>> {
        self.lock_connections()
            .get(name)
            .and_then(|slot| slot.get().cloned())
    }

    /// Returns whether a connection for `name` is cached.
    #[must_use]
    pub fn contains(&self, name: &DatabaseName) -> bool {
        self.cached(name).is_some()
    }

    /// Returns the number of cached connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_connections()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Returns whether no connection is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of clients awaiting shutdown.
    #[must_use]
    pub fn open_client_count(&self) -> usize {
        self.lock_clients().len()
    }

    /// Takes every open client, closes them all, and clears the cache.
    ///
    /// A failure closing one client does not stop the others from being
    /// closed. Clients that report nothing to close are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] listing every close failure.
    pub async fn drain_and_close(&self) -> Result<(), ShutdownError> {
        let clients = std::mem::take(&mut *self.lock_clients());
        self.lock_connections().clear();

        let closable: Vec<&K::Client> = clients.iter().filter(|client| client.can_close()).collect();
        tracing::debug!(
            clients = clients.len(),
            closing = closable.len(),
            "closing database clients"
        );

        let failures: Vec<DatabaseClientError> = join_all(closable.into_iter().map(|client| client.close()))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            tracing::warn!(%failure, "database client did not close cleanly");
        }
        Err(ShutdownError { failures })
    }

    async fn open(
        &self,
        config: &ServerConfig,
        name: &DatabaseName,
    ) -> ConnectionRegistryResult<Connection<K>> {
        let uri = config
            .connection_uri(name)
            .ok_or(ConnectionRegistryError::ServerNotStarted)?;

        let client = self.connector.connect(&uri).await?;
        let database = Arc::new(client.database(name));
        self.lock_clients().push(client);
        tracing::debug!(%uri, database = %name, "opened database connection");
        Ok(database)
    }

    fn discard_empty_slot(&self, name: &DatabaseName, slot: &Slot<K>) {
        let mut connections = self.lock_connections();
        if let Some(existing) = connections.get(name)
            && Arc::ptr_eq(existing, slot)
            && !existing.initialized()
        {
            connections.remove(name);
        }
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<DatabaseName, Slot<K>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_clients(&self) -> MutexGuard<'_, Vec<K::Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
