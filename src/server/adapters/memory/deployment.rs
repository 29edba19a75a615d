//! Shared in-process stand-in for the network of sandbox servers.

use crate::server::domain::ServerPort;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Documents of one collection, in insertion order.
type Collection = Vec<Value>;

/// Collections of one database.
type Database = HashMap<String, Collection>;

/// In-process model of every sandbox server currently bound to a port.
///
/// Supervisors bind and unbind ports; connectors dial them. Data lives only
/// as long as the server that owns it, so unbinding a port discards every
/// document stored through it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeployment {
    state: Arc<RwLock<DeploymentState>>,
}

#[derive(Debug, Default)]
struct DeploymentState {
    servers: HashMap<ServerPort, HashMap<String, Database>>,
}

impl InMemoryDeployment {
    /// Creates a deployment with no bound servers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a fresh, empty server to `port`.
    ///
    /// Returns `false` when the port is already bound.
    pub fn bind(&self, port: ServerPort) -> bool {
        let mut state = self.write();
        if state.servers.contains_key(&port) {
            return false;
        }
        state.servers.insert(port, HashMap::new());
        true
    }

    /// Releases `port` and discards the data stored on it.
    pub fn unbind(&self, port: ServerPort) {
        self.write().servers.remove(&port);
    }

    /// Returns whether a server is bound to `port`.
    #[must_use]
    pub fn is_bound(&self, port: ServerPort) -> bool {
        self.read().servers.contains_key(&port)
    }

    /// Returns the number of bound servers.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.read().servers.len()
    }

    /// Appends documents to a collection.
    ///
    /// Returns `None` when no server is bound to `port`.
    pub(crate) fn insert(
        &self,
        port: ServerPort,
        database: &str,
        collection: &str,
        documents: Vec<Value>,
    ) -> Option<usize> {
        let mut state = self.write();
        let server = state.servers.get_mut(&port)?;
        let inserted = documents.len();
        server
            .entry(database.to_owned())
            .or_default()
            .entry(collection.to_owned())
            .or_default()
            .extend(documents);
        Some(inserted)
    }

    /// Returns a copy of every document in a collection.
    ///
    /// Returns `None` when no server is bound to `port`.
    pub(crate) fn documents(
        &self,
        port: ServerPort,
        database: &str,
        collection: &str,
    ) -> Option<Vec<Value>> {
        let state = self.read();
        let server = state.servers.get(&port)?;
        Some(
            server
                .get(database)
                .and_then(|collections| collections.get(collection))
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, DeploymentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeploymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
