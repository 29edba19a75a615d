//! In-memory database connector and document handles.

use super::InMemoryDeployment;
use crate::server::{
    domain::{ConnectionUri, DatabaseName, ServerPort},
    ports::{DatabaseClient, DatabaseClientError, DatabaseClientResult, DatabaseConnector},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Connector that dials servers bound in an [`InMemoryDeployment`].
///
/// Connect and close calls are counted, and failures can be queued for the
/// next connect or close so error paths are reachable from tests.
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    deployment: InMemoryDeployment,
    counters: Arc<ConnectorCounters>,
    failures: Arc<Mutex<QueuedFailures>>,
}

#[derive(Debug, Default)]
struct ConnectorCounters {
    connects: AtomicUsize,
    closes: AtomicUsize,
}

#[derive(Debug, Default)]
struct QueuedFailures {
    connect: VecDeque<String>,
    close: VecDeque<String>,
    non_closable: usize,
}

impl InMemoryConnector {
    /// Creates a connector for `deployment`.
    #[must_use]
    pub fn new(deployment: InMemoryDeployment) -> Self {
        Self {
            deployment,
            counters: Arc::new(ConnectorCounters::default()),
            failures: Arc::new(Mutex::new(QueuedFailures::default())),
        }
    }

    /// Makes the next connect attempt fail with `message`.
    pub fn fail_next_connect(&self, message: impl Into<String>) {
        self.lock_failures().connect.push_back(message.into());
    }

    /// Makes the next client produced by this connector fail to close.
    pub fn fail_next_close(&self, message: impl Into<String>) {
        self.lock_failures().close.push_back(message.into());
    }

    /// Makes the next client produced by this connector report that it has
    /// nothing to close.
    pub fn next_client_without_close(&self) {
        self.lock_failures().non_closable += 1;
    }

    /// Returns how many connect attempts were made.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Returns how many close calls clients received.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    fn lock_failures(&self) -> MutexGuard<'_, QueuedFailures> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DatabaseConnector for InMemoryConnector {
    type Client = InMemoryClient;

    async fn connect(&self, uri: &ConnectionUri) -> DatabaseClientResult<InMemoryClient> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);

        let (connect_failure, close_failure, closable) = {
            let mut failures = self.lock_failures();
            let connect_failure = failures.connect.pop_front();
            if connect_failure.is_some() {
                (connect_failure, None, true)
            } else {
                let closable = failures.non_closable == 0;
                failures.non_closable = failures.non_closable.saturating_sub(1);
                (None, failures.close.pop_front(), closable)
            }
        };

        if let Some(message) = connect_failure {
            return Err(DatabaseClientError::connect(uri, io::Error::other(message)));
        }

        if !self.deployment.is_bound(uri.port()) {
            return Err(DatabaseClientError::connect(
                uri,
                io::Error::from(io::ErrorKind::ConnectionRefused),
            ));
        }

        Ok(InMemoryClient {
            deployment: self.deployment.clone(),
            port: uri.port(),
            counters: Arc::clone(&self.counters),
            close_failure,
            closable,
            closed: AtomicBool::new(false),
        })
    }
}

/// Client connected to one in-memory server.
#[derive(Debug)]
pub struct InMemoryClient {
    deployment: InMemoryDeployment,
    port: ServerPort,
    counters: Arc<ConnectorCounters>,
    close_failure: Option<String>,
    closable: bool,
    closed: AtomicBool,
}

impl InMemoryClient {
    /// Returns the port this client is connected to.
    #[must_use]
    pub const fn port(&self) -> ServerPort {
        self.port
    }

    /// Returns whether the client has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseClient for InMemoryClient {
    type Database = InMemoryDatabase;

    fn database(&self, name: &DatabaseName) -> InMemoryDatabase {
        InMemoryDatabase {
            deployment: self.deployment.clone(),
            port: self.port,
            name: name.clone(),
        }
    }

    fn can_close(&self) -> bool {
        self.closable
    }

    async fn close(&self) -> DatabaseClientResult<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.close_failure {
            return Err(DatabaseClientError::close(io::Error::other(message.clone())));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Handle scoped to one database on an in-memory server.
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    deployment: InMemoryDeployment,
    port: ServerPort,
    name: DatabaseName,
}

impl InMemoryDatabase {
    /// Returns the database name.
    #[must_use]
    pub const fn name(&self) -> &DatabaseName {
        &self.name
    }

    /// Returns a handle to a collection in this database.
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> InMemoryCollection {
        InMemoryCollection {
            database: self.clone(),
            name: name.into(),
        }
    }
}

/// Handle to one collection of JSON documents.
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    database: InMemoryDatabase,
    name: String,
}

impl InMemoryCollection {
    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts documents and returns how many were stored.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseClientError::Operation`] when the server has gone.
    pub fn insert_many(&self, documents: Vec<Value>) -> DatabaseClientResult<usize> {
        self.database
            .deployment
            .insert(
                self.database.port,
                self.database.name.as_str(),
                &self.name,
                documents,
            )
            .ok_or_else(server_gone)
    }

    /// Returns every document in the collection.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseClientError::Operation`] when the server has gone.
    pub fn find_all(&self) -> DatabaseClientResult<Vec<Value>> {
        self.database
            .deployment
            .documents(self.database.port, self.database.name.as_str(), &self.name)
            .ok_or_else(server_gone)
    }
}

fn server_gone() -> DatabaseClientError {
    DatabaseClientError::operation(io::Error::from(io::ErrorKind::NotConnected))
}
