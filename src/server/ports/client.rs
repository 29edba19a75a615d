//! Database client port used to open connections against a running server.

use crate::server::domain::{ConnectionUri, DatabaseName};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for database client operations.
pub type DatabaseClientResult<T> = Result<T, DatabaseClientError>;

/// Opens network clients against a server.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Client type produced by this connector.
    type Client: DatabaseClient;

    /// Connects to the server named by `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseClientError::Connect`] when the handshake fails.
    async fn connect(&self, uri: &ConnectionUri) -> DatabaseClientResult<Self::Client>;
}

/// An open network client.
#[async_trait]
pub trait DatabaseClient: Send + Sync + 'static {
    /// Database-scoped handle derived from this client.
    type Database: Send + Sync + 'static;

    /// Derives a handle scoped to one database.
    fn database(&self, name: &DatabaseName) -> Self::Database;

    /// Returns whether the client holds resources that must be released.
    ///
    /// Clients returning `false` are skipped during shutdown.
    fn can_close(&self) -> bool {
        true
    }

    /// Closes the client.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseClientError::Close`] when the client cannot be closed.
    async fn close(&self) -> DatabaseClientResult<()>;
}

/// Errors returned by database client adapters.
#[derive(Debug, Clone, Error)]
pub enum DatabaseClientError {
    /// Connecting to the server failed.
    #[error("failed to connect to {uri}: {cause}")]
    Connect {
        /// Target that was dialled.
        uri: String,
        /// Underlying transport failure.
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Closing the client failed.
    #[error("failed to close database client: {0}")]
    Close(Arc<dyn std::error::Error + Send + Sync>),

    /// A database operation failed.
    #[error("database operation failed: {0}")]
    Operation(Arc<dyn std::error::Error + Send + Sync>),
}

impl DatabaseClientError {
    /// Wraps a connect failure for `uri`.
    pub fn connect(
        uri: &ConnectionUri,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connect {
            uri: uri.as_str().to_owned(),
            cause: Arc::new(err),
        }
    }

    /// Wraps a close failure.
    pub fn close(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Close(Arc::new(err))
    }

    /// Wraps a failed database operation.
    pub fn operation(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Operation(Arc::new(err))
    }
}
