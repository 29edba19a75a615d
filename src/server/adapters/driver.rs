//! Database client adapter backed by the official `mongodb` driver.

use crate::server::{
    domain::{ConnectionUri, DatabaseName},
    ports::{DatabaseClient, DatabaseClientError, DatabaseClientResult, DatabaseConnector},
};
use async_trait::async_trait;
use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use std::time::Duration;

const APP_NAME: &str = "mongo-sandbox";
const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connector that opens `mongodb` driver clients against the sandbox server.
///
/// The driver connects lazily, so every connect pings the target database.
/// An unreachable server then fails here with
/// [`DatabaseClientError::Connect`] instead of on the first operation.
#[derive(Debug, Clone, Copy)]
pub struct MongoDriverConnector {
    server_selection_timeout: Duration,
}

impl Default for MongoDriverConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MongoDriverConnector {
    /// Creates a connector with a five second server selection timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            server_selection_timeout: DEFAULT_SERVER_SELECTION_TIMEOUT,
        }
    }

    /// Sets how long a connect waits for the server to become selectable.
    #[must_use]
    pub const fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    /// Returns the server selection timeout.
    #[must_use]
    pub const fn server_selection_timeout(&self) -> Duration {
        self.server_selection_timeout
    }
}

#[async_trait]
impl DatabaseConnector for MongoDriverConnector {
    type Client = MongoDriverClient;

    async fn connect(&self, uri: &ConnectionUri) -> DatabaseClientResult<MongoDriverClient> {
        let mut options = ClientOptions::parse(uri.as_str())
            .await
            .map_err(|err| DatabaseClientError::connect(uri, err))?;
        options.app_name = Some(APP_NAME.to_owned());
        options.server_selection_timeout = Some(self.server_selection_timeout);

        let client =
            Client::with_options(options).map_err(|err| DatabaseClientError::connect(uri, err))?;
        client
            .database(uri.database().as_str())
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| DatabaseClientError::connect(uri, err))?;

        tracing::debug!(%uri, "driver client connected");
        Ok(MongoDriverClient { client })
    }
}

/// Driver client connected to one sandbox server.
#[derive(Debug, Clone)]
pub struct MongoDriverClient {
    client: Client,
}

impl MongoDriverClient {
    /// Returns the underlying driver client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl DatabaseClient for MongoDriverClient {
    type Database = Database;

    fn database(&self, name: &DatabaseName) -> Database {
        self.client.database(name.as_str())
    }

    async fn close(&self) -> DatabaseClientResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
