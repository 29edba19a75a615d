//! Sandbox server configuration.

use super::{DatabaseName, ParseStorageModeError, ServerPort};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use uuid::Uuid;

/// Database opened when a caller does not name one.
pub const DEFAULT_DATABASE_NAME: &str = "test";

const CONNECTION_SCHEME: &str = "mongodb";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MILLIS: u64 = 200;
const DEFAULT_SHUTDOWN_GRACE_MILLIS: u64 = 100;

/// Storage engine the sandbox server runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageMode {
    /// Test-only ephemeral engine shipped with older server releases.
    #[default]
    #[serde(rename = "ephemeralForTest")]
    EphemeralForTest,
    /// In-memory engine.
    #[serde(rename = "inMemory")]
    InMemory,
    /// Default on-disk engine, for server builds without the other two.
    #[serde(rename = "wiredTiger")]
    WiredTiger,
}

impl StorageMode {
    /// Returns the engine name understood by `--storageEngine`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EphemeralForTest => "ephemeralForTest",
            Self::InMemory => "inMemory",
            Self::WiredTiger => "wiredTiger",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StorageMode {
    type Error = ParseStorageModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "ephemeralForTest" => Ok(Self::EphemeralForTest),
            "inMemory" => Ok(Self::InMemory),
            "wiredTiger" => Ok(Self::WiredTiger),
            _ => Err(ParseStorageModeError(value.to_owned())),
        }
    }
}

/// Configuration and readiness flag for one sandbox server.
///
/// The host is always the IPv4 loopback address. The port is optional until
/// the first start assigns one; after that it is reused for every restart.
/// Only the orchestrator flips `started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(skip_deserializing)]
    host: IpAddr,
    port: Option<ServerPort>,
    storage_mode: StorageMode,
    data_path: Utf8PathBuf,
    auto_shutdown: bool,
    max_retries: u32,
    retry_backoff_millis: u64,
    shutdown_grace_millis: u64,
    #[serde(skip_deserializing)]
    started: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
            storage_mode: StorageMode::default(),
            data_path: default_data_path(),
            auto_shutdown: true,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_millis: DEFAULT_RETRY_BACKOFF_MILLIS,
            shutdown_grace_millis: DEFAULT_SHUTDOWN_GRACE_MILLIS,
            started: false,
        }
    }
}

/// Returns a data directory unique to one configuration.
///
/// Two servers sharing a `--dbpath` contend for its lock file, so every
/// default configuration gets its own directory under the system temp dir.
fn default_data_path() -> Utf8PathBuf {
    let temp_dir = std::env::temp_dir();
    let base = Utf8PathBuf::try_from(temp_dir).unwrap_or_else(|err| {
        tracing::warn!(
            path = %err.as_path().display(),
            "system temp dir is not UTF-8, using the working directory for sandbox data"
        );
        Utf8PathBuf::from(".")
    });
    base.join(format!("mongo-sandbox-{}", Uuid::new_v4().simple()))
        .join(".data")
}

impl ServerConfig {
    /// Creates a configuration populated with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the server to a fixed port instead of asking the OS for one.
    #[must_use]
    pub const fn with_port(mut self, port: ServerPort) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the storage engine.
    #[must_use]
    pub const fn with_storage_mode(mut self, storage_mode: StorageMode) -> Self {
        self.storage_mode = storage_mode;
        self
    }

    /// Sets the directory used for transient storage.
    #[must_use]
    pub fn with_data_path(mut self, data_path: impl Into<Utf8PathBuf>) -> Self {
        self.data_path = data_path.into();
        self
    }

    /// Sets whether the process is torn down together with its owner.
    #[must_use]
    pub const fn with_auto_shutdown(mut self, auto_shutdown: bool) -> Self {
        self.auto_shutdown = auto_shutdown;
        self
    }

    /// Sets how many times a launch is retried after "address in use".
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the fixed wait between port-contention retries.
    #[must_use]
    pub const fn with_retry_backoff_millis(mut self, millis: u64) -> Self {
        self.retry_backoff_millis = millis;
        self
    }

    /// Sets the wait between signalling shutdown and closing clients.
    #[must_use]
    pub const fn with_shutdown_grace_millis(mut self, millis: u64) -> Self {
        self.shutdown_grace_millis = millis;
        self
    }

    /// Returns the loopback host the server binds to.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// Returns the assigned port, if any.
    #[must_use]
    pub const fn port(&self) -> Option<ServerPort> {
        self.port
    }

    /// Returns the storage engine.
    #[must_use]
    pub const fn storage_mode(&self) -> StorageMode {
        self.storage_mode
    }

    /// Returns the transient storage directory.
    #[must_use]
    pub const fn data_path(&self) -> &Utf8PathBuf {
        &self.data_path
    }

    /// Returns whether the process is torn down together with its owner.
    #[must_use]
    pub const fn auto_shutdown(&self) -> bool {
        self.auto_shutdown
    }

    /// Returns the port-contention retry bound.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the wait between port-contention retries.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_millis)
    }

    /// Returns the shutdown grace interval.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_millis)
    }

    /// Returns whether the server confirmed a successful bind.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Returns `host:port` once a port is assigned.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.port.map(|port| format!("{}:{port}", self.host))
    }

    /// Builds the connection target for `database` once a port is assigned.
    #[must_use]
    pub fn connection_uri(&self, database: &DatabaseName) -> Option<ConnectionUri> {
        self.port
            .map(|port| ConnectionUri::new(self.host, port, database.clone()))
    }

    pub(crate) const fn assign_port(&mut self, port: ServerPort) {
        self.port = Some(port);
    }

    pub(crate) const fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) const fn mark_stopped(&mut self) {
        self.started = false;
    }
}

/// Connection target of the shape `mongodb://host:port/database`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionUri {
    host: IpAddr,
    port: ServerPort,
    database: DatabaseName,
    uri: String,
}

impl ConnectionUri {
    /// Creates a connection target for one database.
    #[must_use]
    pub fn new(host: IpAddr, port: ServerPort, database: DatabaseName) -> Self {
        let uri = format!("{CONNECTION_SCHEME}://{host}:{port}/{database}");
        Self {
            host,
            port,
            database,
            uri,
        }
    }

    /// Returns the target host.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// Returns the target port.
    #[must_use]
    pub const fn port(&self) -> ServerPort {
        self.port
    }

    /// Returns the target database.
    #[must_use]
    pub const fn database(&self) -> &DatabaseName {
        &self.database
    }

    /// Returns the rendered URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl AsRef<str> for ConnectionUri {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
