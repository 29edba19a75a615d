//! Process supervision port for launching and stopping the server binary.

use crate::server::domain::{
    SandboxDomainError, ServerConfig, ServerInstanceId, ServerPort, StorageMode,
};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for launch attempts.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Launches the external server and relays shutdown requests to it.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Launches a server and resolves once it accepts connections.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::AddressInUse`] when the port is already bound
    /// and [`LaunchError::Failure`] for any other launch failure.
    async fn launch(&self, parameters: &LaunchParameters) -> LaunchResult<ProcessHandle>;

    /// Asks the process to stop without waiting for it to exit.
    fn signal_shutdown(&self, handle: &ProcessHandle) {
        handle.request_shutdown();
    }
}

/// Launch failures reported by a [`ProcessSupervisor`].
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    /// The port is already bound by another process.
    #[error("address already in use on port {0}")]
    AddressInUse(ServerPort),

    /// Any other launch failure.
    #[error("server launch failed: {0}")]
    Failure(Arc<dyn std::error::Error + Send + Sync>),
}

impl LaunchError {
    /// Wraps a non-port launch failure.
    pub fn failure(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Failure(Arc::new(err))
    }

    /// Returns whether the failure is port contention.
    #[must_use]
    pub const fn is_address_in_use(&self) -> bool {
        matches!(self, Self::AddressInUse(_))
    }
}

/// Everything the supervisor needs to bind a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParameters {
    host: IpAddr,
    port: ServerPort,
    storage_mode: StorageMode,
    data_path: Utf8PathBuf,
    auto_shutdown: bool,
}

impl LaunchParameters {
    /// Extracts launch parameters from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxDomainError::PortNotAssigned`] when the configuration
    /// has no port yet.
    pub fn from_config(config: &ServerConfig) -> Result<Self, SandboxDomainError> {
        let port = config.port().ok_or(SandboxDomainError::PortNotAssigned)?;
        Ok(Self {
            host: config.host(),
            port,
            storage_mode: config.storage_mode(),
            data_path: config.data_path().clone(),
            auto_shutdown: config.auto_shutdown(),
        })
    }

    /// Returns the bind address.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// Returns the bind port.
    #[must_use]
    pub const fn port(&self) -> ServerPort {
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

    /// Returns whether the process dies together with its owner.
    #[must_use]
    pub const fn auto_shutdown(&self) -> bool {
        self.auto_shutdown
    }
}

/// Handle to a launched server process.
///
/// The handle carries the cancellation token the supervisor watches. Cancelling
/// it is the shutdown signal; nothing acknowledges it. A second token is
/// cancelled by the supervisor once the process has exited, for whatever
/// reason, so owners can tell a live process from a dead one.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    instance_id: ServerInstanceId,
    port: ServerPort,
    shutdown: CancellationToken,
    exited: CancellationToken,
}

impl ProcessHandle {
    /// Creates a handle for a process bound to `port`.
    #[must_use]
    pub fn new(port: ServerPort) -> Self {
        Self {
            instance_id: ServerInstanceId::new(),
            port,
            shutdown: CancellationToken::new(),
            exited: CancellationToken::new(),
        }
    }

    /// Returns the process instance identifier.
    #[must_use]
    pub const fn instance_id(&self) -> ServerInstanceId {
        self.instance_id
    }

    /// Returns the port the process bound.
    #[must_use]
    pub const fn port(&self) -> ServerPort {
        self.port
    }

    /// Returns a token that is cancelled when shutdown is requested.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Records that the process has exited.
    pub fn mark_exited(&self) {
        self.exited.cancel();
    }

    /// Returns whether the process has exited.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited.is_cancelled()
    }
}
