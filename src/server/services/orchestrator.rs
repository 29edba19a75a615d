//! Sandbox server lifecycle orchestration.

use super::registry::{Connection, ConnectionRegistry, ConnectionRegistryError, ShutdownError};
use crate::server::{
    domain::{
        DEFAULT_DATABASE_NAME, DatabaseName, SandboxDomainError, ServerConfig,
        ServerLifecycleState, ServerPort, ServerStatus,
    },
    ports::{
        DatabaseConnector, LaunchError, LaunchParameters, PortAllocationError, PortSource,
        ProcessHandle, ProcessSupervisor,
    },
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Service-level errors for sandbox lifecycle operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] SandboxDomainError),
    /// No free port could be obtained.
    #[error(transparent)]
    PortAllocation(#[from] PortAllocationError),
    /// The server could not be started.
    #[error("failed to start database server")]
    StartFailure(#[source] LaunchError),
    /// Opening a connection failed.
    #[error(transparent)]
    Registry(#[from] ConnectionRegistryError),
    /// Closing clients during shutdown failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Result type for orchestrator operations.
pub type MockServerResult<T> = Result<T, MockServerError>;

/// State guarded by the orchestrator's lifecycle lock.
#[derive(Debug)]
struct OrchestratorState {
    config: ServerConfig,
    lifecycle: ServerLifecycleState,
    process: Option<ProcessHandle>,
    started_at: Option<DateTime<Utc>>,
}

impl OrchestratorState {
    fn transition_to(&mut self, target: ServerLifecycleState) -> Result<(), SandboxDomainError> {
        self.lifecycle = self.lifecycle.transition_to(target)?;
        Ok(())
    }

    /// Forgets a process that exited without being asked to and returns to
    /// idle, keeping the port so the next start rebinds it.
    fn reap_exited_process(&mut self) {
        let Some(handle) = self.process.take_if(|handle| handle.has_exited()) else {
            return;
        };
        tracing::warn!(
            port = %handle.port(),
            instance_id = %handle.instance_id(),
            "database server exited unexpectedly"
        );
        self.config.mark_stopped();
        self.lifecycle = ServerLifecycleState::Idle;
        self.started_at = None;
    }

    fn status(&self) -> ServerStatus {
        ServerStatus::new(
            self.lifecycle,
            self.config.port(),
            self.process.as_ref().map(ProcessHandle::instance_id),
            self.started_at,
        )
    }
}

/// Owns one ephemeral database server and the connections made against it.
///
/// Every lifecycle operation holds an async lock for its whole duration, so
/// a second `start` waits for the first to settle instead of launching
/// again, and `shut_down` never overlaps a start. Connection lookups for
/// already-cached databases bypass the lock.
pub struct MockServerOrchestrator<P, S, K, C>
where
    P: PortSource,
    S: ProcessSupervisor,
    K: DatabaseConnector,
    C: Clock + Send + Sync,
{
    port_source: Arc<P>,
    supervisor: Arc<S>,
    registry: ConnectionRegistry<K>,
    clock: Arc<C>,
    state: Mutex<OrchestratorState>,
}

impl<P, S, K, C> MockServerOrchestrator<P, S, K, C>
where
    P: PortSource,
    S: ProcessSupervisor,
    K: DatabaseConnector,
    C: Clock + Send + Sync,
{
    /// Creates an idle orchestrator.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        port_source: Arc<P>,
        supervisor: Arc<S>,
        connector: Arc<K>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            port_source,
            supervisor,
            registry: ConnectionRegistry::new(connector),
            clock,
            state: Mutex::new(OrchestratorState {
                config,
                lifecycle: ServerLifecycleState::Idle,
                process: None,
                started_at: None,
            }),
        }
    }

    /// Starts the server if it is not already running.
    ///
    /// The first start takes a port from the port source unless one was
    /// configured. Launches that hit "address in use" are retried on the same
    /// port after the configured backoff, up to `max_retries` times. A server
    /// whose process has died since the last start counts as not running.
    /// Cached connections are kept across such a restart since they target
    /// the same port.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::PortAllocation`] when no port is available
    /// and [`MockServerError::StartFailure`] when the launch fails or the
    /// retries run out. The orchestrator is left idle either way.
    pub async fn start(&self) -> MockServerResult<ServerConfig> {
        let mut state = self.state.lock().await;
        state.reap_exited_process();
        if state.lifecycle.is_running() {
            return Ok(state.config.clone());
        }

        state.transition_to(ServerLifecycleState::Starting)?;
        match self.launch_with_retries(&mut state.config).await {
            Ok(handle) => {
                state.config.mark_started();
                state.started_at = Some(self.clock.utc());
                tracing::info!(
                    port = %handle.port(),
                    instance_id = %handle.instance_id(),
                    "database server started"
                );
                state.process = Some(handle);
                state.transition_to(ServerLifecycleState::Running)?;
                Ok(state.config.clone())
            }
            Err(err) => {
                state.config.mark_stopped();
                state.transition_to(ServerLifecycleState::Idle)?;
                tracing::warn!(%err, "database server failed to start");
                Err(err)
            }
        }
    }

    /// Returns the configuration of the running server, starting it first
    /// when needed.
    ///
    /// # Errors
    ///
    /// Propagates any [`MockServerOrchestrator::start`] failure.
    pub async fn get_config(&self) -> MockServerResult<ServerConfig> {
        {
            let mut state = self.state.lock().await;
            state.reap_exited_process();
            if state.config.is_started() {
                return Ok(state.config.clone());
            }
        }
        self.start().await
    }

    /// Returns the connection for database `name`, starting the server and
    /// opening the connection on first use.
    ///
    /// A cached connection is returned without consulting server state.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Domain`] for an invalid name, start
    /// failures, or [`MockServerError::Registry`] when connecting fails.
    pub async fn get_connection(&self, name: &str) -> MockServerResult<Connection<K>> {
        let database = DatabaseName::new(name)?;
        if let Some(connection) = self.registry.cached(&database) {
            return Ok(connection);
        }

        let config = self.get_config().await?;
        Ok(self.registry.get_or_open(&config, &database).await?)
    }

    /// Returns the connection for the default `test` database.
    ///
    /// # Errors
    ///
    /// See [`MockServerOrchestrator::get_connection`].
    pub async fn get_default_connection(&self) -> MockServerResult<Connection<K>> {
        self.get_connection(DEFAULT_DATABASE_NAME).await
    }

    /// Stops the server and closes every connection.
    ///
    /// The process is signalled first, then the grace interval elapses, then
    /// all clients are closed and the state returns to idle. The sequence
    /// runs even when nothing was started. The assigned port is kept for the
    /// next start.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Shutdown`] when one or more clients fail to
    /// close. State is cleared regardless.
    pub async fn shut_down(&self) -> MockServerResult<()> {
        let mut state = self.state.lock().await;
        let process = state.process.take();

        if let Some(handle) = &process {
            self.supervisor.signal_shutdown(handle);
            state.config.mark_stopped();
            state.lifecycle = ServerLifecycleState::ShuttingDown;
            tracing::info!(
                port = %handle.port(),
                instance_id = %handle.instance_id(),
                "database server shutdown signalled"
            );
        }

        tokio::time::sleep(state.config.shutdown_grace()).await;
        let closed = self.registry.drain_and_close().await;

        state.started_at = None;
        state.lifecycle = ServerLifecycleState::Idle;
        Ok(closed?)
    }

    /// Returns a snapshot of the server lifecycle.
    pub async fn status(&self) -> ServerStatus {
        let mut state = self.state.lock().await;
        state.reap_exited_process();
        state.status()
    }

    /// Returns whether the server is running.
    pub async fn is_running(&self) -> bool {
        let mut state = self.state.lock().await;
        state.reap_exited_process();
        state.lifecycle.is_running()
    }

    /// Returns the connection registry.
    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry<K> {
        &self.registry
    }

    async fn launch_with_retries(
        &self,
        config: &mut ServerConfig,
    ) -> MockServerResult<ProcessHandle> {
        let port = self.resolve_port(config)?;
        let parameters = LaunchParameters::from_config(config)?;
        let mut attempt: u32 = 0;

        loop {
            tracing::debug!(%port, attempt, "launching database server");
            match self.supervisor.launch(&parameters).await {
                Ok(handle) => return Ok(handle),
                Err(LaunchError::AddressInUse(_)) if attempt < config.max_retries() => {
                    tracing::warn!(
                        %port,
                        attempt,
                        max_retries = config.max_retries(),
                        "port in use, retrying after backoff"
                    );
                    tokio::time::sleep(config.retry_backoff()).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(MockServerError::StartFailure(err)),
            }
        }
    }

    fn resolve_port(&self, config: &mut ServerConfig) -> MockServerResult<ServerPort> {
        if let Some(port) = config.port() {
            return Ok(port);
        }
        let port = self.port_source.acquire()?;
        config.assign_port(port);
        tracing::debug!(%port, "assigned database server port");
        Ok(port)
    }
}

impl<P, S, K, C> Drop for MockServerOrchestrator<P, S, K, C>
where
    P: PortSource,
    S: ProcessSupervisor,
    K: DatabaseConnector,
    C: Clock + Send + Sync,
{
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.config.auto_shutdown() {
            return;
        }
        if let Some(handle) = state.process.take() {
            tracing::debug!(port = %handle.port(), "orchestrator dropped while running");
            self.supervisor.signal_shutdown(&handle);
        }
    }
}
