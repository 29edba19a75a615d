//! Shared fixtures for in-memory sandbox integration tests.

use mockable::DefaultClock;
use mongo_sandbox::server::{
    adapters::{
        OsPortSource,
        memory::{InMemoryConnector, InMemoryDeployment, InMemoryProcessSupervisor},
    },
    domain::ServerConfig,
    services::MockServerOrchestrator,
};
use rstest::fixture;
use std::sync::Arc;

/// Orchestrator wired to the OS port source and the in-memory deployment.
pub type TestOrchestrator =
    MockServerOrchestrator<OsPortSource, InMemoryProcessSupervisor, InMemoryConnector, DefaultClock>;

/// An orchestrator together with the doubles it drives.
pub struct Sandbox {
    pub deployment: InMemoryDeployment,
    pub supervisor: Arc<InMemoryProcessSupervisor>,
    pub connector: Arc<InMemoryConnector>,
    pub orchestrator: TestOrchestrator,
}

/// Configuration with short waits so lifecycle tests stay fast.
#[must_use]
pub fn fast_config() -> ServerConfig {
    ServerConfig::default()
        .with_retry_backoff_millis(5)
        .with_shutdown_grace_millis(5)
}

/// Builds a sandbox around `config`.
#[must_use]
pub fn sandbox_with(config: ServerConfig) -> Sandbox {
    let deployment = InMemoryDeployment::new();
    let supervisor = Arc::new(InMemoryProcessSupervisor::new(deployment.clone()));
    let connector = Arc::new(InMemoryConnector::new(deployment.clone()));
    let orchestrator = MockServerOrchestrator::new(
        config,
        Arc::new(OsPortSource),
        Arc::clone(&supervisor),
        Arc::clone(&connector),
        Arc::new(DefaultClock),
    );
    Sandbox {
        deployment,
        supervisor,
        connector,
        orchestrator,
    }
}

/// Provides a fresh sandbox with the fast configuration.
#[fixture]
pub fn sandbox() -> Sandbox {
    sandbox_with(fast_config())
}
