//! Sandbox server lifecycle states and status snapshots.

use super::{ParseServerLifecycleStateError, SandboxDomainError, ServerInstanceId, ServerPort};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the sandbox server owned by one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerLifecycleState {
    /// No process is running.
    #[default]
    Idle,
    /// A launch sequence is in flight, possibly retrying.
    Starting,
    /// The process confirmed a successful bind.
    Running,
    /// Shutdown was signalled and the grace interval is elapsing.
    ShuttingDown,
}

impl ServerLifecycleState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
        }
    }

    /// Returns whether connections may be opened in this state.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Starting | Self::ShuttingDown)
                | (Self::Starting, Self::Running | Self::Idle)
                | (Self::Running, Self::ShuttingDown)
                | (Self::ShuttingDown, Self::Idle)
        )
    }

    /// Returns `target` when the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxDomainError::InvalidLifecycleTransition`] otherwise.
    pub fn transition_to(self, target: Self) -> Result<Self, SandboxDomainError> {
        if self.can_transition_to(target) {
            return Ok(target);
        }

        Err(SandboxDomainError::InvalidLifecycleTransition {
            from: self.as_str().to_owned(),
            to: target.as_str().to_owned(),
        })
    }
}

impl fmt::Display for ServerLifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServerLifecycleState {
    type Error = ParseServerLifecycleStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "idle" => Ok(Self::Idle),
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "shutting_down" => Ok(Self::ShuttingDown),
            _ => Err(ParseServerLifecycleStateError(value.to_owned())),
        }
    }
}

/// Point-in-time view of an orchestrator's server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    state: ServerLifecycleState,
    port: Option<ServerPort>,
    instance_id: Option<ServerInstanceId>,
    started_at: Option<DateTime<Utc>>,
}

impl ServerStatus {
    /// Creates a status snapshot.
    #[must_use]
    pub const fn new(
        state: ServerLifecycleState,
        port: Option<ServerPort>,
        instance_id: Option<ServerInstanceId>,
        started_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            state,
            port,
            instance_id,
            started_at,
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerLifecycleState {
        self.state
    }

    /// Returns the assigned port, which survives shutdown.
    #[must_use]
    pub const fn port(&self) -> Option<ServerPort> {
        self.port
    }

    /// Returns the identifier of the live process.
    #[must_use]
    pub const fn instance_id(&self) -> Option<ServerInstanceId> {
        self.instance_id
    }

    /// Returns when the live process confirmed readiness.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
