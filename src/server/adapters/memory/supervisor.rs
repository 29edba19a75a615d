//! Scripted in-memory process supervisor for deterministic lifecycle tests.

use super::InMemoryDeployment;
use crate::server::{
    domain::ServerPort,
    ports::{LaunchError, LaunchParameters, LaunchResult, ProcessHandle, ProcessSupervisor},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome the in-memory supervisor reports for one launch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedLaunch {
    /// Bind the port if it is free, otherwise report "address in use".
    Ready,
    /// Report "address in use" regardless of the port.
    AddressInUse,
    /// Report a generic launch failure with the given message.
    Fail(String),
}

/// In-memory supervisor that replays scripted launch outcomes.
///
/// Scripted outcomes are consumed in order. Once the script is exhausted the
/// fallback outcome applies, which defaults to [`ScriptedLaunch::Ready`].
/// Successful launches bind their port in the shared [`InMemoryDeployment`];
/// shutdown signals release it and mark the process exited.
#[derive(Debug, Clone)]
pub struct InMemoryProcessSupervisor {
    deployment: InMemoryDeployment,
    state: Arc<Mutex<SupervisorState>>,
}

#[derive(Debug)]
struct SupervisorState {
    script: VecDeque<ScriptedLaunch>,
    fallback: ScriptedLaunch,
    launches: Vec<LaunchParameters>,
    live: Vec<ProcessHandle>,
    shutdown_signals: usize,
}

impl InMemoryProcessSupervisor {
    /// Creates a supervisor that binds servers in `deployment`.
    #[must_use]
    pub fn new(deployment: InMemoryDeployment) -> Self {
        Self {
            deployment,
            state: Arc::new(Mutex::new(SupervisorState {
                script: VecDeque::new(),
                fallback: ScriptedLaunch::Ready,
                launches: Vec::new(),
                live: Vec::new(),
                shutdown_signals: 0,
            })),
        }
    }

    /// Queues outcomes for the next launch attempts.
    pub fn script(&self, outcomes: impl IntoIterator<Item = ScriptedLaunch>) {
        self.lock().script.extend(outcomes);
    }

    /// Sets the outcome used once the script is exhausted.
    pub fn set_fallback(&self, outcome: ScriptedLaunch) {
        self.lock().fallback = outcome;
    }

    /// Returns how many launch attempts were made.
    #[must_use]
    pub fn launch_count(&self) -> usize {
        self.lock().launches.len()
    }

    /// Returns the port of every launch attempt, in order.
    #[must_use]
    pub fn launched_ports(&self) -> Vec<ServerPort> {
        self.lock()
            .launches
            .iter()
            .map(LaunchParameters::port)
            .collect()
    }

    /// Returns the parameters of every launch attempt, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchParameters> {
        self.lock().launches.clone()
    }

    /// Returns how many shutdown signals were delivered.
    #[must_use]
    pub fn shutdown_signal_count(&self) -> usize {
        self.lock().shutdown_signals
    }

    /// Kills the process on `port` without a shutdown request.
    ///
    /// The port is released and the process handle reports that it exited.
    /// Returns `false` when no live process owns the port.
    pub fn kill(&self, port: ServerPort) -> bool {
        let killed: Vec<ProcessHandle> = {
            let mut state = self.lock();
            let (killed, live) = std::mem::take(&mut state.live)
                .into_iter()
                .partition(|handle| handle.port() == port);
            state.live = live;
            killed
        };
        for handle in &killed {
            handle.mark_exited();
        }
        self.deployment.unbind(port);
        !killed.is_empty()
    }

    /// Returns the deployment this supervisor binds servers in.
    #[must_use]
    pub const fn deployment(&self) -> &InMemoryDeployment {
        &self.deployment
    }

    fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_outcome(&self, parameters: &LaunchParameters) -> ScriptedLaunch {
        let mut state = self.lock();
        state.launches.push(parameters.clone());
        let fallback = state.fallback.clone();
        state.script.pop_front().unwrap_or(fallback)
    }
}

#[async_trait]
impl ProcessSupervisor for InMemoryProcessSupervisor {
    async fn launch(&self, parameters: &LaunchParameters) -> LaunchResult<ProcessHandle> {
        let port = parameters.port();
        match self.next_outcome(parameters) {
            ScriptedLaunch::Ready if self.deployment.bind(port) => {
                let handle = ProcessHandle::new(port);
                self.lock().live.push(handle.clone());
                Ok(handle)
            }
            ScriptedLaunch::Ready | ScriptedLaunch::AddressInUse => {
                Err(LaunchError::AddressInUse(port))
            }
            ScriptedLaunch::Fail(message) => Err(LaunchError::failure(std::io::Error::other(message))),
        }
    }

    fn signal_shutdown(&self, handle: &ProcessHandle) {
        handle.request_shutdown();
        self.deployment.unbind(handle.port());
        handle.mark_exited();
        let mut state = self.lock();
        state
            .live
            .retain(|live| live.instance_id() != handle.instance_id());
        state.shutdown_signals += 1;
    }
}
