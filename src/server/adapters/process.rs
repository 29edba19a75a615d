//! Process supervisor that runs a real `mongod` binary.

use crate::server::{
    domain::{ServerInstanceId, ServerPort},
    ports::{LaunchError, LaunchParameters, LaunchResult, ProcessHandle, ProcessSupervisor},
};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

const DEFAULT_BINARY: &str = "mongod";

/// Log fragment `mongod` prints once it accepts connections.
const READY_MARKER: &str = "waiting for connections";

/// Log fragments `mongod` prints when its port is taken.
const ADDRESS_IN_USE_MARKERS: [&str; 2] = ["address already in use", "eaddrinuse"];

/// Exit code `mongod` uses for network setup failures.
const NET_ERROR_EXIT_CODE: i32 = 48;

/// Supervisor that spawns `mongod` and watches its log output.
///
/// A launch resolves once the process logs that it is waiting for
/// connections. Port contention is recognised from the log or from the
/// network-error exit code. After readiness a background task keeps draining
/// the output and delivers `SIGTERM` when the handle's shutdown token is
/// cancelled.
#[derive(Debug, Clone)]
pub struct MongodSupervisor {
    binary: Utf8PathBuf,
}

impl Default for MongodSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl MongodSupervisor {
    /// Creates a supervisor for the binary at `binary`.
    ///
    /// A bare name is resolved through `PATH`.
    #[must_use]
    pub fn new(binary: impl Into<Utf8PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Returns the binary this supervisor runs.
    #[must_use]
    pub const fn binary(&self) -> &Utf8PathBuf {
        &self.binary
    }
}

#[async_trait]
impl ProcessSupervisor for MongodSupervisor {
    async fn launch(&self, parameters: &LaunchParameters) -> LaunchResult<ProcessHandle> {
        let port = parameters.port();
        tokio::fs::create_dir_all(parameters.data_path())
            .await
            .map_err(LaunchError::failure)?;

        let mut child = Command::new(self.binary.as_std_path())
            .args(mongod_arguments(parameters))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(parameters.auto_shutdown())
            .spawn()
            .map_err(LaunchError::failure)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::failure(io::Error::other("mongod stdout not captured")))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, port));
        }

        let mut lines = BufReader::new(stdout).lines();
        match await_readiness(&mut lines).await {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::AddressInUse) => {
                reap(&mut child).await;
                return Err(LaunchError::AddressInUse(port));
            }
            Ok(Readiness::Exited) => return Err(exit_before_ready(&mut child, port).await),
            Err(err) => {
                reap(&mut child).await;
                return Err(LaunchError::failure(err));
            }
        }

        let handle = ProcessHandle::new(port);
        tracing::info!(
            %port,
            instance_id = %handle.instance_id(),
            pid = child.id(),
            "mongod is accepting connections"
        );
        tokio::spawn(supervise(child, lines, handle.clone()));
        Ok(handle)
    }
}

fn mongod_arguments(parameters: &LaunchParameters) -> Vec<String> {
    vec![
        "--storageEngine".to_owned(),
        parameters.storage_mode().as_str().to_owned(),
        "--bind_ip".to_owned(),
        parameters.host().to_string(),
        "--port".to_owned(),
        parameters.port().to_string(),
        "--dbpath".to_owned(),
        parameters.data_path().to_string(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    AddressInUse,
    Exited,
}

fn classify(line: &str) -> Option<Readiness> {
    let lowered = line.to_ascii_lowercase();
    if ADDRESS_IN_USE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Some(Readiness::AddressInUse);
    }
    lowered.contains(READY_MARKER).then_some(Readiness::Ready)
}

async fn await_readiness<R>(lines: &mut Lines<BufReader<R>>) -> io::Result<Readiness>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        tracing::trace!(target: "mongod", "{line}");
        if let Some(readiness) = classify(&line) {
            return Ok(readiness);
        }
    }
    Ok(Readiness::Exited)
}

async fn exit_before_ready(child: &mut Child, port: ServerPort) -> LaunchError {
    match child.wait().await {
        Ok(status) if status.code() == Some(NET_ERROR_EXIT_CODE) => LaunchError::AddressInUse(port),
        Ok(status) => LaunchError::failure(io::Error::other(format!(
            "mongod exited before accepting connections ({status})"
        ))),
        Err(err) => LaunchError::failure(err),
    }
}

async fn reap(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        tracing::debug!(%err, "mongod already exited");
    }
    if let Err(err) = child.wait().await {
        tracing::warn!(%err, "failed to reap mongod");
    }
}

async fn drain_stderr(stderr: ChildStderr, port: ServerPort) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(%port, "mongod stderr: {line}");
    }
}

/// Drains output until the process exits or shutdown is requested, then
/// marks the handle exited.
async fn supervise(
    mut child: Child,
    mut lines: Lines<BufReader<ChildStdout>>,
    handle: ProcessHandle,
) {
    watch(&mut child, &mut lines, &handle.shutdown_token(), handle.instance_id()).await;
    handle.mark_exited();
}

async fn watch(
    child: &mut Child,
    lines: &mut Lines<BufReader<ChildStdout>>,
    shutdown: &CancellationToken,
    instance_id: ServerInstanceId,
) {
    let mut output_open = true;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                terminate(child);
                match child.wait().await {
                    Ok(status) => tracing::info!(%instance_id, %status, "mongod stopped"),
                    Err(err) => tracing::warn!(%instance_id, %err, "failed to wait for mongod"),
                }
                return;
            }
            line = lines.next_line(), if output_open => match line {
                Ok(Some(text)) => tracing::trace!(target: "mongod", %instance_id, "{text}"),
                Ok(None) | Err(_) => output_open = false,
            },
            status = child.wait(), if !output_open => {
                tracing::warn!(%instance_id, ?status, "mongod exited without a shutdown request");
                return;
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        tracing::debug!(%err, pid, "SIGTERM failed, killing mongod");
        if let Err(kill_err) = child.start_kill() {
            tracing::debug!(%kill_err, pid, "mongod already exited");
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        tracing::debug!(%err, "mongod already exited");
    }
}
