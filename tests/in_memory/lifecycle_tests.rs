//! Start, restart, and status behaviour of the orchestrator.

use super::helpers::{Sandbox, fast_config, sandbox, sandbox_with};
use mongo_sandbox::server::domain::{ServerLifecycleState, ServerPort, StorageMode};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_assigns_a_port_and_confirms_readiness(sandbox: Sandbox) {
    let config = sandbox
        .orchestrator
        .start()
        .await
        .expect("start should succeed");

    let port = config.port().expect("port should be assigned");
    assert!(config.is_started());
    assert!(sandbox.deployment.is_bound(port));
    assert!(sandbox.orchestrator.is_running().await);
    assert_eq!(
        config.address(),
        Some(format!("127.0.0.1:{}", port.value()))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_while_running_returns_the_same_config(sandbox: Sandbox) {
    let first = sandbox
        .orchestrator
        .start()
        .await
        .expect("first start should succeed");
    let second = sandbox
        .orchestrator
        .start()
        .await
        .expect("second start should succeed");

    assert_eq!(first, second);
    assert_eq!(sandbox.supervisor.launch_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_config_starts_the_server_on_first_use(sandbox: Sandbox) {
    assert_eq!(sandbox.supervisor.launch_count(), 0);

    let config = sandbox
        .orchestrator
        .get_config()
        .await
        .expect("config should be available");
    let again = sandbox
        .orchestrator
        .get_config()
        .await
        .expect("config should be available");

    assert!(config.is_started());
    assert_eq!(config, again);
    assert_eq!(sandbox.supervisor.launch_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn launch_receives_the_configured_storage_and_data_path() {
    let sandbox = sandbox_with(
        fast_config()
            .with_storage_mode(StorageMode::InMemory)
            .with_data_path("/tmp/sandbox-lifecycle"),
    );

    sandbox
        .orchestrator
        .start()
        .await
        .expect("start should succeed");

    let launches = sandbox.supervisor.launches();
    let launch = launches.first().expect("one launch should be recorded");
    assert_eq!(launch.storage_mode(), StorageMode::InMemory);
    assert_eq!(launch.data_path().as_str(), "/tmp/sandbox-lifecycle");
    assert!(launch.auto_shutdown());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_after_shutdown_reuses_the_port(sandbox: Sandbox) {
    let first = sandbox
        .orchestrator
        .start()
        .await
        .expect("start should succeed");
    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("shutdown should succeed");
    let second = sandbox
        .orchestrator
        .start()
        .await
        .expect("restart should succeed");

    assert_eq!(first.port(), second.port());
    assert_eq!(sandbox.supervisor.launch_count(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_follows_the_lifecycle(sandbox: Sandbox) {
    let idle = sandbox.orchestrator.status().await;
    sandbox
        .orchestrator
        .start()
        .await
        .expect("start should succeed");
    let running = sandbox.orchestrator.status().await;

    assert_eq!(idle.state(), ServerLifecycleState::Idle);
    assert_eq!(idle.port(), None);
    assert_eq!(running.state(), ServerLifecycleState::Running);
    assert!(running.port().is_some());
    assert!(running.instance_id().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn configured_port_is_used_verbatim() {
    let port = ServerPort::new(27611).expect("valid port");
    let sandbox = sandbox_with(fast_config().with_port(port));

    let config = sandbox
        .orchestrator
        .start()
        .await
        .expect("start should succeed");

    assert_eq!(config.port(), Some(port));
    assert_eq!(sandbox.supervisor.launched_ports(), vec![port]);
}
