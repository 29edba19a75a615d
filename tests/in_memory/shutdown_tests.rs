//! Ordered teardown of the server and its connections.

use super::helpers::{Sandbox, fast_config, sandbox, sandbox_with};
use mongo_sandbox::server::{
    domain::ServerLifecycleState, ports::DatabaseClientError, services::MockServerError,
};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_the_server_and_closes_every_client(sandbox: Sandbox) {
    for name in ["orders", "customers"] {
        sandbox
            .orchestrator
            .get_connection(name)
            .await
            .expect("connection should open");
    }
    let port = sandbox
        .orchestrator
        .status()
        .await
        .port()
        .expect("port should be assigned");

    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("shutdown should succeed");

    let status = sandbox.orchestrator.status().await;
    assert_eq!(sandbox.supervisor.shutdown_signal_count(), 1);
    assert!(!sandbox.deployment.is_bound(port));
    assert_eq!(sandbox.connector.close_count(), 2);
    assert!(sandbox.orchestrator.registry().is_empty());
    assert_eq!(sandbox.orchestrator.registry().open_client_count(), 0);
    assert_eq!(status.state(), ServerLifecycleState::Idle);
    assert_eq!(status.port(), Some(port));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_before_start_completes_quietly(sandbox: Sandbox) {
    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("shutdown should succeed");

    assert_eq!(sandbox.supervisor.shutdown_signal_count(), 0);
    assert_eq!(sandbox.connector.close_count(), 0);
    assert!(!sandbox.orchestrator.is_running().await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_shutdown_has_nothing_left_to_do(sandbox: Sandbox) {
    sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");
    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("first shutdown should succeed");

    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("second shutdown should succeed");

    assert_eq!(sandbox.supervisor.shutdown_signal_count(), 1);
    assert_eq!(sandbox.connector.close_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connections_after_shutdown_belong_to_a_fresh_server(sandbox: Sandbox) {
    let before = sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");
    before
        .collection("items")
        .insert_many(vec![json!({"sku": "a"})])
        .expect("insert should succeed");
    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("shutdown should succeed");

    let after = sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should reopen");

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(sandbox.connector.connect_count(), 2);
    assert!(matches!(
        before.collection("items").find_all(),
        Err(DatabaseClientError::Operation(_))
    ));
    assert_eq!(
        after
            .collection("items")
            .find_all()
            .expect("find should succeed"),
        Vec::<serde_json::Value>::new()
    );
    assert_eq!(sandbox.supervisor.launch_count(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn close_failures_are_reported_after_teardown_completes(sandbox: Sandbox) {
    sandbox.connector.fail_next_close("socket stuck");
    for name in ["orders", "customers", "invoices"] {
        sandbox
            .orchestrator
            .get_connection(name)
            .await
            .expect("connection should open");
    }

    let result = sandbox.orchestrator.shut_down().await;

    let error = match result {
        Err(MockServerError::Shutdown(error)) => error,
        other => panic!("expected an aggregated shutdown error, got {other:?}"),
    };
    assert_eq!(error.failures().len(), 1);
    assert_eq!(sandbox.connector.close_count(), 3);
    assert!(sandbox.orchestrator.registry().is_empty());
    assert_eq!(
        sandbox.orchestrator.status().await.state(),
        ServerLifecycleState::Idle
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn clients_with_nothing_to_close_are_skipped(sandbox: Sandbox) {
    sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");
    sandbox.connector.next_client_without_close();
    sandbox
        .orchestrator
        .get_connection("customers")
        .await
        .expect("connection should open");

    sandbox
        .orchestrator
        .shut_down()
        .await
        .expect("shutdown should succeed");

    assert_eq!(sandbox.connector.close_count(), 1);
    assert!(sandbox.orchestrator.registry().is_empty());
}

#[rstest]
#[case(true, 0)]
#[case(false, 1)]
#[tokio::test(flavor = "multi_thread")]
async fn dropping_the_orchestrator_honours_auto_shutdown(
    #[case] auto_shutdown: bool,
    #[case] still_bound: usize,
) {
    let Sandbox {
        deployment,
        orchestrator,
        ..
    } = sandbox_with(fast_config().with_auto_shutdown(auto_shutdown));
    orchestrator.start().await.expect("start should succeed");

    drop(orchestrator);

    assert_eq!(deployment.bound_count(), still_bound);
}
