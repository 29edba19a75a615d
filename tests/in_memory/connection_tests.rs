//! Connection caching and document round trips through the sandbox.

use super::helpers::{Sandbox, fast_config, sandbox, sandbox_with};
use futures::future::join_all;
use mongo_sandbox::server::{
    domain::{DEFAULT_DATABASE_NAME, SandboxDomainError},
    ports::DatabaseClientError,
    services::{ConnectionRegistryError, MockServerError},
};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;

fn sorted(mut documents: Vec<Value>) -> Vec<Value> {
    documents.sort_by_key(ToString::to_string);
    documents
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn documents_inserted_through_a_connection_can_be_read_back() {
    let sandbox = sandbox_with(fast_config().with_max_retries(5));
    sandbox
        .orchestrator
        .start()
        .await
        .expect("start should succeed");

    let orders = sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");
    let items = orders.collection("items");
    items
        .insert_many(vec![json!({"sku": "b", "qty": 2}), json!({"sku": "a", "qty": 1})])
        .expect("insert should succeed");
    let found = items.find_all().expect("find should succeed");

    assert_eq!(found.len(), 2);
    assert_eq!(
        sorted(found),
        sorted(vec![json!({"sku": "a", "qty": 1}), json!({"sku": "b", "qty": 2})])
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_requests_return_the_identical_connection(sandbox: Sandbox) {
    let first = sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");
    let second = sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should be cached");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sandbox.connector.connect_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn distinct_names_get_distinct_connections(sandbox: Sandbox) {
    let orders = sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");
    let customers = sandbox
        .orchestrator
        .get_connection("customers")
        .await
        .expect("connection should open");

    assert!(!Arc::ptr_eq(&orders, &customers));
    assert_eq!(orders.name().as_str(), "orders");
    assert_eq!(customers.name().as_str(), "customers");
    assert_eq!(sandbox.orchestrator.registry().len(), 2);
    assert_eq!(sandbox.orchestrator.registry().open_client_count(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_connection_starts_the_server(sandbox: Sandbox) {
    sandbox
        .orchestrator
        .get_connection("orders")
        .await
        .expect("connection should open");

    assert_eq!(sandbox.supervisor.launch_count(), 1);
    assert!(sandbox.orchestrator.is_running().await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn default_connection_targets_the_test_database(sandbox: Sandbox) {
    let default = sandbox
        .orchestrator
        .get_default_connection()
        .await
        .expect("connection should open");
    let named = sandbox
        .orchestrator
        .get_connection(DEFAULT_DATABASE_NAME)
        .await
        .expect("connection should be cached");

    assert_eq!(default.name().as_str(), "test");
    assert!(Arc::ptr_eq(&default, &named));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_first_requests_share_one_server_and_one_connect(sandbox: Sandbox) {
    let requests = (0..8).map(|_| sandbox.orchestrator.get_connection("orders"));

    let connections: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .expect("every request should succeed");

    let first = connections.first().expect("at least one connection");
    assert!(connections.iter().all(|other| Arc::ptr_eq(first, other)));
    assert_eq!(sandbox.supervisor.launch_count(), 1);
    assert_eq!(sandbox.connector.connect_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_connect_is_not_cached(sandbox: Sandbox) {
    sandbox.connector.fail_next_connect("handshake refused");

    let failed = sandbox.orchestrator.get_connection("orders").await;
    let retried = sandbox.orchestrator.get_connection("orders").await;

    assert!(matches!(
        failed,
        Err(MockServerError::Registry(ConnectionRegistryError::Connection(
            DatabaseClientError::Connect { .. }
        )))
    ));
    assert!(retried.is_ok());
    assert_eq!(sandbox.connector.connect_count(), 2);
}

#[rstest]
#[case("")]
#[case("bad.name")]
#[case("with space")]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_names_are_rejected_without_starting(sandbox: Sandbox, #[case] name: &str) {
    let result = sandbox.orchestrator.get_connection(name).await;

    assert!(matches!(
        result,
        Err(MockServerError::Domain(
            SandboxDomainError::EmptyDatabaseName | SandboxDomainError::InvalidDatabaseName { .. }
        ))
    ));
    assert_eq!(sandbox.supervisor.launch_count(), 0);
}
