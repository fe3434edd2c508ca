//! MissingProductsMonitor tests: poll cadence, failure retention, teardown.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use barinv_client::gateway::{new_token_cell, ApiGateway};
use barinv_client::missing::MissingProductsMonitor;
use support::{spawn_backend, test_config, MockState};

async fn gateway(state: &Arc<MockState>) -> Arc<ApiGateway> {
    support::init_tracing();
    let base_url = spawn_backend(state.clone()).await;
    let token = new_token_cell();
    *token.write().await = Some("tok-1".to_string());
    *state.current_token.lock().unwrap() = Some("tok-1".to_string());
    Arc::new(ApiGateway::new(&test_config(&base_url), token).unwrap())
}

#[tokio::test]
async fn publishes_count_and_list_on_each_tick() {
    let state = MockState::new();
    *state.missing_reply.lock().unwrap() = json!({
        "products": [
            { "name": "Gin", "ean": "11111111" },
            { "name": "Rum", "ean": "22222222" }
        ],
        "count": 5
    });
    let gateway = gateway(&state).await;

    let handle = MissingProductsMonitor::start(gateway, Duration::from_millis(50));
    let mut rx = handle.subscribe();
    // First tick fires immediately
    rx.changed().await.unwrap();

    let snapshot = handle.latest();
    assert_eq!(snapshot.count, 5);
    assert_eq!(snapshot.products.len(), 2);
    assert!(snapshot.updated_at.is_some());

    handle.stop();
}

#[tokio::test]
async fn failed_tick_retains_previous_snapshot() {
    let state = MockState::new();
    *state.missing_reply.lock().unwrap() =
        json!([{ "name": "Gin", "ean": "11111111" }]);
    let gateway = gateway(&state).await;

    let handle = MissingProductsMonitor::start(gateway, Duration::from_millis(50));
    let mut rx = handle.subscribe();
    rx.changed().await.unwrap();
    let first = handle.latest();
    assert_eq!(first.count, 1);

    // Backend starts failing; the badge must not blank out
    *state.fail_missing.lock().unwrap() = true;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let retained = handle.latest();
    assert_eq!(retained.count, 1);
    assert_eq!(retained.updated_at, first.updated_at);

    // Recovery publishes fresh data
    *state.fail_missing.lock().unwrap() = false;
    *state.missing_reply.lock().unwrap() = json!([
        { "name": "Gin", "ean": "11111111" },
        { "name": "Rum", "ean": "22222222" },
        { "name": "Vodka", "ean": "33333333" }
    ]);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.latest().count, 3);

    handle.stop();
}

#[tokio::test]
async fn stop_releases_the_poll_timer() {
    let state = MockState::new();
    let gateway = gateway(&state).await;

    let handle = MissingProductsMonitor::start(gateway, Duration::from_millis(50));
    let mut rx = handle.subscribe();
    rx.changed().await.unwrap();
    handle.stop();

    // With the task gone the sender is dropped; no further updates arrive
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.changed().await.is_err());
}

#[tokio::test]
async fn starts_empty_before_first_successful_poll() {
    let state = MockState::new();
    *state.fail_missing.lock().unwrap() = true;
    let gateway = gateway(&state).await;

    let handle = MissingProductsMonitor::start(gateway, Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(120)).await;

    let snapshot = handle.latest();
    assert_eq!(snapshot.count, 0);
    assert!(snapshot.products.is_empty());
    assert!(snapshot.updated_at.is_none());

    handle.stop();
}
