//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - The health endpoint reports the observer count
//! - Source health records are exposed after a cycle
//! - WebSocket observers get the welcome, events and heartbeat answers

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use feedwatch::{
    SourceStatus,
    actors::{
        hub::HubHandle,
        messages::MonitorEvent,
        monitor::{MonitorHandle, MonitorSettings},
    },
    api::{ApiConfig, ApiState, spawn_api_server},
    registry::SourceRegistry,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::helpers::*;

async fn spawn_test_api(harness: &Harness) -> (SocketAddr, MonitorHandle) {
    let registry: Arc<dyn SourceRegistry> = harness.registry.clone();
    let monitor = MonitorHandle::spawn(
        MonitorSettings {
            interval: Duration::from_secs(3600),
            max_concurrent_checks: 3,
        },
        registry,
        harness.checker.clone(),
    );

    let state = ApiState::new(harness.hub.clone(), monitor.clone());
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    let addr = spawn_api_server(config, state).await.unwrap();
    (addr, monitor)
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for a websocket message")
            .expect("websocket closed")
            .unwrap();

        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_observers(hub: &HubHandle, expected: usize) {
    for _ in 0..50 {
        if hub.observer_count().await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {expected} observers");
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let harness = create_harness(vec![], FakeGateway::new());
    let (addr, _monitor) = spawn_test_api(&harness).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["observers"], 0);
    assert_eq!(body["monitoring"], true);
}

#[tokio::test]
async fn test_health_endpoint_unavailable_without_hub() {
    let harness = create_harness(vec![], FakeGateway::new());
    let (addr, _monitor) = spawn_test_api(&harness).await;

    harness.hub.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_source_health_after_cycle() {
    let harness = create_harness(
        vec![create_test_source("cam-2"), create_test_source("cam-1")],
        FakeGateway::new(),
    );
    let (addr, monitor) = spawn_test_api(&harness).await;

    monitor.check_now().await.unwrap();

    let body: Value = reqwest::get(format!("http://{addr}/api/v1/sources/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["count"], 2);
    assert_eq!(body["sources"][0]["source_id"], "cam-1");
    assert_eq!(body["sources"][0]["status"], "ONLINE");
    assert_eq!(body["sources"][0]["consecutive_failures"], 0);

    let single = reqwest::get(format!("http://{addr}/api/v1/sources/cam-2/health"))
        .await
        .unwrap();
    assert_eq!(single.status(), StatusCode::OK);

    let missing = reqwest::get(format!("http://{addr}/api/v1/sources/cam-9/health"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_websocket_observer_receives_events() {
    let harness = create_harness(vec![], FakeGateway::new());
    let (addr, _monitor) = spawn_test_api(&harness).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();

    let welcome = next_json(&mut socket).await;
    assert_eq!(welcome["type"], "connected");
    assert_eq!(welcome["data"]["clients"], 1);

    harness
        .hub
        .publish(MonitorEvent::status_changed(
            "cam-1",
            SourceStatus::Offline,
            Utc::now(),
        ))
        .await;

    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "status_changed");
    assert_eq!(event["data"]["source_id"], "cam-1");
    assert_eq!(event["data"]["status"], "OFFLINE");
}

#[tokio::test]
async fn test_websocket_heartbeat_is_answered() {
    let harness = create_harness(vec![], FakeGateway::new());
    let (addr, _monitor) = spawn_test_api(&harness).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();
    next_json(&mut socket).await;

    socket
        .send(Message::Text(
            json!({ "type": "ping", "data": 1700000000 }).to_string(),
        ))
        .await
        .unwrap();

    let pong = next_json(&mut socket).await;
    assert_eq!(pong, json!({ "type": "pong", "data": { "timestamp": 1700000000 } }));
}

#[tokio::test]
async fn test_websocket_disconnect_unregisters_observer() {
    let harness = create_harness(vec![], FakeGateway::new());
    let (addr, _monitor) = spawn_test_api(&harness).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();
    next_json(&mut socket).await;
    wait_for_observers(&harness.hub, 1).await;

    socket.close(None).await.unwrap();

    wait_for_observers(&harness.hub, 0).await;
}
