//! Integration tests for the monitor loop
//!
//! These tests verify that:
//! - Only active sources are checked
//! - The number of concurrent checks stays within the configured bound
//! - Overrunning checks are not cancelled and not started twice
//! - Stopping the monitor is idempotent

use std::sync::Arc;
use std::time::Duration;

use feedwatch::{
    actors::monitor::{MonitorHandle, MonitorSettings},
    config::MonitorConfig,
    gateway::GatewayStatus,
    registry::SourceRegistry,
};

use crate::helpers::*;

fn spawn_monitor(harness: &Harness, settings: MonitorSettings) -> MonitorHandle {
    let registry: Arc<dyn SourceRegistry> = harness.registry.clone();
    MonitorHandle::spawn(settings, registry, harness.checker.clone())
}

fn hourly(max_concurrent_checks: usize) -> MonitorSettings {
    MonitorSettings {
        interval: Duration::from_secs(3600),
        max_concurrent_checks,
    }
}

#[tokio::test]
async fn test_check_now_checks_active_sources_only() {
    let mut inactive = create_test_source("cam-3");
    inactive.active = false;
    let sources = vec![
        create_test_source("cam-1"),
        create_test_source("cam-2"),
        inactive,
    ];
    let harness = create_harness(sources, FakeGateway::new());
    let monitor = spawn_monitor(&harness, hourly(5));

    let report = monitor.check_now().await.unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(report.checked, 2);
    assert_eq!(report.skipped, 0);
    assert!(!report.timed_out);

    let health = monitor.get_health_snapshot().await;
    assert_eq!(health.len(), 2);
    assert!(health.contains_key("cam-1"));
    assert!(!health.contains_key("cam-3"));

    let record = monitor.get_health("cam-1").await.unwrap();
    assert_eq!(record, health["cam-1"]);
    assert!(monitor.get_health("cam-3").await.is_none());

    monitor.stop().await;
}

#[tokio::test]
async fn test_concurrent_checks_are_bounded() {
    let sources = (0..12)
        .map(|i| create_test_source(&format!("cam-{i}")))
        .collect();
    let gateway = FakeGateway::new().with_status_delay(Duration::from_millis(100));
    let harness = create_harness(sources, gateway);
    let monitor = spawn_monitor(&harness, hourly(3));

    let report = monitor.check_now().await.unwrap();

    assert_eq!(report.checked, 12);
    let max_in_flight = FakeGateway::count(&harness.gateway.max_in_flight);
    assert!(max_in_flight <= 3, "{max_in_flight} checks ran concurrently");
    assert!(max_in_flight >= 2);

    monitor.stop().await;
}

#[tokio::test]
async fn test_overrunning_checks_continue_and_are_not_duplicated() {
    let sources = vec![create_test_source("cam-1"), create_test_source("cam-2")];
    let config = MonitorConfig {
        call_timeout: 10,
        ..create_test_monitor_config()
    };
    let gateway = FakeGateway::new().with_status_delay(Duration::from_millis(1500));
    let harness = create_harness_with(sources, gateway, &config);

    // deadline of 500ms, far below the gateway delay
    let settings = MonitorSettings {
        interval: Duration::from_millis(250),
        max_concurrent_checks: 5,
    };
    let monitor = spawn_monitor(&harness, settings);

    // the first cycle starts immediately and times out
    tokio::time::sleep(Duration::from_millis(700)).await;

    let report = monitor.check_now().await.unwrap();
    assert_eq!(report.listed, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.checked, 0);

    monitor.stop().await;

    // the detached checks still complete
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(monitor.get_health_snapshot().await.len(), 2);
    assert_eq!(FakeGateway::count(&harness.gateway.status_calls), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_reports_timeout() {
    let config = MonitorConfig {
        call_timeout: 10,
        ..create_test_monitor_config()
    };
    let gateway = FakeGateway::new().with_status_delay(Duration::from_millis(800));
    let harness = create_harness_with(vec![], gateway, &config);

    // deadline of 400ms, half the gateway delay
    let settings = MonitorSettings {
        interval: Duration::from_millis(200),
        max_concurrent_checks: 3,
    };
    let monitor = spawn_monitor(&harness, settings);

    // let the immediate first cycle pass over the empty registry
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.registry.insert(create_test_source("cam-1")).await;

    let report = monitor.check_now().await.unwrap();
    assert_eq!(report.listed, 1);
    assert_eq!(report.checked, 1);
    assert_eq!(report.skipped, 0);
    assert!(report.timed_out);

    monitor.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let harness = create_harness(vec![create_test_source("cam-1")], FakeGateway::new());
    let monitor = spawn_monitor(&harness, hourly(3));

    monitor.check_now().await.unwrap();
    monitor.stop().await;
    monitor.stop().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!monitor.is_running());
    assert!(monitor.check_now().await.is_err());
    monitor.stop().await;
}

#[tokio::test]
async fn test_failures_reach_registry_through_monitor() {
    let gateway = FakeGateway::new().with_fallback(None).with_failing_adds(10);
    let harness = create_harness(vec![create_test_source("cam-1")], gateway);
    let monitor = spawn_monitor(&harness, hourly(3));

    // first cycle runs on spawn, second on demand
    monitor.check_now().await.unwrap();
    monitor.check_now().await.unwrap();

    let source = harness.registry.get_by_id("cam-1").await.unwrap();
    assert_eq!(source.status, feedwatch::SourceStatus::Offline);

    harness.gateway.set_fallback(Some(GatewayStatus::Online));
    monitor.check_now().await.unwrap();

    let source = harness.registry.get_by_id("cam-1").await.unwrap();
    assert_eq!(source.status, feedwatch::SourceStatus::Online);

    monitor.stop().await;
}
