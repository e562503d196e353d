//! Integration tests for stream recovery
//!
//! These tests verify that:
//! - Restart attempts follow the exponential backoff schedule
//! - Throttled requests do not touch the gateway
//! - A successful restart resets the backoff and updates the registry

use std::sync::Arc;
use std::time::Duration;

use feedwatch::{
    SourceStatus,
    actors::messages::{NoticeKind, ObserverMessage},
    gateway::StreamGateway,
    monitors::{BackoffPolicy, BackoffTracker, Recovery},
    registry::{MemoryRegistry, SourceRegistry},
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

struct RecoveryHarness {
    registry: Arc<MemoryRegistry>,
    gateway: Arc<FakeGateway>,
    hub: feedwatch::actors::hub::HubHandle,
    recovery: Recovery,
}

fn create_recovery(gateway: FakeGateway) -> RecoveryHarness {
    let registry = Arc::new(MemoryRegistry::with_sources(vec![create_test_source(
        "cam-1",
    )]));
    let gateway = Arc::new(gateway);
    let hub = spawn_test_hub();

    let registry_dyn: Arc<dyn SourceRegistry> = registry.clone();
    let gateway_dyn: Arc<dyn StreamGateway> = gateway.clone();
    let recovery = Recovery::new(
        registry_dyn,
        gateway_dyn,
        hub.clone(),
        Arc::new(BackoffTracker::new(BackoffPolicy::default())),
        Duration::ZERO,
        Duration::from_secs(1),
    );

    RecoveryHarness {
        registry,
        gateway,
        hub,
        recovery,
    }
}

fn retry_delays(messages: &[ObserverMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|message| match message {
            ObserverMessage::StreamNotice(notice) if notice.kind == NoticeKind::RestartFailed => {
                notice
                    .message
                    .split("Will retry in ")
                    .nth(1)
                    .map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_restart_attempts_follow_backoff_schedule() {
    let harness = create_recovery(FakeGateway::new().with_failing_adds(100));
    let mut observer = subscribe_quietly(&harness.hub).await;
    let source = create_test_source("cam-1");

    let mut admitted = vec![];
    for now in [t(0), t(0), t(1), t(2), t(3), t(7), t(8), t(15)] {
        match harness.recovery.request(source.clone(), now).await {
            Some(restart) => {
                restart.await.unwrap();
                admitted.push(true);
            }
            None => admitted.push(false),
        }
    }

    assert_eq!(
        admitted,
        vec![true, false, true, false, true, true, false, true]
    );

    let messages = drain(&harness.hub, &mut observer).await;
    assert_eq!(
        retry_delays(&messages),
        vec!["1s...", "2s...", "4s...", "8s...", "16s..."]
    );
    assert_eq!(FakeGateway::count(&harness.gateway.add_calls), 5);

    let attempt = harness.recovery.backoff().get("cam-1").await.unwrap();
    assert_eq!(attempt.attempt_count, 5);
    assert_eq!(attempt.last_attempt_at, t(15));
}

#[tokio::test]
async fn test_successful_restart_resets_backoff() {
    let harness = create_recovery(FakeGateway::new().with_failing_adds(2));
    let source = create_test_source("cam-1");

    for now in [t(0), t(1)] {
        harness
            .recovery
            .request(source.clone(), now)
            .await
            .unwrap()
            .await
            .unwrap();
    }
    assert!(harness.recovery.backoff().get("cam-1").await.is_some());

    // third attempt succeeds
    harness
        .recovery
        .request(source.clone(), t(3))
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(harness.recovery.backoff().get("cam-1").await, None);

    let stored = harness.registry.get_by_id("cam-1").await.unwrap();
    assert_eq!(stored.status, SourceStatus::Online);
    assert_eq!(stored.stream_id(), Some("cam-1-restarted"));
    assert_eq!(
        stored.snapshot_url.as_deref(),
        Some("http://gateway/stream/cam-1/jpeg")
    );

    // without the reset this would be throttled until t(7)
    let next = harness.recovery.request(source, t(4)).await;
    next.unwrap().await.unwrap();
    assert_eq!(FakeGateway::count(&harness.gateway.add_calls), 4);
}

#[tokio::test]
async fn test_source_without_stream_is_only_added() {
    let harness = create_recovery(FakeGateway::new());
    let mut source = create_test_source("cam-1");
    source.stream_id = None;

    harness
        .recovery
        .request(source, t(0))
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(FakeGateway::count(&harness.gateway.remove_calls), 0);
    assert_eq!(FakeGateway::count(&harness.gateway.add_calls), 1);
}

#[tokio::test]
async fn test_restart_of_unknown_source_still_notifies() {
    let harness = create_recovery(FakeGateway::new());
    let mut observer = subscribe_quietly(&harness.hub).await;

    // not in the registry: the re-read and the write fail, the restart does not
    harness
        .recovery
        .request(create_test_source("cam-9"), t(0))
        .await
        .unwrap()
        .await
        .unwrap();

    let messages = drain(&harness.hub, &mut observer).await;
    assert_eq!(messages.len(), 2);
    assert!(matches!(
        &messages[0],
        ObserverMessage::StreamNotice(notice) if notice.kind == NoticeKind::Restarted
    ));
    assert!(matches!(
        &messages[1],
        ObserverMessage::StatusChanged(change)
            if change.source_id == "cam-9" && change.status == SourceStatus::Online
    ));
}
