//! Integration tests for the broadcast hub
//!
//! These tests verify that:
//! - Concurrent producers never make observers disagree on event order
//! - Observers joining and leaving do not disturb the others

use chrono::Utc;
use feedwatch::{
    SourceStatus,
    actors::messages::{MonitorEvent, ObserverMessage},
};

use crate::helpers::*;

#[tokio::test]
async fn test_observers_agree_on_order_with_concurrent_producers() {
    let hub = spawn_test_hub();

    let mut observers = vec![];
    for _ in 0..4 {
        observers.push(subscribe_quietly(&hub).await);
    }

    let producers = (0..4)
        .map(|producer| {
            let hub = hub.clone();
            tokio::spawn(async move {
                for i in 0..10 {
                    let event = MonitorEvent::status_changed(
                        format!("cam-{producer}-{i}"),
                        SourceStatus::Online,
                        Utc::now(),
                    );
                    hub.publish(event).await;
                }
            })
        })
        .collect::<Vec<_>>();

    for producer in producers {
        producer.await.unwrap();
    }

    let mut sequences = vec![];
    for observer in &mut observers {
        let messages = drain(&hub, observer).await;
        assert_eq!(messages.len(), 40);
        sequences.push(messages);
    }

    for sequence in &sequences[1..] {
        assert_eq!(sequence, &sequences[0]);
    }

    // each producer's own events keep their relative order
    let from_first = sequences[0]
        .iter()
        .filter_map(|message| match message {
            ObserverMessage::StatusChanged(change) if change.source_id.starts_with("cam-0-") => {
                Some(change.source_id.clone())
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    let expected = (0..10).map(|i| format!("cam-0-{i}")).collect::<Vec<_>>();
    assert_eq!(from_first, expected);

    hub.shutdown().await;
}

#[tokio::test]
async fn test_churn_does_not_affect_remaining_observers() {
    let hub = spawn_test_hub();
    let mut stable = subscribe_quietly(&hub).await;

    for round in 0..5 {
        let leaving = hub.subscribe().await.unwrap();
        hub.publish(MonitorEvent::status_changed(
            format!("cam-{round}"),
            SourceStatus::Offline,
            Utc::now(),
        ))
        .await;
        hub.unsubscribe(leaving.id());
        drop(leaving);
    }

    let messages = drain(&hub, &mut stable).await;
    assert_eq!(messages.len(), 5);
    assert_eq!(hub.observer_count().await.unwrap(), 1);

    hub.shutdown().await;
    assert_eq!(stable.recv().await, None);
}
