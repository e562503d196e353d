//! Message types for actor communication
//!
//! This module defines all message types used for communication between actors.
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Events**: Notifications published to the hub and fanned out to observers
//! 3. **Immutability**: Events are cloned per observer, never mutated after construction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::SourceStatus;

/// State change published by the health monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// The recorded status of a source changed
    StatusChanged(StatusChange),

    /// Human-readable notice about a stream (offline, frozen, restarted, ...)
    StreamNotice(StreamNotice),
}

impl MonitorEvent {
    pub fn source_id(&self) -> &str {
        match self {
            MonitorEvent::StatusChanged(change) => &change.source_id,
            MonitorEvent::StreamNotice(notice) => &notice.source_id,
        }
    }

    pub fn status_changed(
        source_id: impl Into<String>,
        status: SourceStatus,
        last_seen: DateTime<Utc>,
    ) -> Self {
        MonitorEvent::StatusChanged(StatusChange {
            source_id: source_id.into(),
            status,
            last_seen: Some(last_seen),
        })
    }

    pub fn notice(
        source_id: impl Into<String>,
        name: impl Into<String>,
        kind: NoticeKind,
        message: impl Into<String>,
    ) -> Self {
        MonitorEvent::StreamNotice(StreamNotice {
            source_id: source_id.into(),
            name: name.into(),
            kind,
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub source_id: String,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamNotice {
    pub source_id: String,
    pub name: String,
    pub kind: NoticeKind,
    pub message: String,
}

/// What a stream notice is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Offline,
    Online,
    Frozen,
    RestartFailed,
    Restarted,
}

/// Message delivered to an observer connection
///
/// Serialized as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// Welcome message, first item of every subscription
    Connected { message: String, clients: usize },

    StatusChanged(StatusChange),

    StreamNotice(StreamNotice),

    /// Answer to an inbound heartbeat, echoing its payload
    Pong { timestamp: serde_json::Value },
}

impl From<MonitorEvent> for ObserverMessage {
    fn from(event: MonitorEvent) -> Self {
        match event {
            MonitorEvent::StatusChanged(change) => ObserverMessage::StatusChanged(change),
            MonitorEvent::StreamNotice(notice) => ObserverMessage::StreamNotice(notice),
        }
    }
}

/// Message received from an observer connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl InboundMessage {
    pub fn is_heartbeat(&self) -> bool {
        self.kind == "ping"
    }
}

/// Commands for the hub's control queue
#[derive(Debug)]
pub enum HubCommand {
    /// Get the number of connected observers
    ObserverCount { respond_to: oneshot::Sender<usize> },

    /// Close all observer connections and stop the hub
    Shutdown,
}

/// Summary of one monitor cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Active sources returned by the registry
    pub listed: usize,

    /// Checks launched in this cycle
    pub checked: usize,

    /// Sources skipped because their previous check was still running
    pub skipped: usize,

    /// Whether the cycle deadline elapsed before all checks finished
    pub timed_out: bool,
}

/// Commands that can be sent to the MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run a check cycle immediately (bypassing the interval timer)
    CheckNow {
        respond_to: oneshot::Sender<anyhow::Result<CycleReport>>,
    },

    /// Stop the monitor loop
    ///
    /// Checks that are still in flight finish on their own.
    Shutdown,
}
