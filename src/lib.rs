pub mod actors;
pub mod api;
pub mod config;
pub mod gateway;
pub mod monitors;
pub mod registry;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of a monitored source
///
/// `Ready`, `Online`, `Offline` and `Error` are reported by the gateway.
/// `Unknown` and `Frozen` are derived by the health checker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceStatus {
    #[default]
    Unknown,
    Ready,
    Online,
    Offline,
    Error,
    Frozen,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Unknown => "UNKNOWN",
            SourceStatus::Ready => "READY",
            SourceStatus::Online => "ONLINE",
            SourceStatus::Offline => "OFFLINE",
            SourceStatus::Error => "ERROR",
            SourceStatus::Frozen => "FROZEN",
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored video source as held by the source registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,

    /// Network locator of the feed (e.g. an `rtsp://` URL)
    pub locator: String,

    /// Gateway stream identifier, present once the stream was started
    #[serde(default)]
    pub stream_id: Option<String>,

    #[serde(default)]
    pub media_url: Option<String>,

    #[serde(default)]
    pub snapshot_url: Option<String>,

    #[serde(default)]
    pub status: SourceStatus,

    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Source {
    /// The gateway stream id, if the source has ever been started
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref().filter(|id| !id.is_empty())
    }
}
