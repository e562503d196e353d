//! Streaming gateway abstraction
//!
//! The gateway proxies the actual media. The monitor only talks to its
//! control plane: start a stream, stop it, ask for its status and take a
//! content fingerprint of the current frame.
//!
//! ## Implementations
//!
//! - **HttpGateway**: RTSPtoWeb-style HTTP control plane (see [`http`])

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::SourceStatus;

pub use http::HttpGateway;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors returned by gateway calls
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network or protocol failure talking to the gateway
    #[error("gateway request failed: {0}")]
    Transport(String),

    /// The call did not complete within the per-call timeout
    #[error("gateway call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The gateway answered with an unexpected HTTP status
    #[error("gateway returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The gateway response could not be interpreted
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// The gateway does not offer this capability
    #[error("operation not supported by this gateway")]
    Unsupported,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// Stream state as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayStatus {
    Ready,
    Online,
    Offline,
    Error,
}

impl GatewayStatus {
    /// Parse a gateway status string (case-insensitive)
    pub fn parse(status: &str) -> Option<GatewayStatus> {
        match status.to_ascii_uppercase().as_str() {
            "READY" => Some(GatewayStatus::Ready),
            "ONLINE" => Some(GatewayStatus::Online),
            "OFFLINE" => Some(GatewayStatus::Offline),
            "ERROR" => Some(GatewayStatus::Error),
            _ => None,
        }
    }

    /// `Ready` and `Online` count as a successful check
    pub fn is_success(&self) -> bool {
        matches!(self, GatewayStatus::Ready | GatewayStatus::Online)
    }
}

impl From<GatewayStatus> for SourceStatus {
    fn from(status: GatewayStatus) -> Self {
        match status {
            GatewayStatus::Ready => SourceStatus::Ready,
            GatewayStatus::Online => SourceStatus::Online,
            GatewayStatus::Offline => SourceStatus::Offline,
            GatewayStatus::Error => SourceStatus::Error,
        }
    }
}

/// Opaque content hash of a captured frame
///
/// Two equal fingerprints mean the gateway served the same image twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash raw snapshot bytes (hex-encoded SHA-256)
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of registering a stream with the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRegistration {
    pub stream_id: String,
    pub media_url: String,
    pub snapshot_url: String,
}

/// Control-plane operations of the streaming gateway
#[async_trait]
pub trait StreamGateway: Send + Sync {
    /// Register (start) a stream for a source
    async fn add_stream(
        &self,
        source_id: &str,
        name: &str,
        locator: &str,
    ) -> GatewayResult<StreamRegistration>;

    /// Remove (stop) a stream
    async fn remove_stream(&self, stream_id: &str) -> GatewayResult<()>;

    /// Query the current state of a stream
    async fn stream_status(&self, stream_id: &str) -> GatewayResult<GatewayStatus>;

    /// Fingerprint the stream's current frame
    ///
    /// Optional capability. Gateways without it keep this default, which
    /// degrades frozen detection to the time-only fallback.
    async fn content_fingerprint(&self, _stream_id: &str) -> GatewayResult<Fingerprint> {
        Err(GatewayError::Unsupported)
    }
}
