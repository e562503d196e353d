//! API response types

use serde::{Deserialize, Serialize};

use crate::monitors::health::HealthSnapshot;

/// Health check response
///
/// Returned by GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    /// RFC 3339 timestamp
    pub timestamp: String,

    /// Connected websocket observers
    pub observers: usize,

    /// Whether the monitor loop is still running
    pub monitoring: bool,
}

/// Health record of one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source_id: String,

    #[serde(flatten)]
    pub health: HealthSnapshot,
}

/// Returned by GET /api/v1/sources/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesHealthResponse {
    pub sources: Vec<SourceHealth>,
    pub count: usize,
}
