//! Source health endpoints

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{SourceHealth, SourcesHealthResponse},
};

/// GET /api/v1/sources/health
///
/// Current health record of every checked source, ordered by id
pub async fn list_source_health(State(state): State<ApiState>) -> Json<SourcesHealthResponse> {
    let snapshot = state.monitor.get_health_snapshot().await;

    let mut sources = snapshot
        .into_iter()
        .map(|(source_id, health)| SourceHealth { source_id, health })
        .collect::<Vec<_>>();
    sources.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    Json(SourcesHealthResponse {
        count: sources.len(),
        sources,
    })
}

/// GET /api/v1/sources/:id/health
pub async fn get_source_health(
    Path(source_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<SourceHealth>> {
    let health = state
        .monitor
        .get_health(&source_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no health record for {source_id}")))?;

    Ok(Json(SourceHealth { source_id, health }))
}
