use axum::Json;
use axum::extract::State;
use serde::Serialize;

use remedy_engine::MetricsSnapshot;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Registered cluster ids.
    pub clusters: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let clusters = state
        .engine
        .cluster_ids()
        .into_iter()
        .map(|id| id.as_str().to_owned())
        .collect();
    Json(HealthResponse {
        status: "ok",
        clusters,
    })
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.engine.metrics())
}
