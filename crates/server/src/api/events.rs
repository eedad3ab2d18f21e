use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use remedy_core::{ActionId, RemediationEvent};

use crate::error::ServerError;

use super::AppState;

/// Actions created for a submitted event.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitEventResponse {
    pub action_ids: Vec<ActionId>,
}

/// Feed an event into the engine, as a watcher would.
pub async fn submit_event(
    State(state): State<AppState>,
    Json(event): Json<RemediationEvent>,
) -> Result<(StatusCode, Json<SubmitEventResponse>), ServerError> {
    let action_ids = state.engine.process_event(event).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitEventResponse { action_ids })))
}
