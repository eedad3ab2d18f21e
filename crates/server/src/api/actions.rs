use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use remedy_core::{ActionId, RemediationAction};
use remedy_store::{ActionPage, ActionQuery};

use crate::error::ServerError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub actor: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub actor: String,
    #[serde(default)]
    pub reason: String,
}

/// List actions, newest first, filtered by the query string.
pub async fn list_actions(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> Result<Json<ActionPage>, ServerError> {
    Ok(Json(state.engine.list_actions(&query).await?))
}

pub async fn get_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemediationAction>, ServerError> {
    Ok(Json(state.engine.get_action(&ActionId::new(id)).await?))
}

pub async fn approve_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<RemediationAction>, ServerError> {
    let action = state
        .engine
        .approve_action(&ActionId::new(id), &body.actor)
        .await?;
    Ok(Json(action))
}

pub async fn reject_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<RemediationAction>, ServerError> {
    let action = state
        .engine
        .reject_action(&ActionId::new(id), &body.actor, &body.reason)
        .await?;
    Ok(Json(action))
}
