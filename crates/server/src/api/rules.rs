use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use remedy_core::{RemediationRule, RuleId};

use crate::error::ServerError;

use super::AppState;

pub async fn list_rules(
    State(state): State<AppState>,
) -> Result<Json<Vec<RemediationRule>>, ServerError> {
    Ok(Json(state.engine.list_rules().await?))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(rule): Json<RemediationRule>,
) -> Result<(StatusCode, Json<RemediationRule>), ServerError> {
    let rule = state.engine.create_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemediationRule>, ServerError> {
    Ok(Json(state.engine.get_rule(&RuleId::new(id)).await?))
}

/// Replace a rule. The path id wins over any id in the body.
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(rule): Json<RemediationRule>,
) -> Result<Json<RemediationRule>, ServerError> {
    let rule = state.engine.update_rule(&RuleId::new(id), rule).await?;
    Ok(Json(rule))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_rule(&RuleId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
