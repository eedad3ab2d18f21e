pub mod actions;
pub mod events;
pub mod health;
pub mod rules;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use remedy_engine::RemediationEngine;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: RemediationEngine,
}

impl AppState {
    pub fn new(engine: RemediationEngine) -> Self {
        Self { engine }
    }
}

/// Build the Axum router with every API route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/v1/events", post(events::submit_event))
        .route("/v1/rules", get(rules::list_rules).post(rules::create_rule))
        .route(
            "/v1/rules/{id}",
            get(rules::get_rule)
                .put(rules::update_rule)
                .delete(rules::delete_rule),
        )
        .route("/v1/actions", get(actions::list_actions))
        .route("/v1/actions/{id}", get(actions::get_action))
        .route("/v1/actions/{id}/approve", post(actions::approve_action))
        .route("/v1/actions/{id}/reject", post(actions::reject_action))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
