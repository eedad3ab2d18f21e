use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use remedy_engine::EngineError;

/// Errors that can occur when running the Remedy server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A backend (store, cluster, notifier) could not be initialised.
    #[error("startup error: {0}")]
    Startup(String),

    /// An engine-level error surfaced through the API.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Engine(e) => engine_status(e),
            Self::Config(_) | Self::Io(_) | Self::Startup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::RuleNotFound(_) | EngineError::ActionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidState { .. }
        | EngineError::DuplicateRuleName(_)
        | EngineError::RuleExists(_) => StatusCode::CONFLICT,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::QueueFull | EngineError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Store(_)
        | EngineError::Core(_)
        | EngineError::Configuration(_)
        | EngineError::RuleFile(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
