use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::core::realtime::RealtimeError;
use crate::state::AppState;

/// Ephemeral session token for browser clients.
///
/// Proxies the realtime sessions endpoint so the API key never leaves the
/// server. The upstream body and status are passed through unchanged.
pub async fn create_session_token(State(state): State<Arc<AppState>>) -> Response {
    if !state.config.has_api_key() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "OPENAI_API_KEY not set"})),
        )
            .into_response();
    }

    match state.tokens.request_session().await {
        Ok((status, body)) => {
            info!(status, "Ephemeral session requested");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(body)).into_response()
        }
        Err(RealtimeError::InvalidConfiguration(message)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": message})),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to request ephemeral session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
