//! Realtime WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::realtime_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the Realtime WebSocket router
///
/// # Endpoint
///
/// `GET /realtime` - WebSocket upgrade for session control
///
/// # Example
///
/// ```json
/// // Client starts the session
/// {"type": "start"}
///
/// // Server reports progress
/// {"type": "status", "status": "connecting", "indicator": "connecting"}
/// {"type": "status", "status": "open", "indicator": "connected"}
///
/// // Tool calls answered while the user talks
/// {"type": "tool_call", "record": {"call_id": "call_1", "name": "get_emails", "success": true, "output": {}}}
/// ```
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime", get(realtime_handler))
        .layer(TraceLayer::new_for_http())
}
