pub mod api;
pub mod realtime;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::state::AppState;

/// All gateway routes with state applied, before the outer layers.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(api::create_api_router())
        .merge(realtime::create_realtime_router())
        .with_state(state)
}
