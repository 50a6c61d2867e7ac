use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{gmail, inbox, session};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/gmail", post(gmail::gmail_function))
        .route("/api/gmail/verify", get(gmail::verify_gmail_credentials))
        .route("/api/inbox", get(inbox::list_inbox))
        .route("/api/inbox/select/{email_id}", post(inbox::select_email))
        .route("/api/inbox/mark-unread", post(inbox::mark_unread))
        .route("/api/inbox/skip", post(inbox::skip_email))
        .route("/api/inbox/delete/{email_id}", post(inbox::delete_email))
        .route("/api/inbox/reply/{email_id}", post(inbox::reply_email))
        .route("/api/inbox/preview/{action}/{email_id}", get(inbox::preview_action))
        .route("/session", get(session::create_session_token))
        .layer(TraceLayer::new_for_http())
}
