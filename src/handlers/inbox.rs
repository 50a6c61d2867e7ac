//! Inbox UI actions.
//!
//! These mutate the same inbox the tool dispatcher works on, so a reply sent
//! by voice and one sent from the UI look identical afterwards.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::core::mail::InboxAction;
use crate::state::AppState;

fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": message}))).into_response()
}

pub async fn list_inbox(State(state): State<Arc<AppState>>) -> Response {
    let inbox = state.inbox.read();
    Json(json!({
        "emails": inbox.emails(),
        "selected": inbox.selected().map(|email| email.email_id.clone()),
        "tools": state.dispatcher.registry().list_tools(),
    }))
    .into_response()
}

pub async fn select_email(
    State(state): State<Arc<AppState>>,
    Path(email_id): Path<String>,
) -> Response {
    match state.inbox.write().select(&email_id) {
        Some(email) => Json(email).into_response(),
        None => not_found(format!("Email '{email_id}' not found")),
    }
}

pub async fn mark_unread(State(state): State<Arc<AppState>>) -> Response {
    match state.inbox.write().mark_unread() {
        Some(result) => Json(result).into_response(),
        None => not_found("No email selected".to_string()),
    }
}

pub async fn skip_email(State(state): State<Arc<AppState>>) -> Response {
    match state.inbox.write().skip() {
        Some(result) => Json(result).into_response(),
        None => not_found("Inbox is empty".to_string()),
    }
}

pub async fn delete_email(
    State(state): State<Arc<AppState>>,
    Path(email_id): Path<String>,
) -> Response {
    let result = state.inbox.write().delete(&email_id);
    match result {
        Some(result) => {
            info!(email_id = %email_id, "Email deleted from UI");
            Json(result).into_response()
        }
        None => not_found(format!("Email '{email_id}' not found")),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Reply with the given text, or the suggested reply when none is sent.
pub async fn reply_email(
    State(state): State<Arc<AppState>>,
    Path(email_id): Path<String>,
    body: Option<Json<ReplyRequest>>,
) -> Response {
    let text = body.and_then(|Json(request)| request.text);
    let mut inbox = state.inbox.write();
    let text = match text.filter(|text| !text.trim().is_empty()) {
        Some(text) => text,
        None => match inbox.suggested_reply(&email_id) {
            Some(text) => text,
            None => return not_found(format!("Email '{email_id}' not found")),
        },
    };
    match inbox.reply(&email_id, &text) {
        Some(result) => Json(result).into_response(),
        None => not_found(format!("Email '{email_id}' not found")),
    }
}

/// Confirmation prompt shown before a delete or reply is carried out.
pub async fn preview_action(
    State(state): State<Arc<AppState>>,
    Path((action, email_id)): Path<(InboxAction, String)>,
) -> Response {
    if !matches!(action, InboxAction::Delete | InboxAction::Reply) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Action does not need confirmation"})),
        )
            .into_response();
    }
    match state.inbox.read().preview(&email_id, action) {
        Some(result) => Json(result).into_response(),
        None => not_found(format!("Email '{email_id}' not found")),
    }
}
