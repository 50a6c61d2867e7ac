//! Mail function REST endpoints.
//!
//! `POST /api/gmail` runs one tool by name outside a voice session, the same
//! way the model would. `GET /api/gmail/verify` reports on the credential
//! files without revealing their contents.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::core::mail::credentials::{CREDENTIALS_FILE, find_oauth_keys, verify_credentials};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailFunctionRequest {
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

pub async fn gmail_function(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: GmailFunctionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("Error in Gmail API route: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    let Some(function_name) = request.function_name.filter(|name| !name.trim().is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Function name is required"})),
        )
            .into_response();
    };

    let args = match request.args {
        Some(Value::Null) | None => json!({}),
        Some(args) => args,
    };

    info!(tool = %function_name, "Gmail function requested over REST");
    let result = state.dispatcher.dispatch(&function_name, args).await;
    Json(result.to_json()).into_response()
}

pub async fn verify_gmail_credentials(State(state): State<Arc<AppState>>) -> Response {
    Json(credential_report(&state.config)).into_response()
}

fn credential_report(config: &ServerConfig) -> Value {
    let home_dir = crate::config::home_dir();
    let credentials_dir = config.credentials_dir();
    let credentials_path = credentials_dir.join(CREDENTIALS_FILE);
    let verification = verify_credentials(&credentials_path);

    let cwd = std::env::current_dir().unwrap_or_else(|_| home_dir.clone());
    let oauth_keys_path = find_oauth_keys(&credentials_dir, &cwd);

    json!({
        "homeDir": home_dir.display().to_string(),
        "credentialsPath": credentials_path.display().to_string(),
        "verification": verification,
        "oauthKeysPath": oauth_keys_path.map(|path| path.display().to_string()),
        "platform": std::env::consts::OS,
        "type": std::env::consts::FAMILY,
        "userInfo": std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default(),
    })
}
