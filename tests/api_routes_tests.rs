//! REST route tests
//!
//! Drives the assembled router with `oneshot` requests; the ephemeral token
//! proxy is pointed at a wiremock server.

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailvoice_gateway::core::realtime::{LogOrder, RealtimeVoice, TransportKind};
use mailvoice_gateway::{AppState, ServerConfig, routes};

fn create_test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        openai_api_key: Some("sk-test".to_string()),
        openai_api_base: "https://api.openai.com/v1".to_string(),
        realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
        realtime_model: "gpt-4o-realtime-preview".to_string(),
        realtime_voice: RealtimeVoice::Coral,
        realtime_transport: TransportKind::WebSocket,
        realtime_instructions: None,
        session_max_retries: 3,
        session_retry_delay_ms: 2000,
        session_settle_delay_ms: 500,
        ice_gather_timeout_ms: 5000,
        connect_timeout_ms: 10000,
        restart_timeout_ms: 5000,
        log_order: LogOrder::NewestFirst,
        credentials_dir: None,
        mail_fixtures_path: None,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
    }
}

async fn app_with(config: ServerConfig) -> (Router, Arc<AppState>) {
    let state = AppState::new(config).await;
    (routes::create_app_router(state.clone()), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app_with(create_test_config()).await;
    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));
}

#[tokio::test]
async fn test_gmail_function_requires_name() {
    let (app, _) = app_with(create_test_config()).await;

    let (status, body) = send(&app, post_json("/api/gmail", json!({"args": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Function name is required");

    let (status, _) = send(&app, post_json("/api/gmail", json!({"functionName": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gmail_function_malformed_body_is_500() {
    let (app, _) = app_with(create_test_config()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/gmail")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_gmail_function_dispatches_tool() {
    let (app, state) = app_with(create_test_config()).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/gmail",
            json!({"functionName": "send_reply", "args": {"email_id": "3", "message": "On it."}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert_eq!(
        state.inbox.read().get("3").unwrap().last_reply.as_deref(),
        Some("On it.")
    );

    // Tool-level failures are still 200 with an error payload
    let (status, body) = send(
        &app,
        post_json("/api/gmail", json!({"functionName": "read_email", "args": {"email_id": "99"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_gmail_verify_reports_credentials() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("credentials.json"),
        r#"{"access_token":"a","refresh_token":"b"}"#,
    )
    .unwrap();

    let mut config = create_test_config();
    config.credentials_dir = Some(temp_dir.path().to_path_buf());
    let (app, _) = app_with(config).await;

    let (status, body) = send(&app, get("/api/gmail/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verification"]["exists"], true);
    assert_eq!(body["verification"]["valid"], true);
    assert_eq!(body["verification"]["keys"], json!(["access_token", "refresh_token"]));
    assert!(
        body["credentialsPath"]
            .as_str()
            .unwrap()
            .ends_with("credentials.json")
    );
    assert!(body["platform"].is_string());
}

#[tokio::test]
async fn test_inbox_actions() {
    let (app, _) = app_with(create_test_config()).await;

    let (status, body) = send(&app, get("/api/inbox")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emails"].as_array().unwrap().len(), 5);
    assert_eq!(body["tools"].as_array().unwrap().len(), 6);

    let (status, body) = send(&app, post_json("/api/inbox/select/2", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_id"], "2");

    let (status, body) = send(&app, post_json("/api/inbox/mark-unread", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "markUnread");

    let (status, body) = send(&app, post_json("/api/inbox/reply/2", json!({"text": "Thanks!"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replyText"], "Thanks!");

    let (status, _) = send(&app, post_json("/api/inbox/delete/2", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/api/inbox")).await;
    assert_eq!(body["emails"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_inbox_unknown_id_is_404() {
    let (app, _) = app_with(create_test_config()).await;

    for uri in ["/api/inbox/select/42", "/api/inbox/delete/42", "/api/inbox/reply/42"] {
        let (status, body) = send(&app, post_json(uri, json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].as_str().unwrap().contains("42"));
    }
}

#[tokio::test]
async fn test_session_token_requires_api_key() {
    let mut config = create_test_config();
    config.openai_api_key = None;
    let (app, _) = app_with(config).await;

    let (status, body) = send(&app, get("/session")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "OPENAI_API_KEY not set");
}

#[tokio::test]
async fn test_session_token_proxies_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess_1",
            "client_secret": {"value": "ek_123", "expires_at": 1_700_000_000}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.openai_api_base = format!("{}/v1", server.uri());
    let (app, _) = app_with(config).await;

    let (status, body) = send(&app, get("/session")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_secret"]["value"], "ek_123");
}

#[tokio::test]
async fn test_inbox_preview_requires_confirmable_action() {
    let (app, state) = app_with(create_test_config()).await;

    let (status, body) = send(&app, get("/api/inbox/preview/delete/4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], true);
    assert_eq!(body["action"], "delete");
    // Previewing never mutates the inbox
    assert_eq!(state.inbox.read().len(), 5);

    let (status, body) = send(&app, get("/api/inbox/preview/reply/4")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["replyText"].is_string());

    let (status, _) = send(&app, get("/api/inbox/preview/skip/4")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/api/inbox/preview/delete/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
