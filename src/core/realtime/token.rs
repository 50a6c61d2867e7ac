//! Short-lived client secrets for negotiated peer sessions.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::base::{RealtimeConfig, RealtimeError, RealtimeResult};

/// A client secret minted by `POST /realtime/sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralToken {
    pub value: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    client_secret: EphemeralToken,
}

/// Client for the realtime sessions endpoint.
#[derive(Clone)]
pub struct EphemeralTokenClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    voice: String,
}

impl EphemeralTokenClient {
    pub fn new(http: reqwest::Client, config: &RealtimeConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            voice: config.voice.as_str().to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/realtime/sessions", self.api_base)
    }

    /// Request a session and return the status code with the raw JSON body.
    pub async fn request_session(&self) -> RealtimeResult<(u16, Value)> {
        if self.api_key.trim().is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "OPENAI_API_KEY is not configured".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "model": self.model, "voice": self.voice }))
            .send()
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let value = serde_json::from_str(&body).unwrap_or(Value::String(body));
        Ok((status, value))
    }

    /// Mint a token for immediate use.
    pub async fn fetch(&self) -> RealtimeResult<EphemeralToken> {
        let (status, body) = self.request_session().await?;

        if !(200..300).contains(&status) {
            warn!(status, "Realtime sessions endpoint rejected the request");
            let message = format!("sessions endpoint error ({status}): {body}");
            return Err(if status == 401 || status == 403 {
                RealtimeError::AuthenticationFailed(message)
            } else {
                RealtimeError::ConnectionFailed(message)
            });
        }

        let parsed: SessionsResponse = serde_json::from_value(body).map_err(|e| {
            RealtimeError::SerializationError(format!("invalid sessions response: {e}"))
        })?;
        debug!(expires_at = ?parsed.client_secret.expires_at, "Obtained ephemeral token");
        Ok(parsed.client_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: &str) -> EphemeralTokenClient {
        let config = RealtimeConfig {
            api_key: api_key.to_string(),
            api_base: format!("{}/v1/", server.uri()),
            ..Default::default()
        };
        EphemeralTokenClient::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_fetch_returns_client_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/realtime/sessions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_json(json!({"model": "gpt-4o-realtime-preview", "voice": "coral"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sess_1",
                "client_secret": {"value": "ek_abc", "expires_at": 1700000000}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server, "sk-test").fetch().await.unwrap();
        assert_eq!(token.value, "ek_abc");
        assert_eq!(token.expires_at, Some(1700000000));
    }

    #[tokio::test]
    async fn test_fetch_maps_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/realtime/sessions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad key"})))
            .mount(&server)
            .await;

        let err = client_for(&server, "sk-wrong").fetch().await.unwrap_err();
        assert!(matches!(err, RealtimeError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let server = MockServer::start().await;
        let err = client_for(&server, "").request_session().await.unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_request_session_passes_through_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let (status, body) = client_for(&server, "sk-test").request_session().await.unwrap();
        assert_eq!(status, 500);
        assert_eq!(body, Value::String("upstream down".to_string()));
    }
}
