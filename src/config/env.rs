use std::path::PathBuf;

use super::utils::{env_bool, env_parse, env_string};
use super::validation::{self, ConfigError};
use super::{ServerConfig, TlsConfig};
use crate::core::realtime::{
    DEFAULT_REALTIME_MODEL, LogOrder, OPENAI_API_BASE, OPENAI_REALTIME_URL, RealtimeVoice,
    RetryPolicy, TransportKind,
};

/// Every environment variable the loader reads.
pub(super) const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "OPENAI_API_KEY",
    "OPENAI_API_BASE",
    "REALTIME_URL",
    "REALTIME_MODEL",
    "REALTIME_VOICE",
    "REALTIME_TRANSPORT",
    "REALTIME_INSTRUCTIONS",
    "SESSION_MAX_RETRIES",
    "SESSION_RETRY_DELAY_MS",
    "SESSION_SETTLE_DELAY_MS",
    "ICE_GATHER_TIMEOUT_MS",
    "CONNECT_TIMEOUT_MS",
    "RESTART_TIMEOUT_MS",
    "LOG_ORDER",
    "CREDENTIALS_DIR",
    "MAIL_FIXTURES_PATH",
    "CORS_ALLOWED_ORIGINS",
    "RATE_LIMIT_REQUESTS_PER_SECOND",
    "RATE_LIMIT_BURST_SIZE",
    "TLS_ENABLED",
    "TLS_CERT_PATH",
    "TLS_KEY_PATH",
];

impl ServerConfig {
    /// Load configuration from environment variables only.
    ///
    /// Unset variables fall back to defaults. The result is validated the
    /// same way as [`ServerConfig::from_file`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_env()?;
        validation::validate(&config)?;
        Ok(config)
    }
}

/// Build a configuration from the environment without validating it.
pub(super) fn load_env() -> Result<ServerConfig, ConfigError> {
    let retry = RetryPolicy::default();

    let realtime_transport = match env_string("REALTIME_TRANSPORT") {
        Some(raw) => TransportKind::parse(&raw).ok_or(ConfigError::InvalidValue {
            key: "REALTIME_TRANSPORT".to_string(),
            value: raw,
        })?,
        None => TransportKind::default(),
    };

    let log_order = match env_string("LOG_ORDER") {
        Some(raw) => LogOrder::parse(&raw).ok_or(ConfigError::InvalidValue {
            key: "LOG_ORDER".to_string(),
            value: raw,
        })?,
        None => LogOrder::default(),
    };

    Ok(ServerConfig {
        host: env_string("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env_parse("PORT")?.unwrap_or(3001),
        tls: load_tls()?,
        openai_api_key: env_string("OPENAI_API_KEY"),
        openai_api_base: env_string("OPENAI_API_BASE")
            .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
        realtime_url: env_string("REALTIME_URL")
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        realtime_model: env_string("REALTIME_MODEL")
            .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        realtime_voice: env_string("REALTIME_VOICE")
            .map(|voice| RealtimeVoice::from_str_or_default(&voice))
            .unwrap_or_default(),
        realtime_transport,
        realtime_instructions: env_string("REALTIME_INSTRUCTIONS"),
        session_max_retries: env_parse("SESSION_MAX_RETRIES")?.unwrap_or(retry.max_retries),
        session_retry_delay_ms: env_parse("SESSION_RETRY_DELAY_MS")?
            .unwrap_or(retry.retry_delay_ms),
        session_settle_delay_ms: env_parse("SESSION_SETTLE_DELAY_MS")?
            .unwrap_or(retry.settle_delay_ms),
        ice_gather_timeout_ms: env_parse("ICE_GATHER_TIMEOUT_MS")?
            .unwrap_or(retry.ice_gather_timeout_ms),
        connect_timeout_ms: env_parse("CONNECT_TIMEOUT_MS")?.unwrap_or(retry.connect_timeout_ms),
        restart_timeout_ms: env_parse("RESTART_TIMEOUT_MS")?.unwrap_or(retry.restart_timeout_ms),
        log_order,
        credentials_dir: env_string("CREDENTIALS_DIR").map(PathBuf::from),
        mail_fixtures_path: env_string("MAIL_FIXTURES_PATH").map(PathBuf::from),
        cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(60),
        rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE")?.unwrap_or(10),
    })
}

fn load_tls() -> Result<Option<TlsConfig>, ConfigError> {
    if !env_bool("TLS_ENABLED")?.unwrap_or(false) {
        return Ok(None);
    }
    let cert_path = env_string("TLS_CERT_PATH").ok_or(ConfigError::MissingTlsPath("TLS_CERT_PATH"))?;
    let key_path = env_string("TLS_KEY_PATH").ok_or(ConfigError::MissingTlsPath("TLS_KEY_PATH"))?;
    Ok(Some(TlsConfig {
        cert_path: PathBuf::from(cert_path),
        key_path: PathBuf::from(key_path),
    }))
}
