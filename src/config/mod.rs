//! Configuration module for the mailvoice gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//! - `utils`: Parsing helpers shared by the loaders
//!
//! # Example
//! ```rust,no_run
//! use mailvoice_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::core::realtime::{
    LogOrder, RealtimeConfig, RealtimeVoice, RetryPolicy, TransportKind,
};

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub(crate) use utils::home_dir;
pub use validation::ConfigError;
pub use yaml::YamlConfig;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// TLS configuration (optional, None = HTTP only)
    pub tls: Option<TlsConfig>,

    // Realtime model configuration
    /// API key for the realtime model provider. Missing keys are reported
    /// when a session starts, not at load time.
    pub openai_api_key: Option<String>,
    /// REST base for ephemeral tokens and the SDP exchange
    pub openai_api_base: String,
    /// Websocket endpoint for socket-style sessions
    pub realtime_url: String,
    pub realtime_model: String,
    pub realtime_voice: RealtimeVoice,
    pub realtime_transport: TransportKind,
    pub realtime_instructions: Option<String>,

    // Session lifecycle
    pub session_max_retries: u32,
    pub session_retry_delay_ms: u64,
    pub session_settle_delay_ms: u64,
    pub ice_gather_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub restart_timeout_ms: u64,
    /// Display order of the conversation log
    pub log_order: LogOrder,

    // Mail configuration
    /// Directory holding the mail credential files.
    /// Default: None (use `~/.gmail-mcp`)
    pub credentials_dir: Option<PathBuf>,
    /// JSON file with inbox fixtures. Default: None (bundled demo mails)
    pub mail_fixtures_path: Option<PathBuf>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables (including values loaded from `.env` in `main`)
    /// provide the base; the YAML file overrides any value it sets. The merged
    /// configuration is validated before it is returned.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn has_api_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.session_max_retries,
            retry_delay_ms: self.session_retry_delay_ms,
            settle_delay_ms: self.session_settle_delay_ms,
            ice_gather_timeout_ms: self.ice_gather_timeout_ms,
            connect_timeout_ms: self.connect_timeout_ms,
            restart_timeout_ms: self.restart_timeout_ms,
        }
    }

    /// Build the per-session realtime configuration.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            api_base: self.openai_api_base.clone(),
            realtime_url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            voice: self.realtime_voice,
            instructions: self.realtime_instructions.clone(),
            transport: self.realtime_transport,
            retry: self.retry_policy(),
            ..Default::default()
        }
    }

    /// Directory holding `credentials.json` and the OAuth keys file.
    pub fn credentials_dir(&self) -> PathBuf {
        self.credentials_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".gmail-mcp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 3001,
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

    #[test]
    fn test_address_and_tls() {
        let mut config = test_config();
        assert_eq!(config.address(), "localhost:3001");
        assert!(!config.is_tls_enabled());

        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/tmp/cert.pem"),
            key_path: PathBuf::from("/tmp/key.pem"),
        });
        assert!(config.is_tls_enabled());
    }

    #[test]
    fn test_realtime_config_carries_session_settings() {
        let mut config = test_config();
        config.realtime_transport = TransportKind::Peer;
        config.session_max_retries = 5;
        config.connect_timeout_ms = 1234;

        let realtime = config.realtime_config();
        assert_eq!(realtime.api_key, "sk-test");
        assert_eq!(realtime.transport, TransportKind::Peer);
        assert_eq!(realtime.retry.max_retries, 5);
        assert_eq!(realtime.retry.connect_timeout_ms, 1234);
        assert_eq!(realtime.tool_choice.as_deref(), Some("auto"));
    }

    #[test]
    fn test_has_api_key() {
        let mut config = test_config();
        assert!(config.has_api_key());
        config.openai_api_key = Some("  ".to_string());
        assert!(!config.has_api_key());
        config.openai_api_key = None;
        assert!(!config.has_api_key());
        assert_eq!(config.realtime_config().api_key, "");
    }

    #[test]
    fn test_credentials_dir_override() {
        let mut config = test_config();
        assert!(config.credentials_dir().ends_with(".gmail-mcp"));
        config.credentials_dir = Some(PathBuf::from("/srv/creds"));
        assert_eq!(config.credentials_dir(), PathBuf::from("/srv/creds"));
    }

    // Helper to clean up environment variables
    pub(super) fn cleanup_env_vars() {
        unsafe {
            for key in super::env::ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

realtime:
  api_key: "yaml-key"
  model: "gpt-4o-mini-realtime-preview"
  voice: "sage"
  transport: "peer"

session:
  max_retries: 1
  log_order: "oldest_first"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.openai_api_key, Some("yaml-key".to_string()));
        assert_eq!(config.realtime_model, "gpt-4o-mini-realtime-preview");
        assert_eq!(config.realtime_voice, RealtimeVoice::Sage);
        assert_eq!(config.realtime_transport, TransportKind::Peer);
        assert_eq!(config.session_max_retries, 1);
        assert_eq!(config.log_order, LogOrder::OldestFirst);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

realtime:
  api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "env-key");
            env::set_var("REALTIME_MODEL", "env-model");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key, Some("yaml-key".to_string()));
        // ENV fills what YAML leaves out
        assert_eq!(config.realtime_model, "env-model");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_zero_rate_limit() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            "security:\n  rate_limit_requests_per_second: 0\n",
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("rate_limit_requests_per_second"));
    }

    #[test]
    #[serial]
    fn test_from_file_partial_config() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(&config_path, "server:\n  port: 9000\n").unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.realtime_transport, TransportKind::WebSocket);
        assert_eq!(config.session_max_retries, 3);
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.openai_api_key, None);
    }
}
