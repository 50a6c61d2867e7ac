use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values set here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/mailvoice/cert.pem"
///     key_path: "/etc/mailvoice/key.pem"
///
/// realtime:
///   api_key: "sk-..."
///   api_base: "https://api.openai.com/v1"
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview"
///   voice: "coral"
///   transport: "websocket"
///   instructions: "You are a helpful assistant that interacts with Gmail."
///
/// session:
///   max_retries: 3
///   retry_delay_ms: 2000
///   settle_delay_ms: 500
///   ice_gather_timeout_ms: 5000
///   connect_timeout_ms: 10000
///   restart_timeout_ms: 5000
///   log_order: "newest_first"
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///
/// mail:
///   credentials_dir: "/home/me/.gmail-mcp"
///   fixtures_path: "/srv/mailvoice/emails.json"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub session: Option<SessionYaml>,
    pub security: Option<SecurityYaml>,
    pub mail: Option<MailYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

/// Realtime model configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub transport: Option<String>,
    pub instructions: Option<String>,
}

/// Session lifecycle configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub ice_gather_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub restart_timeout_ms: Option<u64>,
    pub log_order: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

/// Mail configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MailYaml {
    pub credentials_dir: Option<PathBuf>,
    pub fixtures_path: Option<PathBuf>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  tls:
    enabled: true
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"

realtime:
  api_key: "sk-yaml"
  model: "gpt-4o-realtime-preview"
  voice: "verse"
  transport: "peer"

session:
  max_retries: 5
  connect_timeout_ms: 8000
  log_order: "oldest_first"

security:
  cors_allowed_origins: "*"
  rate_limit_burst_size: 20

mail:
  credentials_dir: "/srv/creds"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(8080));
        let tls = server.tls.unwrap();
        assert_eq!(tls.enabled, Some(true));
        assert_eq!(tls.key_path, Some(PathBuf::from("/tmp/key.pem")));

        let realtime = config.realtime.unwrap();
        assert_eq!(realtime.api_key, Some("sk-yaml".to_string()));
        assert_eq!(realtime.voice, Some("verse".to_string()));
        assert_eq!(realtime.transport, Some("peer".to_string()));
        assert_eq!(realtime.url, None);

        let session = config.session.unwrap();
        assert_eq!(session.max_retries, Some(5));
        assert_eq!(session.connect_timeout_ms, Some(8000));
        assert_eq!(session.retry_delay_ms, None);

        let security = config.security.unwrap();
        assert_eq!(security.cors_allowed_origins, Some("*".to_string()));
        assert_eq!(security.rate_limit_burst_size, Some(20));

        let mail = config.mail.unwrap();
        assert_eq!(mail.credentials_dir, Some(PathBuf::from("/srv/creds")));
        assert_eq!(mail.fixtures_path, None);
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.realtime.is_none());
        assert!(config.session.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "session:\n  max_retries: 2\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.session.unwrap().max_retries, Some(2));
    }

    #[test]
    fn test_from_file_invalid_type() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  port: \"not-a-port\"\n").unwrap();

        let err = YamlConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML"));
    }
}
