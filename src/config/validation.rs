use thiserror::Error;
use url::Url;

use super::{ServerConfig, TlsConfig};

/// Configuration loading and validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Invalid URL for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },

    #[error("TLS is enabled but {0} is not set")]
    MissingTlsPath(&'static str),

    #[error("TLS {kind} file not found: {path}")]
    TlsFileNotFound { kind: &'static str, path: String },
}

/// Validate a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_rate_limit(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    validate_session_timing(config)?;
    validate_url(
        "realtime_url",
        &config.realtime_url,
        &["ws", "wss"],
    )?;
    validate_url(
        "openai_api_base",
        &config.openai_api_base,
        &["http", "https"],
    )?;
    if let Some(tls) = &config.tls {
        validate_tls(tls)?;
    }
    Ok(())
}

pub(super) fn validate_rate_limit(rps: u32, burst: u32) -> Result<(), ConfigError> {
    if rps == 0 {
        return Err(ConfigError::MustBePositive("rate_limit_requests_per_second"));
    }
    if burst == 0 {
        return Err(ConfigError::MustBePositive("rate_limit_burst_size"));
    }
    Ok(())
}

fn validate_session_timing(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::MustBePositive("connect_timeout_ms"));
    }
    if config.ice_gather_timeout_ms == 0 {
        return Err(ConfigError::MustBePositive("ice_gather_timeout_ms"));
    }
    if config.restart_timeout_ms == 0 {
        return Err(ConfigError::MustBePositive("restart_timeout_ms"));
    }
    Ok(())
}

fn validate_url(key: &'static str, raw: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        key,
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl {
            key,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

pub(super) fn validate_tls(tls: &TlsConfig) -> Result<(), ConfigError> {
    if !tls.cert_path.exists() {
        return Err(ConfigError::TlsFileNotFound {
            kind: "certificate",
            path: tls.cert_path.display().to_string(),
        });
    }
    if !tls.key_path.exists() {
        return Err(ConfigError::TlsFileNotFound {
            kind: "key",
            path: tls.key_path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_rate_limit_must_be_positive() {
        assert!(validate_rate_limit(60, 10).is_ok());
        assert_eq!(
            validate_rate_limit(60, 0),
            Err(ConfigError::MustBePositive("rate_limit_burst_size"))
        );
    }

    #[test]
    fn test_url_scheme_checked() {
        assert!(validate_url("realtime_url", "wss://api.openai.com/v1/realtime", &["ws", "wss"]).is_ok());
        let err = validate_url("realtime_url", "https://api.openai.com", &["ws", "wss"]).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'https'"));
        assert!(validate_url("realtime_url", "not a url", &["ws"]).is_err());
    }

    #[test]
    fn test_tls_files_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let cert = temp_dir.path().join("cert.pem");
        std::fs::write(&cert, "cert").unwrap();

        let tls = TlsConfig {
            cert_path: cert.clone(),
            key_path: PathBuf::from("/nonexistent/key.pem"),
        };
        let err = validate_tls(&tls).unwrap_err();
        assert!(matches!(err, ConfigError::TlsFileNotFound { kind: "key", .. }));

        let key = temp_dir.path().join("key.pem");
        std::fs::write(&key, "key").unwrap();
        assert!(validate_tls(&TlsConfig { cert_path: cert, key_path: key }).is_ok());
    }
}
