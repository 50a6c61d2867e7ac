use super::env::load_env;
use super::validation::ConfigError;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};
use crate::core::realtime::{LogOrder, RealtimeVoice, TransportKind};

/// Load the environment and apply YAML overrides on top of it.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = load_env()?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), ConfigError> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    let cert_path = tls
                        .cert_path
                        .or_else(|| config.tls.as_ref().map(|t| t.cert_path.clone()))
                        .ok_or(ConfigError::MissingTlsPath("server.tls.cert_path"))?;
                    let key_path = tls
                        .key_path
                        .or_else(|| config.tls.as_ref().map(|t| t.key_path.clone()))
                        .ok_or(ConfigError::MissingTlsPath("server.tls.key_path"))?;
                    config.tls = Some(TlsConfig {
                        cert_path,
                        key_path,
                    });
                }
                None => {
                    if let Some(existing) = config.tls.as_mut() {
                        if let Some(cert_path) = tls.cert_path {
                            existing.cert_path = cert_path;
                        }
                        if let Some(key_path) = tls.key_path {
                            existing.key_path = key_path;
                        }
                    }
                }
            }
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(api_key) = realtime.api_key {
            config.openai_api_key = Some(api_key);
        }
        if let Some(api_base) = realtime.api_base {
            config.openai_api_base = api_base;
        }
        if let Some(url) = realtime.url {
            config.realtime_url = url;
        }
        if let Some(model) = realtime.model {
            config.realtime_model = model;
        }
        if let Some(voice) = realtime.voice {
            config.realtime_voice = RealtimeVoice::from_str_or_default(&voice);
        }
        if let Some(transport) = realtime.transport {
            config.realtime_transport =
                TransportKind::parse(&transport).ok_or(ConfigError::InvalidValue {
                    key: "realtime.transport".to_string(),
                    value: transport,
                })?;
        }
        if let Some(instructions) = realtime.instructions {
            config.realtime_instructions = Some(instructions);
        }
    }

    if let Some(session) = yaml.session {
        if let Some(max_retries) = session.max_retries {
            config.session_max_retries = max_retries;
        }
        if let Some(delay) = session.retry_delay_ms {
            config.session_retry_delay_ms = delay;
        }
        if let Some(delay) = session.settle_delay_ms {
            config.session_settle_delay_ms = delay;
        }
        if let Some(timeout) = session.ice_gather_timeout_ms {
            config.ice_gather_timeout_ms = timeout;
        }
        if let Some(timeout) = session.connect_timeout_ms {
            config.connect_timeout_ms = timeout;
        }
        if let Some(timeout) = session.restart_timeout_ms {
            config.restart_timeout_ms = timeout;
        }
        if let Some(order) = session.log_order {
            config.log_order = LogOrder::parse(&order).ok_or(ConfigError::InvalidValue {
                key: "session.log_order".to_string(),
                value: order,
            })?;
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    if let Some(mail) = yaml.mail {
        if let Some(dir) = mail.credentials_dir {
            config.credentials_dir = Some(dir);
        }
        if let Some(path) = mail.fixtures_path {
            config.mail_fixtures_path = Some(path);
        }
    }

    Ok(())
}
