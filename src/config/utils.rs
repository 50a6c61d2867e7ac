use std::path::PathBuf;
use std::str::FromStr;

use super::validation::ConfigError;

/// Read a trimmed, non-empty environment variable.
pub(super) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse an optional environment variable into `T`.
pub(super) fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

/// Accepts "true"/"false", "1"/"0", "yes"/"no" and "on"/"off".
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(super) fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env_string(key) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

/// Home directory from `HOME` (or `USERPROFILE` on Windows), falling back to
/// the current directory.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_env_parse_reports_key() {
        unsafe {
            std::env::set_var("MAILVOICE_TEST_NUMBER", "not-a-number");
        }
        let err = env_parse::<u32>("MAILVOICE_TEST_NUMBER").unwrap_err();
        assert!(err.to_string().contains("MAILVOICE_TEST_NUMBER"));

        unsafe {
            std::env::set_var("MAILVOICE_TEST_NUMBER", " 42 ");
        }
        assert_eq!(env_parse::<u32>("MAILVOICE_TEST_NUMBER").unwrap(), Some(42));

        unsafe {
            std::env::remove_var("MAILVOICE_TEST_NUMBER");
        }
        assert_eq!(env_parse::<u32>("MAILVOICE_TEST_NUMBER").unwrap(), None);
    }
}
