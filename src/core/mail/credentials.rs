//! Mail credential file checks.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Stored OAuth token file inside the credentials directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// OAuth client keys file, looked up in the credentials directory and the CWD
pub const OAUTH_KEYS_FILE: &str = "gcp-oauth.keys.json";

/// Result of inspecting a credentials file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialVerification {
    pub exists: bool,
    /// File parses as a JSON object
    pub valid: bool,
    /// Top-level keys of the object, never their values
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn verify_credentials(path: &Path) -> CredentialVerification {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(path = %path.display(), "Credentials not readable: {}", e);
            return CredentialVerification {
                exists: path.exists(),
                valid: false,
                keys: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    match serde_json::from_str::<serde_json::Value>(&contents) {
        Ok(serde_json::Value::Object(map)) => CredentialVerification {
            exists: true,
            valid: true,
            keys: map.keys().cloned().collect(),
            error: None,
        },
        Ok(_) => CredentialVerification {
            exists: true,
            valid: false,
            keys: Vec::new(),
            error: Some("credentials file is not a JSON object".to_string()),
        },
        Err(e) => CredentialVerification {
            exists: true,
            valid: false,
            keys: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

/// First existing OAuth keys file, checking `credentials_dir` then `cwd`.
pub fn find_oauth_keys(credentials_dir: &Path, cwd: &Path) -> Option<PathBuf> {
    [credentials_dir.join(OAUTH_KEYS_FILE), cwd.join(OAUTH_KEYS_FILE)]
        .into_iter()
        .find(|path| path.exists())
}
