//! Client configuration: where the service lives and where the credential comes from.

use crate::error::ServiceError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Environment variable holding the service credential.
pub const DEFAULT_CREDENTIAL_ENV: &str = "API_KEY";

/// Checked when [`DEFAULT_CREDENTIAL_ENV`] is unset.
pub const FALLBACK_CREDENTIAL_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API endpoint URL
    pub api_base: String,

    /// Name of the environment variable that holds the credential
    pub credential_env: String,

    /// Second variable tried when the first is unset
    #[serde(default)]
    pub fallback_credential_env: Option<String>,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Per-request timeout in seconds. `None` waits as long as the service does.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            fallback_credential_env: Some(FALLBACK_CREDENTIAL_ENV.to_string()),
            connect_timeout_secs: 20,
            request_timeout_secs: Some(300),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// With API endpoint
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// With credential variable name
    pub fn with_credential_env(mut self, name: impl Into<String>) -> Self {
        self.credential_env = name.into();
        self.fallback_credential_env = None;
        self
    }

    /// With request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Read the credential from the process environment.
    ///
    /// Called once per request, so a key exported while the process runs is
    /// picked up by the next call.
    pub fn credential(&self) -> std::result::Result<String, ServiceError> {
        let candidates =
            std::iter::once(self.credential_env.as_str()).chain(self.fallback_credential_env.as_deref());
        for name in candidates {
            if let Ok(value) = std::env::var(name) {
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
        Err(ServiceError::MissingCredential(self.credential_env.clone()))
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
