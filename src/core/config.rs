//! Client configuration with documented defaults
//!
//! Everything the client needs to reach the simulation service and to react
//! to its lifecycle events lives here. Values come from defaults, the
//! environment, or a TOML file.

use crate::core::error::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the sandbox client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // === SERVICE ===
    /// Base URL of the simulation API (no trailing slash)
    pub api_url: String,

    /// File holding the bearer credential under the `"token"` key
    pub credentials_path: PathBuf,

    // === TURN LIFECYCLE ===
    /// Where the caller is sent after a credits-exhaustion error event
    pub credits_redirect: String,

    /// Delay before the credits redirect fires, in milliseconds
    ///
    /// Gives the user time to read the error message first.
    pub redirect_delay_ms: u64,

    /// Nominal duration of one simulated turn, in seconds
    ///
    /// Only drives the progress indicator. Turns are never cancelled
    /// for running longer than this.
    pub expected_turn_secs: u64,

    // === LEADERBOARD ===
    /// Rows shown at each end of the ranking table before the middle is elided
    pub leaderboard_edge: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            credentials_path: PathBuf::from(".states-sandbox/credentials.json"),
            credits_redirect: "/account?buy=true".into(),
            redirect_delay_ms: 2_000,
            expected_turn_secs: 5 * 60,
            leaderboard_edge: 20,
        }
    }
}

impl ClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the environment
    ///
    /// Optional: SANDBOX_API_URL, SANDBOX_CREDENTIALS
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SANDBOX_API_URL") {
            config.api_url = url;
        }
        if let Ok(path) = std::env::var("SANDBOX_CREDENTIALS") {
            config.credentials_path = PathBuf::from(path);
        }
        config
    }

    /// Load a config from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn expected_turn_duration(&self) -> Duration {
        Duration::from_secs(self.expected_turn_secs)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(SandboxError::Config(format!(
                "api_url ({}) must be an http(s) URL",
                self.api_url
            )));
        }

        if self.api_url.ends_with('/') {
            return Err(SandboxError::Config(format!(
                "api_url ({}) must not end with '/'",
                self.api_url
            )));
        }

        if self.leaderboard_edge == 0 {
            return Err(SandboxError::Config("leaderboard_edge must be positive".into()));
        }

        if self.expected_turn_secs == 0 {
            return Err(SandboxError::Config("expected_turn_secs must be positive".into()));
        }

        Ok(())
    }
}

// === GLOBAL CONFIG ACCESS ===

use std::sync::OnceLock;

static CONFIG: OnceLock<ClientConfig> = OnceLock::new();

/// Get the global client config (initializes from the environment if not set)
pub fn config() -> &'static ClientConfig {
    CONFIG.get_or_init(ClientConfig::from_env)
}

/// Set the global client config (can only be called once)
///
/// Returns Err if config was already set.
pub fn set_config(config: ClientConfig) -> std::result::Result<(), ClientConfig> {
    CONFIG.set(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.redirect_delay(), Duration::from_secs(2));
        assert_eq!(config.expected_turn_duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            api_url = "https://sandbox.example.com"
            leaderboard_edge = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "https://sandbox.example.com");
        assert_eq!(config.leaderboard_edge, 10);
        assert_eq!(config.credits_redirect, "/account?buy=true");
    }

    #[test]
    fn test_trailing_slash_rejected() {
        let result = ClientConfig::from_toml(r#"api_url = "http://localhost:8000/""#);
        assert!(matches!(result, Err(SandboxError::Config(_))));
    }

    #[test]
    fn test_zero_edge_rejected() {
        let config = ClientConfig {
            leaderboard_edge: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let result = ClientConfig::from_toml("api_url = ");
        assert!(matches!(result, Err(SandboxError::TomlError(_))));
    }
}
