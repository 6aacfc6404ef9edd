//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Public Mailin web-service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://ws.mailin.fr/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The account API key, sent with every request.
    pub api_key: String,

    /// URL every action is posted to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| ApiError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::Config("api_key cannot be empty".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ApiError::Config("endpoint cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ApiError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ClientConfig::from_toml_str(r#"api_key = "abc""#).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn explicit_fields_win() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_key = "abc"
            endpoint = "http://localhost:3000/"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://localhost:3000/");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn rejects_missing_or_empty_key() {
        assert!(matches!(ClientConfig::from_toml_str(""), Err(ApiError::Config(_))));
        assert!(matches!(
            ClientConfig::from_toml_str(r#"api_key = "  ""#),
            Err(ApiError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("api_key = \"k\"\ntimeout_secs = 0"),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn builder_style() {
        let config = ClientConfig::new("k").with_endpoint("http://example.test/");
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint, "http://example.test/");
    }
}
