// src/config/mod.rs
// Client configuration: endpoint, auth, retry policy, error taxonomy knobs

use std::time::Duration;

use anyhow::Result;
use tracing::debug;

/// Default number of consecutive transient protocol errors tolerated on one
/// job before it is forced terminal.
pub const DEFAULT_RETRY_CEILING: u32 = 10;

/// Server error names treated as unrecoverable. Kept as configuration so the
/// boundary can be corrected without touching the classifier.
pub const DEFAULT_FATAL_ERROR_NAMES: &[&str] = &[
    "Task Crashed",
    "Task Timeout",
    "Unknown error",
    "Rate Limit Exceeded",
];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub retry_ceiling: u32,
    pub fatal_error_names: Vec<String>,
    pub gzip_requests: bool,
}

impl ClientConfig {
    /// Create configuration from the environment (`.env` honored).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("ANIMA_API_BASE_URL")
            .map_err(|_| anyhow::anyhow!("ANIMA_API_BASE_URL must be set"))?;
        let auth_token = std::env::var("ANIMA_API_TOKEN").ok();

        debug!("Initialized Anima client config: base_url={}", base_url);

        let mut config = Self::with_base_url(base_url);
        config.auth_token = auth_token;
        Ok(config)
    }

    /// Create configuration with explicit values.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout_secs: 300,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            fatal_error_names: DEFAULT_FATAL_ERROR_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            gzip_requests: true,
        }
        .normalized()
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    pub fn fatal_error_names(mut self, names: Vec<String>) -> Self {
        self.fatal_error_names = names;
        self
    }

    pub fn gzip_requests(mut self, enabled: bool) -> Self {
        self.gzip_requests = enabled;
        self
    }

    /// Timeout for non-streamed requests (asset downloads). The job stream
    /// itself is never time-bounded; callers bound it with cancellation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(anyhow::anyhow!("Base URL cannot be empty"));
        }
        if self.retry_ceiling == 0 {
            return Err(anyhow::anyhow!("retry_ceiling must be at least 1"));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_stripped() {
        let config = ClientConfig::with_base_url("https://api.example.com/");
        assert_eq!(config.base_url(), "https://api.example.com");
    }

    #[test]
    fn defaults_cover_fatal_taxonomy() {
        let config = ClientConfig::with_base_url("https://api.example.com");
        assert_eq!(config.retry_ceiling, DEFAULT_RETRY_CEILING);
        assert!(config.fatal_error_names.iter().any(|n| n == "Task Crashed"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_base_url_rejected() {
        let config = ClientConfig::with_base_url("");
        assert!(config.validate().is_err());
    }
}
