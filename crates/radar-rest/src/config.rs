//! REST adapter configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Connection settings for the hosted backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    /// Project URL, e.g. `https://project.example.co`
    pub base_url: Url,

    /// Public API key, sent as the `apikey` header on every request
    pub api_key: String,

    /// Session token of the signed-in user
    ///
    /// Without one, requests authenticate with the API key only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl RestConfig {
    /// Create a config with no session token and no timeout
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            access_token: None,
            timeout_secs: None,
        }
    }

    /// Set the session token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Request timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
