use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::matcher::IdentifierPriority;

/// Environment switch that disables real authentication.
pub const TEST_MODE_ENV: &str = "GDOC_API_TEST_MODE";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A value that must never appear in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Client-credentials grant settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: Secret,
    pub token_url: String,
    pub scopes: Vec<String>,
}

/// Everything one engine instance needs. Built once and passed in explicitly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_url: String,
    pub auth: Option<AuthConfig>,
    /// Sent as `Ocp-Apim-Subscription-Key` when present.
    pub subscription_key: Option<Secret>,
    pub test_mode: bool,
    pub timeout: Duration,
    pub identifier_priority: IdentifierPriority,
    /// Document extensions recognized by the matcher, without the dot.
    pub extensions: Vec<String>,
}

impl EngineConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            auth: None,
            subscription_key: None,
            test_mode: false,
            timeout: DEFAULT_TIMEOUT,
            identifier_priority: IdentifierPriority::default(),
            extensions: vec!["pdf".to_string()],
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            api_url = %self.api_url,
            token_url = self.auth.as_ref().map(|a| a.token_url.as_str()).unwrap_or("<none>"),
            test_mode = self.test_mode,
            timeout_secs = self.timeout.as_secs(),
            "Loaded EngineConfig"
        );
        debug!(?self, "EngineConfig loaded (full debug)");
    }
}

/// Reads [`TEST_MODE_ENV`]. Accepts `1`, `true` and `yes`.
pub fn test_mode_from_env() -> bool {
    std::env::var(TEST_MODE_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
