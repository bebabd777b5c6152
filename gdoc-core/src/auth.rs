//! OAuth2 client-credentials authentication.

use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{AuthConfig, EngineConfig};
use crate::contract::Authenticator;
use crate::error::{GdocError, Result};

/// Bearer token plus what is known about how it was issued.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub token_type: String,
    pub endpoint: String,
    pub scope: Vec<String>,
    pub expires_at: Option<SystemTime>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: "Bearer".to_string(),
            endpoint: endpoint.into(),
            scope: Vec::new(),
            expires_at: None,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| SystemTime::now() >= at)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"***")
            .field("token_type", &self.token_type)
            .field("endpoint", &self.endpoint)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Client-credentials grant with the client id and secret sent as HTTP Basic auth.
pub struct ClientCredentialsAuthenticator {
    client: reqwest::Client,
    config: AuthConfig,
}

impl ClientCredentialsAuthenticator {
    pub fn new(client: reqwest::Client, config: AuthConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Authenticator for ClientCredentialsAuthenticator {
    async fn authenticate(&self) -> Result<Option<Credential>> {
        let endpoint = &self.config.token_url;
        let scope = self.config.scopes.join(" ");
        info!(endpoint = %endpoint, scope = %scope, "Requesting client-credentials token");

        let response = self
            .client
            .post(endpoint)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.expose()))
            .form(&[("grant_type", "client_credentials"), ("scope", scope.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, endpoint = %endpoint, "Token request could not be sent");
                GdocError::authentication(endpoint, e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
        if !status.is_success() {
            error!(status = %status, endpoint = %endpoint, "Token endpoint returned error. Response body: {text}");
            return Err(GdocError::authentication(
                endpoint,
                format!("HTTP {status}: {text}"),
            ));
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            error!(error = ?e, endpoint = %endpoint, "Token response is not a valid grant");
            GdocError::authentication(endpoint, format!("malformed token response: {e}"))
        })?;

        let scope = match token.scope {
            Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
            None => self.config.scopes.clone(),
        };
        let credential = Credential {
            token: token.access_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            endpoint: endpoint.clone(),
            scope,
            expires_at: token
                .expires_in
                .map(|secs| SystemTime::now() + Duration::from_secs(secs)),
        };
        info!(endpoint = %endpoint, expires_in = ?token.expires_in, "Token acquired");
        Ok(Some(credential))
    }
}

/// Issues no request and no credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestModeAuthenticator;

#[async_trait]
impl Authenticator for TestModeAuthenticator {
    async fn authenticate(&self) -> Result<Option<Credential>> {
        info!("Test mode active, skipping authentication");
        Ok(None)
    }
}

/// Picks the strategy the configuration asks for.
pub fn authenticator_for(
    config: &EngineConfig,
    client: reqwest::Client,
) -> Result<Box<dyn Authenticator>> {
    if config.test_mode {
        return Ok(Box::new(TestModeAuthenticator));
    }
    match &config.auth {
        Some(auth) => Ok(Box::new(ClientCredentialsAuthenticator::new(
            client,
            auth.clone(),
        ))),
        None => Err(GdocError::Config(
            "client credentials are required outside test mode".to_string(),
        )),
    }
}
