//! `load_config` module: loads the static YAML config and injects secrets from
//! the environment, producing the core [`EngineConfig`] plus the import and
//! retro settings the CLI needs.
//!
//! This is the only place where the user-supplied YAML is parsed.
//!
//! # Responsibilities
//! - Parse the YAML file into intermediate section structs
//! - Read client credentials and the subscription key from the environment
//! - Honour the test-mode switch, which makes credentials optional
//!
//! # Errors
//! Errors use `anyhow::Error` and name the file or variable at fault.
//!
//! Accepted shape:
//! ```yaml
//! api:
//!   url: https://gdoc.example.org/api/documents
//!   token_url: https://login.example.org/oauth2/token
//!   scopes: [documents.read]
//!   timeout_secs: 300
//! matching:
//!   extensions: [pdf]
//!   identifier_fields: [jobId, odsNo]
//! import:
//!   output_dir: ./files
//!   skip_distribution_types: [RES]
//! retro:
//!   ledger: ./gdoc-dlx-retro.json
//! ```

use anyhow::{anyhow, Context, Result};
use gdoc_core::config::{test_mode_from_env, TEST_MODE_ENV};
use gdoc_core::{AuthConfig, EngineConfig, IdentifierPriority, Secret};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

pub const CLIENT_ID_ENV: &str = "GDOC_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "GDOC_CLIENT_SECRET";
pub const SUBSCRIPTION_KEY_ENV: &str = "OCP_APIM_SUBSCRIPTION_KEY";

const DEFAULT_LEDGER: &str = "gdoc-dlx-retro.json";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub import: ImportSection,
    pub retro: RetroSection,
}

#[derive(Debug, Deserialize)]
struct ApiSection {
    url: String,
    #[serde(default)]
    token_url: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingSection {
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    identifier_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportSection {
    pub output_dir: PathBuf,
    /// Records with one of these distribution types are never imported.
    #[serde(default)]
    pub skip_distribution_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetroSection {
    #[serde(default = "default_ledger")]
    pub ledger: PathBuf,
}

impl Default for RetroSection {
    fn default() -> Self {
        Self {
            ledger: default_ledger(),
        }
    }
}

fn default_ledger() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER)
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    api: ApiSection,
    #[serde(default)]
    matching: MatchingSection,
    import: ImportSection,
    #[serde(default)]
    retro: RetroSection,
}

/// Loads a static YAML config file (no secrets) and injects secrets from env.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let engine = engine_config(raw.api, raw.matching)?;
    engine.trace_loaded();

    Ok(CliConfig {
        engine,
        import: raw.import,
        retro: raw.retro,
    })
}

fn engine_config(api: ApiSection, matching: MatchingSection) -> Result<EngineConfig> {
    let mut config = EngineConfig::new(api.url);
    config.test_mode = test_mode_from_env();

    if let Some(secs) = api.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if !matching.extensions.is_empty() {
        config.extensions = matching.extensions;
    }
    if !matching.identifier_fields.is_empty() {
        config.identifier_priority = IdentifierPriority::new(matching.identifier_fields);
    }
    config.subscription_key = env_var(SUBSCRIPTION_KEY_ENV).map(Secret::new);

    if config.test_mode {
        warn!(env = TEST_MODE_ENV, "Test mode enabled, client credentials are not used");
        return Ok(config);
    }

    let token_url = api
        .token_url
        .context("api.token_url is required unless test mode is enabled")?;
    let client_id = env_var(CLIENT_ID_ENV)
        .with_context(|| format!("{CLIENT_ID_ENV} must be set unless test mode is enabled"))?;
    let client_secret = env_var(CLIENT_SECRET_ENV)
        .with_context(|| format!("{CLIENT_SECRET_ENV} must be set unless test mode is enabled"))?;

    config.auth = Some(AuthConfig {
        client_id,
        client_secret: Secret::new(client_secret),
        token_url,
        scopes: api.scopes,
    });
    Ok(config)
}

/// A set, non-blank environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
