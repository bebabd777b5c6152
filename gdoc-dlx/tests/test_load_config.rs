use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use gdoc_dlx::load_config::{load_config, CLIENT_ID_ENV, CLIENT_SECRET_ENV, SUBSCRIPTION_KEY_ENV};

const TEST_MODE_ENV: &str = "GDOC_API_TEST_MODE";

const FULL_YAML: &str = r#"
api:
  url: https://gdoc.example.org/api/documents
  token_url: https://login.example.org/oauth2/token
  scopes: [documents.read]
  timeout_secs: 60
matching:
  extensions: [pdf, docx]
  identifier_fields: [odsNo, jobId]
import:
  output_dir: ./tmp/files
  skip_distribution_types: [RES]
retro:
  ledger: ./tmp/retro.json
"#;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

fn clear_env() {
    for var in [TEST_MODE_ENV, CLIENT_ID_ENV, CLIENT_SECRET_ENV, SUBSCRIPTION_KEY_ENV] {
        env::remove_var(var);
    }
}

/// Static YAML plus env secrets produce a live engine config.
#[test]
#[serial]
fn test_load_config_merges_yaml_and_env_secrets() {
    clear_env();
    env::set_var(CLIENT_ID_ENV, "dlx-client");
    env::set_var(CLIENT_SECRET_ENV, "s3cret");
    env::set_var(SUBSCRIPTION_KEY_ENV, "apim-key");
    let file = config_file(FULL_YAML);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.engine.api_url, "https://gdoc.example.org/api/documents");
    assert!(!config.engine.test_mode);
    assert_eq!(config.engine.timeout, Duration::from_secs(60));
    assert_eq!(config.engine.extensions, vec!["pdf", "docx"]);
    assert_eq!(config.engine.identifier_priority.fields(), ["odsNo", "jobId"]);
    assert_eq!(
        config.engine.subscription_key.as_ref().map(|k| k.expose()),
        Some("apim-key")
    );
    let auth = config.engine.auth.expect("auth configured");
    assert_eq!(auth.client_id, "dlx-client");
    assert_eq!(auth.client_secret.expose(), "s3cret");
    assert_eq!(auth.token_url, "https://login.example.org/oauth2/token");
    assert_eq!(auth.scopes, vec!["documents.read"]);

    assert_eq!(config.import.output_dir, PathBuf::from("./tmp/files"));
    assert_eq!(config.import.skip_distribution_types, vec!["RES"]);
    assert_eq!(config.retro.ledger, PathBuf::from("./tmp/retro.json"));
    clear_env();
}

/// Optional sections fall back to the engine defaults.
#[test]
#[serial]
fn test_load_config_defaults_for_optional_sections() {
    clear_env();
    env::set_var(TEST_MODE_ENV, "1");
    let file = config_file(
        r#"
api:
  url: http://localhost:8080/api/documents
import:
  output_dir: ./files
"#,
    );

    let config = load_config(file.path()).expect("Minimal config should load in test mode");

    assert!(config.engine.test_mode);
    assert!(config.engine.auth.is_none());
    assert_eq!(config.engine.extensions, vec!["pdf"]);
    assert_eq!(config.engine.identifier_priority.fields(), ["jobId", "odsNo"]);
    assert_eq!(config.retro.ledger, PathBuf::from("gdoc-dlx-retro.json"));
    clear_env();
}

/// Outside test mode the client credentials are mandatory.
#[test]
#[serial]
fn test_load_config_errors_without_credentials() {
    clear_env();
    env::set_var(CLIENT_ID_ENV, "dlx-client");
    let file = config_file(FULL_YAML);

    let err = load_config(file.path()).unwrap_err();
    assert!(
        err.to_string().contains(CLIENT_SECRET_ENV),
        "Missing secret should be named, got: {err}"
    );
    clear_env();
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    clear_env();
    let file = config_file("not-yaml: [:::");

    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/nonexistent/gdoc-dlx.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
