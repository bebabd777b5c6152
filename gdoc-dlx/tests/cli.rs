use assert_cmd::Command;
use clap::Parser;
use gdoc_dlx::{Cli, Commands};
use predicates::prelude::*;
use serde_json::json;
use std::fs::write;
use std::io::{Cursor, Write};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn export_body() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let manifest = json!([{"jobId": "42", "symbol1": "S/RES/2700 (2023)", "languageId": "E"}]);
    writer
        .start_file("export.txt", SimpleFileOptions::default())
        .unwrap();
    writer
        .write_all(manifest.to_string().as_bytes())
        .unwrap();
    writer
        .start_file("N42.pdf", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"%PDF-1.7 resolution").unwrap();
    writer.finish().unwrap().into_inner()
}

/// Writes a config whose API points at `api_url` and files into `dir/files`.
fn write_config(dir: &TempDir, api_url: &str) -> std::path::PathBuf {
    let config = dir.path().join("gdoc-dlx.yaml");
    let yaml = format!(
        "api:\n  url: {api_url}\nimport:\n  output_dir: {}\nretro:\n  ledger: {}\n",
        dir.path().join("files").display(),
        dir.path().join("retro.json").display()
    );
    write(&config, yaml).expect("Writing temp config failed");
    config
}

fn gdoc_dlx() -> Command {
    let mut cmd = Command::cargo_bin("gdoc-dlx").expect("Binary exists");
    cmd.env_remove("GDOC_CLIENT_ID")
        .env_remove("GDOC_CLIENT_SECRET")
        .env_remove("OCP_APIM_SUBSCRIPTION_KEY");
    cmd
}

#[test]
fn help_lists_subcommands() {
    gdoc_dlx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch").and(predicate::str::contains("retro")));
}

#[test]
fn fetch_requires_date_or_symbol() {
    gdoc_dlx()
        .args(["fetch", "--config", "unused.yaml", "--station", "NY"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--date").or(predicate::str::contains("--symbol")));
}

#[test]
fn fetch_rejects_date_and_symbol_together() {
    gdoc_dlx()
        .args([
            "fetch", "--config", "unused.yaml", "--station", "NY", "--date", "2024-03-01",
            "--symbol", "A/1",
        ])
        .assert()
        .failure();
}

#[test]
fn language_requires_symbol() {
    gdoc_dlx()
        .args([
            "fetch", "--config", "unused.yaml", "--station", "GE", "--date", "2024-03-01",
            "--language", "F",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--symbol"));
}

#[test]
fn language_with_a_symbol_passes_validation() {
    let parse = |args: &[&str]| match Cli::try_parse_from(args).unwrap().command {
        Commands::Fetch(fetch) => fetch,
        Commands::Retro { .. } => panic!("expected fetch"),
    };

    let by_symbol = parse(&[
        "gdoc-dlx", "fetch", "--config", "c.yaml", "--station", "GE", "--symbol", "A/1",
        "--language", "F",
    ]);
    by_symbol.validate().unwrap();
    assert_eq!(by_symbol.language.as_deref(), Some("FR"));

    let by_date = parse(&[
        "gdoc-dlx", "fetch", "--config", "c.yaml", "--station", "GE", "--date", "2024-03-01",
        "--language", "F",
    ]);
    let err = by_date.validate().unwrap_err();
    assert!(err.to_string().contains("--symbol"), "got {err}");
}

#[test]
fn unknown_station_is_rejected() {
    gdoc_dlx()
        .args(["fetch", "--config", "unused.yaml", "--station", "VI", "--date", "2024-03-01"])
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_in_test_mode_files_documents_and_reports_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(export_body()))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &format!("{}/api/documents", server.uri()));

    gdoc_dlx()
        .env("GDOC_API_TEST_MODE", "1")
        .args(["fetch", "--station", "NY", "--date", "2024-03-01", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""info":"OK""#));

    let stored = dir.path().join("files").join("S_RES_2700_(2023)-EN.pdf");
    assert_eq!(std::fs::read(stored).unwrap(), b"%PDF-1.7 resolution");
}

#[test]
fn missing_credentials_fail_outside_test_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("gdoc-dlx.yaml");
    write(
        &config,
        "api:\n  url: http://127.0.0.1:9/api\n  token_url: http://127.0.0.1:9/token\nimport:\n  output_dir: ./files\n",
    )
    .unwrap();

    gdoc_dlx()
        .env_remove("GDOC_API_TEST_MODE")
        .args(["fetch", "--station", "NY", "--symbol", "A/1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GDOC_CLIENT_ID"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Collects emitted events as debug strings.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use gdoc_dlx::cli::run;

    let cli = Cli {
        command: Commands::Retro {
            config: std::path::PathBuf::from("dummy.yaml"),
            ledger: None,
        },
    };
    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
