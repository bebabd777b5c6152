#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use gdoc_core::EngineConfig;
use gdoc_dlx::load_config::{CliConfig, ImportSection, RetroSection};
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const API_PATH: &str = "/api/documents";

/// An export archive: `export.txt` holding `manifest`, then `documents`.
pub fn export_zip(manifest: &Value, documents: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("export.txt", SimpleFileOptions::default())
        .unwrap();
    writer
        .write_all(&serde_json::to_vec(manifest).unwrap())
        .unwrap();
    for (name, content) in documents {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Test-mode config pointing at a stub server.
pub fn cli_config(server_uri: &str, output_dir: &Path, ledger: &Path) -> CliConfig {
    let mut engine = EngineConfig::new(format!("{server_uri}{API_PATH}"));
    engine.test_mode = true;
    CliConfig {
        engine,
        import: ImportSection {
            output_dir: output_dir.to_path_buf(),
            skip_distribution_types: vec!["RES".to_string()],
        },
        retro: RetroSection {
            ledger: ledger.to_path_buf(),
        },
    }
}

/// Report lines written by a command, decoded.
pub fn report_lines(out: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(out)
        .lines()
        .map(|line| serde_json::from_str(line).expect("report line is JSON"))
        .collect()
}
