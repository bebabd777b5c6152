#![allow(dead_code)]

use std::io::{Cursor, Write};

use gdoc_core::manifest::MetadataRecord;
use gdoc_core::EngineConfig;
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builds zip bytes holding `entries` in the given order.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// An export archive with a manifest built from `manifest` plus documents.
pub fn export_zip(manifest: &Value, documents: &[(&str, &[u8])]) -> Vec<u8> {
    let manifest = serde_json::to_vec(manifest).expect("serialize manifest");
    let mut entries: Vec<(&str, &[u8])> = vec![("export.txt", manifest.as_slice())];
    entries.extend_from_slice(documents);
    zip_bytes(&entries)
}

pub fn records(manifest: Value) -> Vec<MetadataRecord> {
    serde_json::from_value(manifest).expect("manifest fixture is valid")
}

pub fn test_config(api_url: &str) -> EngineConfig {
    let mut config = EngineConfig::new(api_url);
    config.test_mode = true;
    config
}
