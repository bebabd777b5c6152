//! The `export.txt` manifest and the records it carries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::archive::Archive;
use crate::error::{GdocError, Result};

/// Name of the manifest entry inside every export archive.
pub const MANIFEST_ENTRY: &str = "export.txt";

/// Single-letter manifest language codes and their two-letter tags.
pub const LANGUAGES: [(&str, &str); 7] = [
    ("A", "AR"),
    ("C", "ZH"),
    ("E", "EN"),
    ("F", "FR"),
    ("R", "RU"),
    ("S", "ES"),
    ("G", "DE"),
];

pub fn language_tag(code: &str) -> Option<&'static str> {
    let code = code.trim();
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, tag)| *tag)
}

/// One document description from the manifest.
///
/// Identifier fields (`jobId`, `odsNo`, ...) have been renamed across API
/// versions, so they stay in [`MetadataRecord::fields`] and are looked up by
/// name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub symbol1: Option<String>,
    #[serde(default)]
    pub symbol2: Option<String>,
    #[serde(rename = "languageId", default)]
    pub language_id: Option<String>,
    #[serde(rename = "distributionType", default)]
    pub distribution_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MetadataRecord {
    /// Non-blank symbols, `symbol1` first.
    pub fn symbols(&self) -> Vec<&str> {
        [self.symbol1.as_deref(), self.symbol2.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Two-letter language tag, if the code is one the API is known to send.
    pub fn language(&self) -> Option<&'static str> {
        self.language_id.as_deref().and_then(language_tag)
    }

    /// A field rendered as a string. Numbers use their decimal form; blank
    /// strings, nulls and structured values count as absent.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Decodes the manifest entry of `archive`.
pub fn parse(archive: &mut Archive) -> Result<Vec<MetadataRecord>> {
    let bytes = archive.read_entry(MANIFEST_ENTRY)?.ok_or_else(|| {
        error!(entry = MANIFEST_ENTRY, "Archive has no manifest");
        GdocError::ManifestMissing {
            entry: MANIFEST_ENTRY.to_string(),
        }
    })?;
    let records = decode(&bytes)?;
    info!(records = records.len(), "Manifest decoded");
    Ok(records)
}

/// Decodes manifest bytes, tolerating a UTF-8 byte order mark.
pub fn decode(bytes: &[u8]) -> Result<Vec<MetadataRecord>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    serde_json::from_slice(bytes).map_err(|source| {
        error!(error = ?source, entry = MANIFEST_ENTRY, "Manifest is not a JSON array of records");
        GdocError::ManifestFormat {
            entry: MANIFEST_ENTRY.to_string(),
            source,
        }
    })
}
