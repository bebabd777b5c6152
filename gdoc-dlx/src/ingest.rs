//! Files every matched document into the output directory under its encoded
//! name and reports each outcome as one JSON line.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gdoc_core::filename::encode_filename;
use gdoc_core::manifest::language_tag;
use gdoc_core::{DocumentStream, MetadataRecord};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// Symbols containing this marker are meeting journals and never imported.
pub const JOURNAL_MARKER: &str = "JOURNAL";

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub output_dir: PathBuf,
    /// Two-letter tag; records in other languages are skipped.
    pub language: Option<String>,
    pub overwrite: bool,
    pub skip_distribution_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unmatched,
    /// No usable symbol to derive a file name from.
    NoSymbol,
    Journal,
    Language(String),
    Distribution(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported {
        checksum: String,
        path: PathBuf,
        symbols: Vec<String>,
        languages: Vec<String>,
    },
    AlreadyPresent {
        symbols: Vec<String>,
        languages: Vec<String>,
    },
    Skipped(SkipReason),
    Failed {
        error: String,
        symbols: Vec<String>,
        languages: Vec<String>,
    },
}

impl ImportOutcome {
    /// The JSON report line for this outcome. Skips are not reported.
    pub fn report(&self) -> Option<Value> {
        match self {
            ImportOutcome::Imported {
                checksum,
                symbols,
                languages,
                ..
            } => Some(json!({
                "info": "OK",
                "data": {"checksum": checksum, "symbols": symbols, "languages": languages}
            })),
            ImportOutcome::AlreadyPresent { symbols, languages } => Some(json!({
                "info": "Already in the system",
                "data": {"symbols": symbols, "languages": languages}
            })),
            ImportOutcome::Skipped(_) => None,
            ImportOutcome::Failed {
                error,
                symbols,
                languages,
            } => Some(json!({
                "error": error,
                "data": {"symbols": symbols, "languages": languages}
            })),
        }
    }
}

pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    /// Creates the output directory if needed.
    pub fn new(options: ImportOptions) -> Result<Self> {
        fs::create_dir_all(&options.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {:?}",
                options.output_dir
            )
        })?;
        info!(output_dir = ?options.output_dir, overwrite = options.overwrite, "Importer ready");
        Ok(Self { options })
    }

    /// Decides whether the document is wanted and, if so, stores it.
    pub fn import(
        &self,
        stream: &mut DocumentStream<'_>,
        record: Option<&MetadataRecord>,
    ) -> ImportOutcome {
        let Some(record) = record else {
            return ImportOutcome::Skipped(SkipReason::Unmatched);
        };
        let symbols = record.symbols();
        if symbols.is_empty() {
            warn!(file = stream.name(), job_id = ?record.field("jobId"), "Record has no symbol, not importing");
            return ImportOutcome::Skipped(SkipReason::NoSymbol);
        }
        let owned_symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();

        if symbols.iter().any(|s| s.contains(JOURNAL_MARKER)) {
            debug!(file = stream.name(), symbols = ?symbols, "Skipping journal");
            return ImportOutcome::Skipped(SkipReason::Journal);
        }
        if let Some(kind) = record.distribution_type.as_deref().map(str::trim) {
            if self
                .options
                .skip_distribution_types
                .iter()
                .any(|skip| skip.eq_ignore_ascii_case(kind))
            {
                debug!(file = stream.name(), distribution = kind, "Skipping restricted distribution");
                return ImportOutcome::Skipped(SkipReason::Distribution(kind.to_string()));
            }
        }

        let Some(language) = record.language() else {
            let code = record.language_id.clone().unwrap_or_default();
            error!(file = stream.name(), language_id = %code, "Record has an unknown language code");
            return ImportOutcome::Failed {
                error: format!("unknown language code {code:?}"),
                symbols: owned_symbols,
                languages: Vec::new(),
            };
        };
        let languages = vec![language.to_string()];

        if let Some(wanted) = &self.options.language {
            if !wanted.eq_ignore_ascii_case(language) {
                return ImportOutcome::Skipped(SkipReason::Language(language.to_string()));
            }
        }

        match self.store(stream, &symbols, language) {
            Ok(Some((checksum, path))) => {
                info!(file = stream.name(), path = ?path, checksum = %checksum, "Document imported");
                ImportOutcome::Imported {
                    checksum,
                    path,
                    symbols: owned_symbols,
                    languages,
                }
            }
            Ok(None) => ImportOutcome::AlreadyPresent {
                symbols: owned_symbols,
                languages,
            },
            Err(e) => {
                error!(error = ?e, file = stream.name(), "Document import failed");
                ImportOutcome::Failed {
                    error: one_line(&format!("{e:#}")),
                    symbols: owned_symbols,
                    languages,
                }
            }
        }
    }

    /// Writes the stream to its final name. `Ok(None)` when the target exists
    /// and overwriting is off.
    fn store(
        &self,
        stream: &mut DocumentStream<'_>,
        symbols: &[&str],
        language: &str,
    ) -> Result<Option<(String, PathBuf)>> {
        let extension = Path::new(stream.name())
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("pdf")
            .to_ascii_lowercase();
        let name = encode_filename(symbols, language, &extension)?;
        let target = self.options.output_dir.join(&name);
        if target.exists() && !self.options.overwrite {
            debug!(path = ?target, "Target exists, not overwriting");
            return Ok(None);
        }

        let mut staged = NamedTempFile::new_in(&self.options.output_dir)
            .context("Failed to stage document in output directory")?;
        let checksum = copy_hashed(stream, staged.as_file_mut())
            .with_context(|| format!("Failed to read archive entry {}", stream.name()))?;

        if self.options.overwrite {
            staged
                .persist(&target)
                .with_context(|| format!("Failed to write {target:?}"))?;
        } else {
            match staged.persist_noclobber(&target) {
                Ok(_) => {}
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
                Err(e) => {
                    return Err(e.error).with_context(|| format!("Failed to write {target:?}"))
                }
            }
        }
        Ok(Some((checksum, target)))
    }
}

/// Copies `reader` into `writer` and returns the hex SHA-256 of the bytes.
fn copy_hashed(reader: &mut impl Read, writer: &mut impl Write) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
    }
    writer.flush()?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn one_line(message: &str) -> String {
    message
        .split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Normalizes a `--language` value: single-letter manifest codes map to their
/// tag, two-letter tags are upper-cased.
pub fn normalize_language(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.len() == 1 {
        return language_tag(value)
            .map(str::to_string)
            .ok_or_else(|| format!("unknown language code {value:?}"));
    }
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(value.to_ascii_uppercase());
    }
    Err(format!("expected a language code or two-letter tag, got {value:?}"))
}
