//! Pairs archive entries with manifest records.
//!
//! Document entries are named `<prefix><digits>.<ext>`. The digits are looked
//! up against the identifier fields of the manifest in priority order. This
//! module performs no I/O: it works on entry names and decoded records only.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::manifest::MetadataRecord;

static DOCUMENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]*([0-9]+)\.([A-Za-z0-9]+)$").expect("document name pattern is valid")
});

/// Identifier field names tried in order when resolving an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPriority {
    fields: Vec<String>,
}

impl IdentifierPriority {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Default for IdentifierPriority {
    /// Current API generation first, legacy name second.
    fn default() -> Self {
        Self::new(["jobId", "odsNo"])
    }
}

/// Non-fatal reconciliation findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A document entry has no record in the manifest.
    UnmatchedFile { name: String, identifier: String },
    /// A record has no document entry in the archive.
    MissingExpectedFile {
        identifier: Option<String>,
        symbols: Vec<String>,
    },
}

impl Warning {
    /// Reports the warning as a structured log event.
    pub fn emit(&self) {
        match self {
            Warning::UnmatchedFile { name, identifier } => {
                warn!(file = %name, identifier = %identifier, "Data for file not found in manifest");
            }
            Warning::MissingExpectedFile {
                identifier,
                symbols,
            } => {
                warn!(
                    identifier = identifier.as_deref().unwrap_or("<none>"),
                    symbols = ?symbols,
                    "Manifest record has no file in archive"
                );
            }
        }
    }
}

/// Outcome of matching one document entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMatch<'m> {
    pub name: String,
    pub identifier: String,
    pub record: Option<&'m MetadataRecord>,
}

impl FileMatch<'_> {
    pub fn warning(&self) -> Option<Warning> {
        match self.record {
            Some(_) => None,
            None => Some(Warning::UnmatchedFile {
                name: self.name.clone(),
                identifier: self.identifier.clone(),
            }),
        }
    }
}

/// Extracts the identifier digits from a document entry name. Names without
/// a recognized extension yield `None`.
pub fn document_identifier<'n>(name: &'n str, extensions: &[String]) -> Option<&'n str> {
    let caps = DOCUMENT_NAME.captures(name)?;
    let ext = caps.get(2)?.as_str();
    if !extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

pub struct Matcher<'m> {
    records: &'m [MetadataRecord],
    priority: IdentifierPriority,
    extensions: Vec<String>,
    /// One index per priority field, same order. Values point at the first
    /// record in manifest order carrying that identifier.
    indexes: Vec<HashMap<String, usize>>,
}

impl<'m> Matcher<'m> {
    pub fn new(
        records: &'m [MetadataRecord],
        priority: &IdentifierPriority,
        extensions: &[String],
    ) -> Self {
        let indexes = priority
            .fields()
            .iter()
            .map(|field| {
                let mut index = HashMap::new();
                for (position, record) in records.iter().enumerate() {
                    if let Some(value) = record.field(field) {
                        index.entry(value).or_insert(position);
                    }
                }
                index
            })
            .collect();
        Self {
            records,
            priority: priority.clone(),
            extensions: extensions.to_vec(),
            indexes,
        }
    }

    /// First record whose highest-priority populated field equals `identifier`.
    pub fn resolve(&self, identifier: &str) -> Option<&'m MetadataRecord> {
        let records = self.records;
        self.position(identifier).map(|position| &records[position])
    }

    fn position(&self, identifier: &str) -> Option<usize> {
        self.indexes
            .iter()
            .find_map(|index| index.get(identifier))
            .copied()
    }

    /// Matches one entry name. Non-document names yield `None`.
    pub fn match_name(&self, name: String) -> Option<FileMatch<'m>> {
        let identifier = document_identifier(&name, &self.extensions)?.to_string();
        let record = self.resolve(&identifier);
        Some(FileMatch {
            name,
            identifier,
            record,
        })
    }

    /// Lazily matches every document entry among `names`.
    pub fn iterate<'a, I>(&'a self, names: I) -> impl Iterator<Item = FileMatch<'m>> + 'a
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: 'a,
    {
        names.into_iter().filter_map(move |name| self.match_name(name))
    }

    /// Records that no document entry among `names` resolves to. A record
    /// shadowed by a higher-priority field or an earlier duplicate is missing
    /// even when its own identifier appears among the entries.
    pub fn missing_expected(&self, names: &[String]) -> Vec<Warning> {
        let resolved: HashSet<usize> = names
            .iter()
            .filter_map(|name| document_identifier(name, &self.extensions))
            .filter_map(|identifier| self.position(identifier))
            .collect();

        self.records
            .iter()
            .enumerate()
            .filter(|(position, _)| !resolved.contains(position))
            .map(|(_, record)| Warning::MissingExpectedFile {
                identifier: self
                    .priority
                    .fields()
                    .iter()
                    .find_map(|field| record.field(field)),
                symbols: record.symbols().into_iter().map(str::to_string).collect(),
            })
            .collect()
    }
}
