//! Day-by-day backfill. The ledger records completed issue days; each run
//! fetches the day after the latest one for every duty station.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::cli::{fetch, FetchJob, Station};
use crate::load_config::CliConfig;

/// First issue day the export API has data for.
pub const FIRST_DAY: NaiveDate = match NaiveDate::from_ymd_opt(2017, 7, 24) {
    Some(day) => day,
    None => panic!("first day is a valid date"),
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub issue_date: NaiveDate,
    pub completed: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Reads the ledger. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(ledger = ?path, "No ledger yet, starting from the first day");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read ledger {path:?}")),
        };
        serde_json::from_str(&content).with_context(|| format!("Ledger {path:?} is not valid JSON"))
    }

    /// Writes the ledger through a temporary file in the same directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to stage ledger in {dir:?}"))?;
        serde_json::to_writer_pretty(staged.as_file_mut(), self)?;
        staged.as_file_mut().flush()?;
        staged
            .persist(path)
            .with_context(|| format!("Failed to write ledger {path:?}"))?;
        Ok(())
    }

    pub fn last_completed(&self) -> Option<NaiveDate> {
        self.entries.iter().map(|e| e.issue_date).max()
    }

    /// The day after the latest completed one, or [`FIRST_DAY`].
    pub fn next_day(&self) -> Result<NaiveDate> {
        match self.last_completed() {
            Some(last) => last
                .checked_add_days(Days::new(1))
                .context("Ledger date is out of range"),
            None => Ok(FIRST_DAY),
        }
    }

    pub fn record(&mut self, issue_date: NaiveDate, completed: DateTime<Utc>) {
        self.entries.push(LedgerEntry {
            issue_date,
            completed,
        });
    }
}

/// Fetches the next unprocessed day for every station, then records it.
/// Nothing is recorded unless every station succeeded.
pub async fn run(config: &CliConfig, ledger_path: &Path, out: &mut dyn Write) -> Result<()> {
    let mut ledger = Ledger::load(ledger_path)?;
    let day = ledger.next_day()?;
    info!(command = "retro", day = %day, "Processing issue day");

    for station in Station::ALL {
        let summary = fetch(config, &FetchJob::for_day(station, day), out).await?;
        info!(command = "retro", station = station.code(), day = %day, ?summary, "Station done");
        if summary.failed > 0 {
            bail!(
                "{} document(s) failed to import for {} on {day}",
                summary.failed,
                station.code()
            );
        }
    }

    ledger.record(day, Utc::now());
    ledger.save(ledger_path)?;
    info!(command = "retro", day = %day, "Issue day completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn empty_ledger_starts_at_first_day() {
        assert_eq!(Ledger::default().next_day().unwrap(), day("2017-07-24"));
    }

    #[test]
    fn next_day_follows_latest_entry_regardless_of_order() {
        let mut ledger = Ledger::default();
        ledger.record(day("2017-07-26"), Utc::now());
        ledger.record(day("2017-07-24"), Utc::now());
        assert_eq!(ledger.next_day().unwrap(), day("2017-07-27"));
    }

    #[test]
    fn next_day_crosses_month_boundary() {
        let mut ledger = Ledger::default();
        ledger.record(day("2017-07-31"), Utc::now());
        assert_eq!(ledger.next_day().unwrap(), day("2017-08-01"));
    }
}
