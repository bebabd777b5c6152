//! # gdoc-dlx CLI Interface
//!
//! Command parsing and orchestration only. Fetching, manifest parsing and
//! matching live in `gdoc-core`; filing documents lives in [`crate::ingest`].
//!
//! ## Subcommands
//! - `fetch`: one query against the export API, every matched document filed
//!   into the output directory.
//! - `retro`: `fetch` for the next unprocessed day across all duty stations.
//!
//! Report lines go to stdout as JSON, one per outcome. Logs go to stderr.
//!
//! For programmatic or integration use, call [`run`] with a constructed [`Cli`].

use crate::ingest::{normalize_language, ImportOptions, ImportOutcome, Importer};
use crate::load_config::{load_config, CliConfig};
use crate::retro;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use gdoc_core::query::{DATE_FROM, DATE_TO, DUTY_STATION, INCLUDE_FILES, SYMBOL};
use gdoc_core::Engine;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

/// CLI for gdoc-dlx: import gDoc exports into a document store.
#[derive(Parser)]
#[clap(
    name = "gdoc-dlx",
    version,
    about = "Pull gDoc document exports and file each document under its symbol-derived name"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one station's documents for a date or a symbol
    Fetch(FetchArgs),
    /// Fetch the day after the last completed one, for every station
    Retro {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Ledger file; defaults to `retro.ledger` from the config
        #[clap(long)]
        ledger: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Station {
    #[value(name = "NY")]
    NewYork,
    #[value(name = "GE")]
    Geneva,
}

impl Station {
    pub const ALL: [Station; 2] = [Station::NewYork, Station::Geneva];

    pub fn code(self) -> &'static str {
        match self {
            Station::NewYork => "NY",
            Station::Geneva => "GE",
        }
    }
}

#[derive(Debug, Clone, Args)]
#[clap(group(ArgGroup::new("selector").required(true).args(["date", "symbol"])))]
pub struct FetchArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,
    #[clap(long, value_enum)]
    pub station: Station,
    /// Issue day, YYYY-MM-DD
    #[clap(long)]
    pub date: Option<NaiveDate>,
    #[clap(long)]
    pub symbol: Option<String>,
    /// Language code (E) or tag (EN); only with --symbol
    #[clap(long, requires = "symbol", value_parser = normalize_language)]
    pub language: Option<String>,
    /// Replace documents that are already stored
    #[clap(long)]
    pub overwrite: bool,
    /// Keep a copy of the raw export archive at this path
    #[clap(long)]
    pub save_as: Option<PathBuf>,
    /// Print manifest records as JSON lines instead of importing
    #[clap(long)]
    pub data_only: bool,
}

impl FetchArgs {
    /// Cross-argument rules the `selector` group cannot express: a date
    /// satisfies the group, so `--language` is checked against `--symbol`
    /// here.
    pub fn validate(&self) -> Result<()> {
        if self.language.is_some() && self.symbol.is_none() {
            bail!("--language requires --symbol");
        }
        Ok(())
    }
}

/// One query against the export API.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub station: Station,
    pub date: Option<NaiveDate>,
    pub symbol: Option<String>,
    pub language: Option<String>,
    pub overwrite: bool,
    pub save_as: Option<PathBuf>,
    pub data_only: bool,
}

impl FetchJob {
    pub fn for_day(station: Station, date: NaiveDate) -> Self {
        Self {
            station,
            date: Some(date),
            symbol: None,
            language: None,
            overwrite: false,
            save_as: None,
            data_only: false,
        }
    }
}

impl From<&FetchArgs> for FetchJob {
    fn from(args: &FetchArgs) -> Self {
        Self {
            station: args.station,
            date: args.date,
            symbol: args.symbol.clone(),
            language: args.language.clone(),
            overwrite: args.overwrite,
            save_as: args.save_as.clone(),
            data_only: args.data_only,
        }
    }
}

/// Counts from one fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub iterated: usize,
    pub imported: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Async CLI entrypoint shared by `main` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Fetch(args) => {
            args.validate()?;
            let config = load_config(&args.config)?;
            tracing::info!(command = "fetch", station = args.station.code(), "Starting fetch");
            let summary = fetch(&config, &FetchJob::from(&args), &mut out).await?;
            tracing::info!(command = "fetch", ?summary, "Fetch complete");
            if summary.failed > 0 {
                bail!("{} document(s) failed to import", summary.failed);
            }
            Ok(())
        }
        Commands::Retro { config, ledger } => {
            let config = load_config(&config)?;
            let ledger = ledger.unwrap_or_else(|| config.retro.ledger.clone());
            tracing::info!(command = "retro", ledger = ?ledger, "Starting retro run");
            retro::run(&config, &ledger, &mut out).await
        }
    }
}

/// Runs one job and writes report lines to `out`.
pub async fn fetch(config: &CliConfig, job: &FetchJob, out: &mut dyn Write) -> Result<FetchSummary> {
    let mut engine = Engine::new(config.engine.clone())?;
    if let Some(symbol) = &job.symbol {
        engine.set_param(SYMBOL, symbol.as_str())?;
    }
    if let Some(date) = job.date {
        let day = date.format("%Y-%m-%d").to_string();
        engine.set_param(DATE_FROM, day.as_str())?;
        engine.set_param(DATE_TO, day)?;
    }
    engine.set_param(DUTY_STATION, job.station.code())?;
    engine.set_param(INCLUDE_FILES, "true")?;
    if let Some(path) = &job.save_as {
        engine.save_raw_archive(path);
    }

    let mut summary = FetchSummary::default();

    if job.data_only {
        for record in engine.data().await? {
            writeln!(out, "{}", serde_json::to_string(record)?)?;
            summary.iterated += 1;
        }
    } else {
        let importer = Importer::new(ImportOptions {
            output_dir: config.import.output_dir.clone(),
            language: job.language.clone(),
            overwrite: job.overwrite,
            skip_distribution_types: config.import.skip_distribution_types.clone(),
        })?;

        let files = engine
            .for_each_file(|stream, record| importer.import(stream, record))
            .await?;
        for result in files {
            summary.iterated += 1;
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    summary.failed += 1;
                    writeln!(out, "{}", json!({"error": e.to_string(), "data": {}}))?;
                    continue;
                }
            };
            match &outcome {
                ImportOutcome::Imported { .. } => summary.imported += 1,
                ImportOutcome::AlreadyPresent { .. } => summary.already_present += 1,
                ImportOutcome::Skipped(_) => summary.skipped += 1,
                ImportOutcome::Failed { .. } => summary.failed += 1,
            }
            if let Some(line) = outcome.report() {
                writeln!(out, "{line}")?;
            }
        }
    }

    if summary.iterated == 0 {
        let line = json!({
            "info": "No results",
            "data": {
                "station": job.station.code(),
                "date": job.date.map(|d| d.to_string()),
                "symbols": job.symbol,
                "language": job.language,
            }
        });
        writeln!(out, "{line}")?;
    }
    Ok(summary)
}
