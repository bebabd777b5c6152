//! Fetch-and-reconcile engine: query → authenticated fetch → manifest →
//! per-entry match → caller callback.
//!
//! # Lifecycle
//! - Construct with [`Engine::new`] (real HTTP) or [`Engine::with_parts`].
//! - Configure filters with [`Engine::set_param`].
//! - The first accessor ([`Engine::data`], [`Engine::archive`],
//!   [`Engine::matches`], [`Engine::for_each_file`]) runs the fetch through
//!   [`Engine::ensure_fetched`]. Later accessors reuse the cached result.
//! - A failed fetch leaves nothing cached, so calling again retries cleanly.
//!
//! # Callback protocol
//! [`Engine::for_each_file`] yields the callback's result for every document
//! entry. The entry is readable while the callback runs and closed right after.

use std::io::{self, Read};
use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::archive::Archive;
use crate::auth::authenticator_for;
use crate::config::EngineConfig;
use crate::contract::{ArchiveFetcher, Authenticator, FetchRequest};
use crate::error::{GdocError, Result};
use crate::fetch::{http_client, HttpArchiveFetcher};
use crate::manifest::{self, MetadataRecord};
use crate::matcher::{FileMatch, Matcher, Warning};
use crate::query::{build_url, QueryParams};

pub const AUTHORIZATION: &str = "Authorization";
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Archive and manifest, always set together.
struct Fetched {
    archive: Archive,
    records: Vec<MetadataRecord>,
    reconciliation: Vec<Warning>,
}

pub struct Engine {
    config: EngineConfig,
    params: QueryParams,
    save_as: Option<PathBuf>,
    authenticator: Box<dyn Authenticator>,
    fetcher: Box<dyn ArchiveFetcher>,
    fetched: Option<Fetched>,
    iteration_warnings: Vec<Warning>,
}

impl Engine {
    /// Engine backed by the real token endpoint and HTTP transport.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let client = http_client(&config)?;
        let authenticator = authenticator_for(&config, client.clone())?;
        let fetcher = Box::new(HttpArchiveFetcher::new(client));
        Ok(Self::with_parts(config, authenticator, fetcher))
    }

    pub fn with_parts(
        config: EngineConfig,
        authenticator: Box<dyn Authenticator>,
        fetcher: Box<dyn ArchiveFetcher>,
    ) -> Self {
        Self {
            config,
            params: QueryParams::new(),
            save_as: None,
            authenticator,
            fetcher,
            fetched: None,
            iteration_warnings: Vec::new(),
        }
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Stores one filter value. Fails once the archive has been fetched.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if self.fetched.is_some() {
            return Err(GdocError::ParametersFrozen);
        }
        self.params.set(name, value);
        Ok(())
    }

    /// Keep a verbatim copy of the downloaded archive at `path`.
    pub fn save_raw_archive(&mut self, path: impl Into<PathBuf>) {
        self.save_as = Some(path.into());
    }

    pub fn url(&self) -> Result<String> {
        build_url(&self.config.api_url, &self.params)
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched.is_some()
    }

    /// Runs the fetch unless a previous one succeeded.
    pub async fn ensure_fetched(&mut self) -> Result<()> {
        self.load().await.map(|_| ())
    }

    /// Manifest records in manifest order.
    pub async fn data(&mut self) -> Result<&[MetadataRecord]> {
        let fetched = self.load().await?;
        Ok(&fetched.records)
    }

    pub async fn archive(&mut self) -> Result<&mut Archive> {
        let fetched = self.load().await?;
        Ok(&mut fetched.archive)
    }

    /// Every document entry paired with its record, or `None`.
    pub async fn matches(&mut self) -> Result<Vec<FileMatch<'_>>> {
        let (config, fetched, _) = self.split().await?;
        let matcher = Matcher::new(
            &fetched.records,
            &config.identifier_priority,
            &config.extensions,
        );
        let matches = matcher.iterate(fetched.archive.names()).collect();
        Ok(matches)
    }

    /// Warnings found so far: reconciliation findings from the fetch, then
    /// unmatched files from the latest [`Engine::for_each_file`] pass.
    pub fn warnings(&self) -> Vec<&Warning> {
        self.fetched
            .iter()
            .flat_map(|f| f.reconciliation.iter())
            .chain(self.iteration_warnings.iter())
            .collect()
    }

    /// Lazily invokes `callback` for every document entry and yields its
    /// results. Opening an entry can fail per item without ending the pass.
    pub async fn for_each_file<R, F>(&mut self, callback: F) -> Result<Files<'_, F>>
    where
        F: FnMut(&mut DocumentStream<'_>, Option<&MetadataRecord>) -> R,
    {
        let (config, fetched, iteration_warnings) = self.split().await?;
        let Fetched {
            archive, records, ..
        } = fetched;

        iteration_warnings.clear();
        let names = archive.names();
        let matcher = Matcher::new(records, &config.identifier_priority, &config.extensions);
        Ok(Files {
            archive,
            matcher,
            names: names.into_iter(),
            warnings: iteration_warnings,
            callback,
        })
    }

    async fn load(&mut self) -> Result<&mut Fetched> {
        let (_, fetched, _) = self.split().await?;
        Ok(fetched)
    }

    /// Loads the cache and hands out disjoint borrows of the engine state.
    async fn split(&mut self) -> Result<(&EngineConfig, &mut Fetched, &mut Vec<Warning>)> {
        let Self {
            config,
            params,
            save_as,
            authenticator,
            fetcher,
            fetched,
            iteration_warnings,
        } = self;
        let loaded = match fetched.take() {
            Some(loaded) => loaded,
            None => {
                fetch_archive(
                    config,
                    params,
                    save_as.clone(),
                    authenticator.as_ref(),
                    fetcher.as_ref(),
                )
                .await?
            }
        };
        Ok((&*config, fetched.insert(loaded), iteration_warnings))
    }
}

async fn fetch_archive(
    config: &EngineConfig,
    params: &QueryParams,
    save_as: Option<PathBuf>,
    authenticator: &dyn Authenticator,
    fetcher: &dyn ArchiveFetcher,
) -> Result<Fetched> {
    let url = build_url(&config.api_url, params)?;
    let credential = match authenticator.authenticate().await? {
        Some(stale) if stale.is_expired() => authenticator.refresh(&stale).await?,
        credential => credential,
    };

    let mut headers = Vec::new();
    match &credential {
        Some(credential) => headers.push((AUTHORIZATION.to_string(), credential.authorization())),
        None => debug!("No credential issued, data request goes out without Authorization"),
    }
    if let Some(key) = &config.subscription_key {
        headers.push((SUBSCRIPTION_KEY_HEADER.to_string(), key.expose().to_string()));
    }

    let request = FetchRequest {
        url,
        headers,
        save_as,
    };
    let mut archive = fetcher.fetch(&request).await?;
    let records = manifest::parse(&mut archive).map_err(|e| {
        error!(error = %e, url = %request.url, "Fetched archive is unusable");
        e
    })?;

    let matcher = Matcher::new(&records, &config.identifier_priority, &config.extensions);
    let reconciliation = matcher.missing_expected(&archive.names());
    for warning in &reconciliation {
        warning.emit();
    }
    info!(
        entries = archive.len(),
        records = records.len(),
        missing = reconciliation.len(),
        "Archive fetched and reconciled"
    );

    Ok(Fetched {
        archive,
        records,
        reconciliation,
    })
}

/// A document entry as seen by the callback.
pub struct DocumentStream<'a> {
    name: &'a str,
    reader: &'a mut dyn Read,
}

impl DocumentStream<'_> {
    /// Entry name inside the archive.
    pub fn name(&self) -> &str {
        self.name
    }
}

impl Read for DocumentStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Iterator returned by [`Engine::for_each_file`].
pub struct Files<'e, F> {
    archive: &'e mut Archive,
    matcher: Matcher<'e>,
    names: std::vec::IntoIter<String>,
    warnings: &'e mut Vec<Warning>,
    callback: F,
}

impl<R, F> Iterator for Files<'_, F>
where
    F: FnMut(&mut DocumentStream<'_>, Option<&MetadataRecord>) -> R,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let matcher = &self.matcher;
        let file = self.names.by_ref().find_map(|name| matcher.match_name(name))?;

        if let Some(warning) = file.warning() {
            warning.emit();
            self.warnings.push(warning);
        }

        let record = file.record;
        let name = file.name;
        let callback = &mut self.callback;
        let result = self.archive.open_entry(&name, |reader| {
            let mut stream = DocumentStream {
                name: &name,
                reader,
            };
            callback(&mut stream, record)
        });
        if let Err(e) = &result {
            error!(error = %e, file = %name, "Archive entry could not be opened");
        }
        Some(result)
    }
}
