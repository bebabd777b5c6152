//! HTTP implementation of [`ArchiveFetcher`].

use std::fs::File;
use std::io::{BufWriter, Write};

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{error, info};

use crate::archive::Archive;
use crate::config::EngineConfig;
use crate::contract::{ArchiveFetcher, FetchRequest};
use crate::error::{GdocError, Result};

/// Write buffer size used while spooling the response body.
pub const CHUNK_SIZE: usize = 8192;

/// Builds the shared HTTP client with the configured timeout.
pub fn http_client(config: &EngineConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| GdocError::Config(format!("HTTP client could not be built: {e}")))
}

pub struct HttpArchiveFetcher {
    client: reqwest::Client,
}

impl HttpArchiveFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Archive> {
        let url = &request.url;
        let mut builder = self.client.get(url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        info!(url = %url, "Requesting export archive");
        let response = builder.send().await.map_err(|e| {
            error!(error = ?e, url = %url, "Data request could not be sent");
            GdocError::network(url.as_str(), e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            error!(status = %status, url = %url, "Export API returned error. Response body: {body}");
            return Err(GdocError::Transfer {
                url: url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let spool = tempfile::tempfile().map_err(|e| GdocError::io("creating archive spool", e))?;
        let (spool, received) = stream_to_spool(spool, response, url).await?;
        info!(url = %url, bytes = received, "Export archive received");

        Archive::from_spool(spool, request.save_as.as_deref())
    }
}

/// Streams the body into `spool` without knowing its size up front.
async fn stream_to_spool(
    spool: File,
    response: reqwest::Response,
    url: &str,
) -> Result<(File, u64)> {
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, spool);
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GdocError::network(url, e))?;
        writer
            .write_all(&chunk)
            .map_err(|e| GdocError::io("writing archive spool", e))?;
        received += chunk.len() as u64;
    }

    let spool = writer
        .into_inner()
        .map_err(|e| GdocError::io("flushing archive spool", e.into_error()))?;
    Ok((spool, received))
}
