//! Error taxonomy for the fetch-and-reconcile engine.
//!
//! Every variant here is fatal to the fetch that produced it. Reconciliation
//! problems that must not stop iteration live in [`crate::matcher::Warning`].

use thiserror::Error;

pub type Result<T, E = GdocError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GdocError {
    /// The token endpoint refused the grant or answered with an unusable body.
    #[error("authentication against {endpoint} failed: {reason}")]
    Authentication { endpoint: String, reason: String },

    /// The data request returned a non-success status.
    #[error("data request to {url} failed with HTTP {status}: {body}")]
    Transfer {
        url: String,
        status: u16,
        body: String,
    },

    /// Connection, TLS or body streaming failure.
    #[error("network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("archive has no {entry} entry")]
    ManifestMissing { entry: String },

    #[error("manifest {entry} could not be decoded: {source}")]
    ManifestFormat {
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    /// The downloaded body is not a readable zip container.
    #[error("archive is unreadable: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("query parameters cannot change once the archive has been fetched")]
    ParametersFrozen,

    #[error("unknown language tag {0:?}")]
    UnknownLanguage(String),
}

impl GdocError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn authentication(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authentication {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}
