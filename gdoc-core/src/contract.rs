//! # contract: seams between the engine and the network
//!
//! The engine talks to the outside world through two traits:
//! - [`Authenticator`] produces the bearer credential for the data request.
//! - [`ArchiveFetcher`] performs the data request and hands back a fully
//!   received [`Archive`].
//!
//! Both are async and object safe so an engine can hold them boxed. The real
//! implementations live in [`crate::auth`] and [`crate::fetch`].
//!
//! ## Mocking & Testing
//! - Both traits carry `mockall` annotations behind the `test-export-mocks`
//!   feature, so integration tests can count how often the network is hit.

use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;

use crate::archive::Archive;
use crate::auth::Credential;
use crate::error::GdocError;

/// Strategy for acquiring the bearer credential.
///
/// `Ok(None)` means the data request goes out without an `Authorization`
/// header (test mode).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<Option<Credential>, GdocError>;

    /// Replaces a credential that expired before use. Re-authenticates by default.
    async fn refresh(&self, stale: &Credential) -> Result<Option<Credential>, GdocError> {
        tracing::info!(endpoint = %stale.endpoint, "Refreshing expired credential");
        self.authenticate().await
    }
}

/// One outbound data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Where to keep a verbatim copy of the raw body, if anywhere.
    pub save_as: Option<PathBuf>,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Performs the request and returns the archive once the body is complete.
    async fn fetch(&self, request: &FetchRequest) -> Result<Archive, GdocError>;
}
