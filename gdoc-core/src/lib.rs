#![doc = "gdoc-core: fetch-and-reconcile engine for the gDoc document export API."]

//! This crate authenticates against the export API, downloads the export
//! archive and pairs every document file in it with its manifest record.
//! Ingestion of the documents is left to the caller through
//! [`engine::Engine::for_each_file`].
//!
//! # Usage
//! Build an [`EngineConfig`], set filters on an [`Engine`], then iterate.

pub mod archive;
pub mod auth;
pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod filename;
pub mod manifest;
pub mod matcher;
pub mod query;

pub use archive::Archive;
pub use config::{AuthConfig, EngineConfig, Secret};
pub use engine::{DocumentStream, Engine};
pub use error::{GdocError, Result};
pub use manifest::MetadataRecord;
pub use matcher::{IdentifierPriority, Warning};
