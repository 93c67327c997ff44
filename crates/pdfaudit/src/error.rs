use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfauditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failure reaching the external checking service for a document or page.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FetchError {
    /// Network failures, timeouts, rate limiting. Worth retrying.
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// Malformed requests, missing inputs. Retrying cannot help.
    #[error("Permanent fetch error: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Pipeline name registered twice: {0}")]
    DuplicateName(String),

    #[error("Pipeline not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Document-level report unavailable: {0}")]
    DocumentReport(FetchError),

    #[error("Invalid page range {start}-{end}")]
    InvalidPageRange { start: u32, end: u32 },

    #[error("Page range ends at {end} but the document has {pages} page(s)")]
    PageRangeBeyondDocument { end: u32, pages: u32 },

    #[error("Pipeline selection rejected: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to count pages of '{path}': {reason}")]
    PageCount { path: PathBuf, reason: String },

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persisting pass results failed: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, PdfauditError>;
