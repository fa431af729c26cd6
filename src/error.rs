//! Error types shared across the fetch, storage, and inlining layers.

use thiserror::Error;

/// Errors surfaced by the request queue and media fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request queue dropped the request before completion")]
    QueueClosed,
}

impl FetchError {
    /// The HTTP status code carried by this error, if any.
    ///
    /// Transport-level failures have no status and are never retried.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the storage adapter layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("stored file {0} landed outside the storage root")]
    OutsideRoot(String),
}

/// Envelope for per-resource inlining failures.
///
/// One resource failing never aborts the job; the orchestrator logs this
/// envelope with the resource id and moves on.
#[derive(Debug, Error)]
#[error("media inlining failed for {resource}: {source}")]
pub struct InlineError {
    pub resource: String,
    #[source]
    pub source: anyhow::Error,
}

impl InlineError {
    pub fn new(resource: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            resource: resource.into(),
            source,
        }
    }
}
