mod backoff;
mod cache;
mod client;

pub use backoff::Backoff;
pub use cache::FetchCache;
pub use client::{EnrichmentPayload, HttpTransport, OmdbClient, Transport, TransportError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("OMDb API key is required")]
    MissingApiKey,
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EnrichResult<T> = Result<T, EnrichError>;
