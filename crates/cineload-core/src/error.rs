use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Extraction error: {0}")]
    Extract(#[from] crate::extract::ExtractError),

    #[error("Enrichment error: {0}")]
    Enrich(#[from] crate::enrich::EnrichError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
