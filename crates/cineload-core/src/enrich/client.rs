use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use super::{Backoff, EnrichError, EnrichResult, FetchCache};
use crate::config::EtlConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const NEGATIVE_RESPONSE: &str = "False";

/// Metadata returned by the provider for one external id. Known fields
/// are typed; anything else the provider sends is kept in `extra` so
/// the serialized payload survives round-trips intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    #[serde(rename = "Response", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "Director", default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(rename = "Plot", default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(rename = "BoxOffice", default, skip_serializing_if = "Option::is_none")]
    pub box_office: Option<String>,
    #[serde(rename = "imdbRating", default, skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "Runtime", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(rename = "Actors", default, skip_serializing_if = "Option::is_none")]
    pub actors: Option<String>,
    #[serde(rename = "Country", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "Language", default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "Awards", default, skip_serializing_if = "Option::is_none")]
    pub awards: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnrichmentPayload {
    /// A structured negative from the provider ("Response": "False"),
    /// as opposed to a transport failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.response.as_deref() == Some(NEGATIVE_RESPONSE)
    }

    /// The minimal negative marker persisted to the cache.
    #[must_use]
    pub fn not_found(reason: &str) -> Self {
        Self {
            response: Some(NEGATIVE_RESPONSE.to_string()),
            error: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Seam between the client's caching/retry discipline and the actual
/// network call, so tests can inject a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_by_id(&self, imdb_id: &str) -> Result<EnrichmentPayload, TransportError>;
}

/// reqwest-backed transport hitting the OMDb "fetch by id" endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str) -> EnrichResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_by_id(&self, imdb_id: &str) -> Result<EnrichmentPayload, TransportError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("i", imdb_id), ("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// Enrichment client: persistent cache first, then the transport with
/// retry/backoff for transient failures and a fixed post-fetch delay
/// to respect the provider's rate limit.
pub struct OmdbClient {
    transport: Box<dyn Transport>,
    cache: FetchCache,
    rate_limit_delay: Duration,
    max_retries: u32,
    backoff_base: Duration,
    backoff_ceiling: Duration,
}

impl OmdbClient {
    pub fn new(config: &EtlConfig) -> EnrichResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(EnrichError::MissingApiKey)?;
        let transport = HttpTransport::new(&config.base_url, api_key)?;
        Ok(Self::with_transport(
            Box::new(transport),
            FetchCache::load(&config.cache_path),
            config.rate_limit_delay,
            config.max_retries,
        ))
    }

    #[must_use]
    pub fn with_transport(
        transport: Box<dyn Transport>,
        cache: FetchCache,
        rate_limit_delay: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            cache,
            rate_limit_delay,
            max_retries,
            backoff_base: Duration::from_millis(500),
            backoff_ceiling: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_backoff_schedule(mut self, base: Duration, ceiling: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetch metadata for one external id. Returns `None` for cached or
    /// fresh structured negatives and for ids whose transport attempts
    /// were exhausted; only the latter stay uncached for a future run.
    pub async fn fetch(&mut self, imdb_id: &str) -> EnrichResult<Option<EnrichmentPayload>> {
        if let Some(hit) = self.cache.get(imdb_id) {
            if hit.is_not_found() {
                return Ok(None);
            }
            return Ok(Some(hit.clone()));
        }

        let mut backoff =
            Backoff::with_schedule(self.backoff_base, self.backoff_ceiling, self.max_retries);

        loop {
            match self.transport.fetch_by_id(imdb_id).await {
                Ok(payload) if payload.is_not_found() => {
                    let reason = payload.error.as_deref().unwrap_or("unknown error");
                    info!(imdb_id, reason, "provider reported movie not found");
                    let marker = EnrichmentPayload::not_found(reason);
                    self.cache.insert(imdb_id, marker)?;
                    return Ok(None);
                }
                Ok(payload) => {
                    self.cache.insert(imdb_id, payload.clone())?;
                    tokio::time::sleep(self.rate_limit_delay).await;
                    return Ok(Some(payload));
                }
                Err(e) => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            imdb_id,
                            attempt = backoff.attempt(),
                            max = self.max_retries,
                            error = %e,
                            "enrichment request failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(
                            imdb_id,
                            attempts = backoff.attempt(),
                            error = %e,
                            "enrichment failed after all attempts"
                        );
                        return Ok(None);
                    }
                },
            }
        }
    }

    /// Fetch a batch of ids in order, up to `limit` non-empty ids.
    /// Empty ids are skipped without consuming a slot. The returned map
    /// contains only ids that resolved to a found payload.
    pub async fn fetch_bulk(
        &mut self,
        imdb_ids: &[String],
        limit: Option<usize>,
    ) -> EnrichResult<HashMap<String, EnrichmentPayload>> {
        let mut payloads = HashMap::new();
        let mut fetched = 0usize;

        for imdb_id in imdb_ids {
            if let Some(cap) = limit {
                if fetched >= cap {
                    break;
                }
            }
            if imdb_id.is_empty() {
                continue;
            }

            if let Some(payload) = self.fetch(imdb_id).await? {
                payloads.insert(imdb_id.clone(), payload);
            }
            fetched += 1;
        }

        Ok(payloads)
    }
}
