use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::EtlConfig;
use crate::enrich::{EnrichmentPayload, OmdbClient};
use crate::extract;
use crate::load::Loader;
use crate::storage::Storage;
use crate::transform;
use crate::Result;

/// End-of-run summary counts.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub movies_processed: usize,
    pub movies_enriched: usize,
    pub genres_discovered: usize,
    pub movie_genres_loaded: u64,
    pub ratings_loaded: u64,
    pub details_loaded: u64,
    pub integrity_violations: usize,
    pub duration_ms: u64,
}

impl RunStats {
    #[must_use]
    pub fn movies_without_details(&self) -> usize {
        self.movies_processed.saturating_sub(self.movies_enriched)
    }
}

/// Sequences the run: extract, enrich, transform, load, verify.
/// Everything below batch granularity is handled by the components;
/// a fatal error anywhere aborts before the summary.
pub struct EtlPipeline {
    config: EtlConfig,
}

impl EtlPipeline {
    #[must_use]
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, storage: &Storage) -> Result<RunStats> {
        let start = Instant::now();
        info!("starting ETL run");

        let extracted = extract::extract(&self.config)?;

        let payloads = self.enrich(&extracted).await?;
        info!(count = payloads.len(), "fetched enrichment payloads");

        let output = transform::transform(&extracted.movies, &extracted.ratings, &payloads)
            .map_err(crate::Error::Serialization)?;

        let loader = Loader::new(storage, self.config.batch_size);
        loader.insert_movies(&output.movies).await?;
        loader.insert_genres(&output.genres).await?;
        let movie_genres_loaded = loader.insert_movie_genres(&output.movie_genres).await?;
        let ratings_loaded = loader.insert_ratings(&output.ratings).await?;
        let details_loaded = loader.insert_movie_details(&output.movie_details).await?;

        let violations = loader.verify_integrity().await?;

        let stats = RunStats {
            movies_processed: output.movies.len(),
            movies_enriched: output.movie_details.len(),
            genres_discovered: output.genres.len(),
            movie_genres_loaded,
            ratings_loaded,
            details_loaded,
            integrity_violations: violations.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(?stats, "ETL run complete");
        Ok(stats)
    }

    async fn enrich(
        &self,
        extracted: &extract::ExtractOutput,
    ) -> Result<HashMap<String, EnrichmentPayload>> {
        if self.config.skip_enrichment {
            info!("enrichment skipped by configuration");
            return Ok(HashMap::new());
        }
        if self.config.api_key.is_none() {
            warn!("OMDb API key missing; skipping enrichment");
            return Ok(HashMap::new());
        }

        let imdb_ids = distinct_imdb_ids(&extracted.movies);
        let mut client = OmdbClient::new(&self.config)?;
        let payloads = client
            .fetch_bulk(&imdb_ids, self.config.enrich_limit)
            .await?;
        Ok(payloads)
    }
}

/// Distinct non-empty imdb ids in first-seen order.
fn distinct_imdb_ids(movies: &[crate::record::MovieRecord]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    movies
        .iter()
        .filter_map(|m| m.imdb_id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MovieRecord;

    #[test]
    fn test_distinct_imdb_ids_preserve_order() {
        let movies = vec![
            MovieRecord::new(1, "A", "").with_imdb_id(Some("tt0000002".into())),
            MovieRecord::new(2, "B", "").with_imdb_id(None),
            MovieRecord::new(3, "C", "").with_imdb_id(Some("tt0000001".into())),
            MovieRecord::new(4, "D", "").with_imdb_id(Some("tt0000002".into())),
        ];

        assert_eq!(distinct_imdb_ids(&movies), vec!["tt0000002", "tt0000001"]);
    }

    #[test]
    fn test_stats_movies_without_details() {
        let stats = RunStats {
            movies_processed: 10,
            movies_enriched: 4,
            ..Default::default()
        };

        assert_eq!(stats.movies_without_details(), 6);
    }
}
