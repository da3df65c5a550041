use std::path::PathBuf;
use std::time::Duration;

/// Run-level configuration for the pipeline. Values come from the
/// environment (see [`EtlConfig::from_env`]) with sensible defaults
/// for a local single-run setup.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// OMDb API key; enrichment is skipped entirely when absent.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Fixed delay applied after each successful network fetch.
    pub rate_limit_delay: Duration,
    /// Maximum transport attempts per external id.
    pub max_retries: u32,
    /// Rows per load transaction.
    pub batch_size: usize,
    /// Cap on enrichment calls; `None` fetches every id.
    pub enrich_limit: Option<usize>,
    /// Cap applied when the run is started in test mode.
    pub test_mode_limit: usize,
    /// Skip the enrichment stage even when an API key is present.
    pub skip_enrichment: bool,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub cache_path: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "http://www.omdbapi.com/".to_string(),
            rate_limit_delay: Duration::from_millis(250),
            max_retries: 3,
            batch_size: 1000,
            enrich_limit: None,
            test_mode_limit: 100,
            skip_enrichment: false,
            data_dir: PathBuf::from("data/ml-latest-small"),
            database_path: PathBuf::from("database/movies.db"),
            cache_path: PathBuf::from("logs/api_cache.json"),
        }
    }
}

impl EtlConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("OMDB_API_KEY") {
            if !v.trim().is_empty() {
                cfg.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("OMDB_BASE_URL") {
            cfg.base_url = v;
        }
        if let Ok(v) = std::env::var("API_RATE_LIMIT_DELAY") {
            if let Ok(secs) = v.parse::<f64>() {
                cfg.rate_limit_delay = Duration::from_secs_f64(secs.max(0.0));
            }
        }
        if let Ok(v) = std::env::var("API_MAX_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.max_retries = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("BATCH_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.batch_size = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("TEST_MODE_LIMIT") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.test_mode_limit = n;
            }
        }
        if let Ok(v) = std::env::var("DATA_DIR") {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DATABASE_PATH") {
            cfg.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("API_CACHE_FILE") {
            cfg.cache_path = PathBuf::from(v);
        }
        cfg
    }

    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    #[must_use]
    pub fn movies_csv(&self) -> PathBuf {
        self.data_dir.join("movies.csv")
    }

    #[must_use]
    pub fn ratings_csv(&self) -> PathBuf {
        self.data_dir.join("ratings.csv")
    }

    #[must_use]
    pub fn links_csv(&self) -> PathBuf {
        self.data_dir.join("links.csv")
    }
}
