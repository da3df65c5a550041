use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::client::EnrichmentPayload;
use super::EnrichResult;

/// Durable id→payload cache backing the enrichment client. Loaded in
/// full at startup and rewritten in full after every mutation, so a
/// crash mid-run loses at most the in-flight request. Negative results
/// are stored as payloads whose outcome is "not found" and suppress
/// refetching just like positive ones.
#[derive(Debug)]
pub struct FetchCache {
    path: PathBuf,
    entries: HashMap<String, EnrichmentPayload>,
}

impl FetchCache {
    /// Load the cache from `path`. A missing or corrupt file starts an
    /// empty cache rather than failing the run.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cache file is corrupt; starting fresh");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    #[must_use]
    pub fn get(&self, imdb_id: &str) -> Option<&EnrichmentPayload> {
        self.entries.get(imdb_id)
    }

    #[must_use]
    pub fn contains(&self, imdb_id: &str) -> bool {
        self.entries.contains_key(imdb_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert an entry and persist the whole cache immediately.
    pub fn insert(&mut self, imdb_id: &str, payload: EnrichmentPayload) -> EnrichResult<()> {
        self.entries.insert(imdb_id.to_string(), payload);
        self.persist()
    }

    fn persist(&self) -> EnrichResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string(&self.entries)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_cache.json");

        let mut cache = FetchCache::load(&path);
        assert!(cache.is_empty());

        cache
            .insert("tt0114709", EnrichmentPayload::not_found("Movie not found!"))
            .unwrap();

        let reloaded = FetchCache::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("tt0114709").unwrap().is_not_found());
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_cache.json");
        fs::write(&path, "{not json").unwrap();

        let cache = FetchCache::load(&path);

        assert!(cache.is_empty());
    }

    #[test]
    fn test_persist_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("api_cache.json");

        let mut cache = FetchCache::load(&path);
        cache
            .insert("tt0000001", EnrichmentPayload::default())
            .unwrap();

        assert!(path.exists());
    }
}
