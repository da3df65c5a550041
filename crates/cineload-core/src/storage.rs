use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::{Error, Result};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    movie_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    year INTEGER,
    imdb_id TEXT
);

CREATE TABLE IF NOT EXISTS genres (
    genre_id INTEGER PRIMARY KEY AUTOINCREMENT,
    genre_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS movie_genres (
    movie_id INTEGER NOT NULL REFERENCES movies(movie_id),
    genre_id INTEGER NOT NULL REFERENCES genres(genre_id),
    PRIMARY KEY (movie_id, genre_id)
);

CREATE TABLE IF NOT EXISTS ratings (
    user_id INTEGER NOT NULL,
    movie_id INTEGER NOT NULL REFERENCES movies(movie_id),
    score REAL NOT NULL,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (user_id, movie_id, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_ratings_movie ON ratings(movie_id);

CREATE TABLE IF NOT EXISTS movie_details (
    movie_id INTEGER PRIMARY KEY REFERENCES movies(movie_id),
    director TEXT,
    plot TEXT,
    box_office TEXT,
    imdb_rating TEXT,
    runtime TEXT,
    actors TEXT,
    country TEXT,
    language TEXT,
    awards TEXT,
    raw_response TEXT NOT NULL
);
"#;

/// SQLite-backed store for the five normalized entities. Foreign keys
/// are enforced on every connection; the schema is created idempotently
/// on open.
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(Error::Io)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Remove an existing database file (the `--fresh` flow). A missing
    /// file is not an error.
    pub fn drop_database(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path).map_err(Error::Io)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let storage = Storage::open_memory().await.unwrap();

        sqlx::query(INIT_SQL).execute(storage.pool()).await.unwrap();

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('movies', 'genres', 'movie_genres', 'ratings', 'movie_details')")
                .fetch_one(storage.pool())
                .await
                .unwrap();
        assert_eq!(count.0, 5);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let storage = Storage::open_memory().await.unwrap();

        let result = sqlx::query("INSERT INTO movie_genres (movie_id, genre_id) VALUES (1, 1)")
            .execute(storage.pool())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_creates_file_and_drop_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("movies.db");

        {
            let _storage = Storage::open(&path).await.unwrap();
        }
        assert!(path.exists());

        Storage::drop_database(&path).unwrap();
        assert!(!path.exists());
        Storage::drop_database(&path).unwrap();
    }
}
