use std::collections::HashMap;

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::record::{Genre, Movie, MovieDetail, MovieGenre, Rating};
use crate::storage::Storage;
use crate::Result;

/// Conflict policy for a load: repeated runs either keep the existing
/// row or overwrite it wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertPolicy {
    IgnoreOnConflict,
    ReplaceOnConflict,
}

impl UpsertPolicy {
    #[must_use]
    pub fn sql_verb(self) -> &'static str {
        match self {
            Self::IgnoreOnConflict => "INSERT OR IGNORE",
            Self::ReplaceOnConflict => "INSERT OR REPLACE",
        }
    }
}

/// Binds one row's values onto a prepared insert statement.
pub trait BindRow {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>>;
}

impl BindRow for Movie {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.id)
            .bind(self.title.as_str())
            .bind(self.year)
            .bind(self.imdb_id.as_deref())
    }
}

impl BindRow for String {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(self.as_str())
    }
}

impl BindRow for (i64, i64) {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(self.0).bind(self.1)
    }
}

impl BindRow for Rating {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.user_id)
            .bind(self.movie_id)
            .bind(self.score)
            .bind(self.timestamp.timestamp())
    }
}

impl BindRow for MovieDetail {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.movie_id)
            .bind(self.director.as_deref())
            .bind(self.plot.as_deref())
            .bind(self.box_office.as_deref())
            .bind(self.imdb_rating.as_deref())
            .bind(self.runtime.as_deref())
            .bind(self.actors.as_deref())
            .bind(self.country.as_deref())
            .bind(self.language.as_deref())
            .bind(self.awards.as_deref())
            .bind(self.raw_response.as_str())
    }
}

/// A row flagged by the post-load referential integrity audit.
#[derive(Debug, Clone)]
pub struct FkViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
}

/// Writes normalized record sets in fixed-size transactional batches.
/// Each batch commits or rolls back as a unit; a failed batch aborts
/// the load with none of its rows present.
pub struct Loader<'a> {
    pool: &'a Pool<Sqlite>,
    batch_size: usize,
}

impl<'a> Loader<'a> {
    #[must_use]
    pub fn new(storage: &'a Storage, batch_size: usize) -> Self {
        Self {
            pool: storage.pool(),
            batch_size: batch_size.max(1),
        }
    }

    async fn insert_batched<R: BindRow>(&self, sql: &str, rows: &[R]) -> Result<u64> {
        let mut inserted = 0u64;
        for chunk in rows.chunks(self.batch_size) {
            let mut tx = self.pool.begin().await?;
            for row in chunk {
                let result = row.bind(sqlx::query(sql)).execute(&mut *tx).await?;
                inserted += result.rows_affected();
            }
            tx.commit().await?;
        }
        Ok(inserted)
    }

    pub async fn insert_movies(&self, movies: &[Movie]) -> Result<u64> {
        let sql = format!(
            "{} INTO movies (movie_id, title, year, imdb_id) VALUES (?, ?, ?, ?)",
            UpsertPolicy::IgnoreOnConflict.sql_verb()
        );
        let inserted = self.insert_batched(&sql, movies).await?;
        info!(inserted, "inserted movie rows");
        Ok(inserted)
    }

    pub async fn insert_genres(&self, genres: &[String]) -> Result<u64> {
        let sql = format!(
            "{} INTO genres (genre_name) VALUES (?)",
            UpsertPolicy::IgnoreOnConflict.sql_verb()
        );
        let inserted = self.insert_batched(&sql, genres).await?;
        info!(inserted, "inserted genre rows");
        Ok(inserted)
    }

    /// Resolve genre names to stored ids, then insert the associations.
    /// Pairs whose genre name has no stored id are dropped; that only
    /// happens if genre insertion did not precede this call.
    pub async fn insert_movie_genres(&self, movie_genres: &[MovieGenre]) -> Result<u64> {
        let genre_ids = self.genre_id_map().await?;

        let mut rows: Vec<(i64, i64)> = Vec::with_capacity(movie_genres.len());
        let mut dropped = 0usize;
        for pair in movie_genres {
            match genre_ids.get(&pair.genre_name) {
                Some(&genre_id) => rows.push((pair.movie_id, genre_id)),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, "movie/genre pairs with unknown genre names");
        }

        let sql = format!(
            "{} INTO movie_genres (movie_id, genre_id) VALUES (?, ?)",
            UpsertPolicy::IgnoreOnConflict.sql_verb()
        );
        let inserted = self.insert_batched(&sql, &rows).await?;
        info!(inserted, "inserted movie_genre rows");
        Ok(inserted)
    }

    pub async fn insert_ratings(&self, ratings: &[Rating]) -> Result<u64> {
        let sql = format!(
            "{} INTO ratings (user_id, movie_id, score, timestamp) VALUES (?, ?, ?, ?)",
            UpsertPolicy::IgnoreOnConflict.sql_verb()
        );
        let inserted = self.insert_batched(&sql, ratings).await?;
        info!(inserted, "inserted rating rows");
        Ok(inserted)
    }

    /// Details replace on conflict: re-running enrichment overwrites the
    /// existing row wholesale.
    pub async fn insert_movie_details(&self, details: &[MovieDetail]) -> Result<u64> {
        let sql = format!(
            "{} INTO movie_details (movie_id, director, plot, box_office, imdb_rating, \
             runtime, actors, country, language, awards, raw_response) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            UpsertPolicy::ReplaceOnConflict.sql_verb()
        );
        let inserted = self.insert_batched(&sql, details).await?;
        info!(inserted, "inserted movie detail rows");
        Ok(inserted)
    }

    /// Genres currently in the store, ordered by name.
    pub async fn genres(&self) -> Result<Vec<Genre>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT genre_id, genre_name FROM genres ORDER BY genre_name")
                .fetch_all(self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Genre { id, name })
            .collect())
    }

    async fn genre_id_map(&self) -> Result<HashMap<String, i64>> {
        let genres = self.genres().await?;
        Ok(genres.into_iter().map(|g| (g.name, g.id)).collect())
    }

    /// Post-load audit: scan for rows violating declared foreign keys.
    /// Violations are reported, not repaired; enforcement already
    /// happened at write time.
    pub async fn verify_integrity(&self) -> Result<Vec<FkViolation>> {
        let rows: Vec<(String, Option<i64>, String, i64)> =
            sqlx::query_as("PRAGMA foreign_key_check")
                .fetch_all(self.pool)
                .await?;

        let violations: Vec<FkViolation> = rows
            .into_iter()
            .map(|(table, rowid, parent, _fk_index)| FkViolation {
                table,
                rowid,
                parent,
            })
            .collect();

        if !violations.is_empty() {
            warn!(count = violations.len(), "foreign key violations detected");
        }
        Ok(violations)
    }
}
