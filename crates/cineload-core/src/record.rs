use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One movie row after the extractor has joined the links table and
/// derived the auxiliary fields. Title is still raw (year suffix intact).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieRecord {
    pub movie_id: i64,
    pub title: String,
    pub genres: String,
    pub year: Option<i64>,
    pub imdb_id: Option<String>,
}

/// A normalized movie ready for load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub imdb_id: Option<String>,
}

/// A genre as stored: ids are assigned by the store, names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// Movie/genre association, keyed by genre *name* until load time;
/// the loader resolves names to stored genre ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieGenre {
    pub movie_id: i64,
    pub genre_name: String,
}

/// A validated rating. `(user_id, movie_id, timestamp)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: i64,
    pub movie_id: i64,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Enrichment metadata for one movie (1:1, present only when the
/// external fetch succeeded). `raw_response` keeps the serialized
/// provider payload for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetail {
    pub movie_id: i64,
    pub director: Option<String>,
    pub plot: Option<String>,
    pub box_office: Option<String>,
    pub imdb_rating: Option<String>,
    pub runtime: Option<String>,
    pub actors: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub awards: Option<String>,
    pub raw_response: String,
}

impl MovieRecord {
    #[must_use]
    pub fn new(movie_id: i64, title: impl Into<String>, genres: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
            genres: genres.into(),
            year: None,
            imdb_id: None,
        }
    }

    #[must_use]
    pub fn with_year(mut self, year: Option<i64>) -> Self {
        self.year = year;
        self
    }

    #[must_use]
    pub fn with_imdb_id(mut self, imdb_id: Option<String>) -> Self {
        self.imdb_id = imdb_id;
        self
    }
}
