use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;
use tracing::{info, warn};

use crate::enrich::EnrichmentPayload;
use crate::extract::RatingRow;
use crate::record::{Movie, MovieDetail, MovieGenre, MovieRecord, Rating};

const NO_GENRES_SENTINEL: &str = "(no genres listed)";
const MIN_SCORE: f64 = 0.5;
const MAX_SCORE: f64 = 5.0;

#[derive(Debug, Default)]
pub struct TransformOutput {
    pub movies: Vec<Movie>,
    pub ratings: Vec<Rating>,
    pub genres: Vec<String>,
    pub movie_genres: Vec<MovieGenre>,
    pub movie_details: Vec<MovieDetail>,
}

fn year_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d{4}\)\s*$").expect("valid regex"))
}

fn whitespace_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("valid regex"))
}

/// Strip a trailing parenthesized four-digit year and collapse internal
/// whitespace runs to single spaces.
#[must_use]
pub fn clean_title(title: &str) -> String {
    let stripped = year_suffix_regex().replace(title, "");
    whitespace_run_regex()
        .replace_all(stripped.trim(), " ")
        .into_owned()
}

/// Split a pipe-delimited genre tag string. The "(no genres listed)"
/// sentinel (case-insensitive) and blank tags yield nothing.
#[must_use]
pub fn parse_genres(genres: &str) -> Vec<String> {
    if genres.trim().eq_ignore_ascii_case(NO_GENRES_SENTINEL) {
        return Vec::new();
    }
    genres
        .split('|')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

/// Dedupe `(user, movie, timestamp)` triples (first row wins), coerce
/// score and timestamp, and drop rows that fail coercion or fall
/// outside the valid score range.
#[must_use]
pub fn validate_ratings(rows: &[RatingRow]) -> Vec<Rating> {
    let mut seen: HashSet<(i64, i64, String)> = HashSet::with_capacity(rows.len());
    let mut valid = Vec::with_capacity(rows.len());

    for row in rows {
        let key = (row.user_id, row.movie_id, row.timestamp.trim().to_string());
        if !seen.insert(key) {
            continue;
        }

        let Ok(score) = row.score.trim().parse::<f64>() else {
            continue;
        };
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            continue;
        }

        let Some(seconds) = parse_epoch_seconds(&row.timestamp) else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(seconds, 0) else {
            continue;
        };

        valid.push(Rating {
            user_id: row.user_id,
            movie_id: row.movie_id,
            score,
            timestamp,
        });
    }

    info!(
        before = rows.len(),
        after = valid.len(),
        "cleaned ratings"
    );
    valid
}

fn parse_epoch_seconds(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Some(seconds);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value as i64),
        _ => None,
    }
}

/// Dedupe by movie id (first row wins) and normalize titles.
#[must_use]
pub fn clean_movies(records: &[MovieRecord]) -> Vec<Movie> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| seen.insert(r.movie_id))
        .map(|r| Movie {
            id: r.movie_id,
            title: clean_title(&r.title),
            year: r.year,
            imdb_id: r.imdb_id.clone(),
        })
        .collect()
}

/// The sorted set of distinct genre tags across all movies.
#[must_use]
pub fn genre_vocabulary(records: &[MovieRecord]) -> Vec<String> {
    let vocabulary: BTreeSet<String> = records
        .iter()
        .flat_map(|r| parse_genres(&r.genres))
        .collect();
    info!(count = vocabulary.len(), "discovered unique genres");
    vocabulary.into_iter().collect()
}

/// One association per (movie, genre) pair.
#[must_use]
pub fn movie_genre_pairs(records: &[MovieRecord]) -> Vec<MovieGenre> {
    records
        .iter()
        .flat_map(|r| {
            let movie_id = r.movie_id;
            parse_genres(&r.genres)
                .into_iter()
                .map(move |genre_name| MovieGenre {
                    movie_id,
                    genre_name,
                })
        })
        .collect()
}

/// Resolve each enrichment payload back to a movie id via the imdb-id
/// index and build detail records. Payloads whose fetch outcome was
/// "not found" are skipped. The serialized payload is retained verbatim.
pub fn build_details(
    movies: &[MovieRecord],
    payloads: &HashMap<String, EnrichmentPayload>,
) -> serde_json::Result<Vec<MovieDetail>> {
    let movie_by_imdb: HashMap<&str, i64> = movies
        .iter()
        .filter_map(|m| m.imdb_id.as_deref().map(|id| (id, m.movie_id)))
        .collect();

    let mut details = Vec::new();
    for (imdb_id, payload) in payloads {
        let Some(&movie_id) = movie_by_imdb.get(imdb_id.as_str()) else {
            continue;
        };
        if payload.is_not_found() {
            continue;
        }

        details.push(MovieDetail {
            movie_id,
            director: payload.director.clone(),
            plot: payload.plot.clone(),
            box_office: payload.box_office.clone(),
            imdb_rating: payload.imdb_rating.clone(),
            runtime: payload.runtime.clone(),
            actors: payload.actors.clone(),
            country: payload.country.clone(),
            language: payload.language.clone(),
            awards: payload.awards.clone(),
            raw_response: serde_json::to_string(payload)?,
        });
    }

    details.sort_by_key(|d| d.movie_id);
    info!(count = details.len(), "prepared movie details from enrichment payloads");
    Ok(details)
}

/// Run the whole pure transformation stage over the extractor output
/// and the fetched enrichment payloads.
pub fn transform(
    records: &[MovieRecord],
    ratings: &[RatingRow],
    payloads: &HashMap<String, EnrichmentPayload>,
) -> serde_json::Result<TransformOutput> {
    let movies = clean_movies(records);
    let ratings = validate_ratings(ratings);
    let genres = genre_vocabulary(records);
    let movie_genres = movie_genre_pairs(records);
    let movie_details = build_details(records, payloads)?;

    if genres.is_empty() {
        warn!("no genres parsed from dataset");
    }
    if movie_details.is_empty() {
        warn!("no enriched movies available");
    }

    Ok(TransformOutput {
        movies,
        ratings,
        genres,
        movie_genres,
        movie_details,
    })
}
