use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::EtlConfig;
use crate::record::MovieRecord;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("movies/links join is not one-to-one: movie id {movie_id} appears more than once")]
    JoinCardinality { movie_id: i64 },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Raw movies.csv row.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieRow {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub title: String,
    pub genres: String,
}

/// Raw ratings.csv row. Score and timestamp stay as raw strings here;
/// coercion (and dropping rows that fail it) is the transformer's job.
#[derive(Debug, Clone, Deserialize)]
pub struct RatingRow {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    #[serde(rename = "rating")]
    pub score: String,
    pub timestamp: String,
}

/// Raw links.csv row. The tmdb column is unused and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRow {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    #[serde(rename = "imdbId")]
    pub imdb_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct ExtractOutput {
    pub movies: Vec<MovieRecord>,
    pub ratings: Vec<RatingRow>,
}

/// Read one CSV table. A missing file yields an empty table rather
/// than aborting the run; rows that fail deserialization are dropped.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> ExtractResult<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "CSV file not found; treating as empty");
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed CSV row"),
        }
    }
    Ok(rows)
}

/// Read the three source tables, join movies×links one-to-one on the
/// movie id, and derive year and normalized imdb id per movie.
pub fn extract(config: &EtlConfig) -> ExtractResult<ExtractOutput> {
    let movies: Vec<MovieRow> = read_rows(&config.movies_csv())?;
    let ratings: Vec<RatingRow> = read_rows(&config.ratings_csv())?;
    let links: Vec<LinkRow> = read_rows(&config.links_csv())?;

    if movies.is_empty() || links.is_empty() {
        warn!(
            movies = movies.len(),
            links = links.len(),
            "movie or link data missing"
        );
    }

    let movies = join_links(movies, &links)?;

    let missing_years = movies.iter().filter(|m| m.year.is_none()).count();
    if missing_years > 0 {
        debug!(count = missing_years, "movies missing parsed year");
    }
    let missing_imdb = movies.iter().filter(|m| m.imdb_id.is_none()).count();
    if missing_imdb > 0 {
        debug!(count = missing_imdb, "movies missing imdb id after formatting");
    }

    Ok(ExtractOutput { movies, ratings })
}

/// Left join of movies onto links. Duplicate movie ids on either side
/// break the one-to-one contract and fail the extraction.
fn join_links(movies: Vec<MovieRow>, links: &[LinkRow]) -> ExtractResult<Vec<MovieRecord>> {
    let mut imdb_by_movie: HashMap<i64, Option<String>> = HashMap::with_capacity(links.len());
    for link in links {
        if imdb_by_movie
            .insert(link.movie_id, link.imdb_id.clone())
            .is_some()
        {
            return Err(ExtractError::JoinCardinality {
                movie_id: link.movie_id,
            });
        }
    }

    let mut seen = HashSet::with_capacity(movies.len());
    let mut joined = Vec::with_capacity(movies.len());
    for row in movies {
        if !seen.insert(row.movie_id) {
            return Err(ExtractError::JoinCardinality {
                movie_id: row.movie_id,
            });
        }

        let imdb_id = imdb_by_movie
            .get(&row.movie_id)
            .and_then(Clone::clone)
            .as_deref()
            .and_then(format_imdb_id);

        let year = extract_year(&row.title);
        joined.push(
            MovieRecord::new(row.movie_id, row.title, row.genres)
                .with_year(year)
                .with_imdb_id(imdb_id),
        );
    }

    Ok(joined)
}

fn year_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d{4})\)\s*$").expect("valid regex"))
}

/// Parse a trailing parenthesized four-digit year: `"Heat (1995)"` → 1995.
#[must_use]
pub fn extract_year(title: &str) -> Option<i64> {
    year_suffix_regex()
        .captures(title.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Normalize a raw imdb id to the `tt`-prefixed, zero-padded form.
/// Missing, empty, or malformed values normalize to `None`, never to a
/// placeholder.
#[must_use]
pub fn format_imdb_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("tt{trimmed:0>7}"));
    }

    // Some exports carry the id as a float ("114709.0").
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
            Some(format!("tt{:07}", value as u64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extract_year_from_suffix() {
        assert_eq!(extract_year("Toy Story (1995)"), Some(1995));
        assert_eq!(extract_year("Heat (1995)  "), Some(1995));
        assert_eq!(extract_year("Fargo (1996) (1997)"), Some(1997));
    }

    #[test]
    fn test_extract_year_absent() {
        assert_eq!(extract_year("Toy Story"), None);
        assert_eq!(extract_year("(1995) Toy Story"), None);
        assert_eq!(extract_year("Toy Story (199)"), None);
    }

    #[test]
    fn test_format_imdb_id_pads_and_prefixes() {
        assert_eq!(format_imdb_id("114709").as_deref(), Some("tt0114709"));
        assert_eq!(format_imdb_id("0114709").as_deref(), Some("tt0114709"));
        assert_eq!(format_imdb_id("12345678").as_deref(), Some("tt12345678"));
    }

    #[test]
    fn test_format_imdb_id_float_export() {
        assert_eq!(format_imdb_id("114709.0").as_deref(), Some("tt0114709"));
    }

    #[test]
    fn test_format_imdb_id_malformed_is_absent() {
        assert_eq!(format_imdb_id(""), None);
        assert_eq!(format_imdb_id("   "), None);
        assert_eq!(format_imdb_id("abc"), None);
        assert_eq!(format_imdb_id("12.5"), None);
    }

    #[test]
    fn test_join_derives_fields() {
        let movies = vec![MovieRow {
            movie_id: 1,
            title: "Toy Story (1995)".into(),
            genres: "Adventure|Animation|Children".into(),
        }];
        let links = vec![LinkRow {
            movie_id: 1,
            imdb_id: Some("114709".into()),
        }];

        let joined = join_links(movies, &links).unwrap();

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].year, Some(1995));
        assert_eq!(joined[0].imdb_id.as_deref(), Some("tt0114709"));
    }

    #[test]
    fn test_join_without_link_row() {
        let movies = vec![MovieRow {
            movie_id: 7,
            title: "Untracked".into(),
            genres: String::new(),
        }];

        let joined = join_links(movies, &[]).unwrap();

        assert_eq!(joined[0].imdb_id, None);
    }

    #[test]
    fn test_join_rejects_duplicate_link_key() {
        let movies = vec![MovieRow {
            movie_id: 1,
            title: "A".into(),
            genres: String::new(),
        }];
        let links = vec![
            LinkRow {
                movie_id: 1,
                imdb_id: Some("1".into()),
            },
            LinkRow {
                movie_id: 1,
                imdb_id: Some("2".into()),
            },
        ];

        let result = join_links(movies, &links);

        assert!(matches!(
            result,
            Err(ExtractError::JoinCardinality { movie_id: 1 })
        ));
    }

    #[test]
    fn test_join_rejects_duplicate_movie_key() {
        let movies = vec![
            MovieRow {
                movie_id: 2,
                title: "A".into(),
                genres: String::new(),
            },
            MovieRow {
                movie_id: 2,
                title: "B".into(),
                genres: String::new(),
            },
        ];

        let result = join_links(movies, &[]);

        assert!(matches!(
            result,
            Err(ExtractError::JoinCardinality { movie_id: 2 })
        ));
    }

    #[test]
    fn test_read_rows_missing_file_is_empty() {
        let rows: Vec<MovieRow> =
            read_rows(Path::new("/nonexistent/movies.csv")).unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn test_extract_from_csv_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("movies.csv"),
            "movieId,title,genres\n1,Toy Story (1995),Adventure|Animation|Children\n2,Heat (1995),Action|Crime\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("ratings.csv"),
            "userId,movieId,rating,timestamp\n1,1,4.0,964982703\n1,2,4.5,964982931\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("links.csv"),
            "movieId,imdbId,tmdbId\n1,0114709,862\n2,0113277,949\n",
        )
        .unwrap();

        let config = EtlConfig::default().with_data_dir(dir.path());
        let output = extract(&config).unwrap();

        assert_eq!(output.movies.len(), 2);
        assert_eq!(output.ratings.len(), 2);
        assert_eq!(output.movies[0].imdb_id.as_deref(), Some("tt0114709"));
        assert_eq!(output.movies[1].year, Some(1995));
    }
}
