use std::collections::HashMap;
use std::fs;

use cineload_core::{
    extract, load::Loader, transform, EnrichmentPayload, EtlConfig, EtlPipeline, Movie, Storage,
};

fn write_fixture_dataset(dir: &std::path::Path) {
    fs::write(
        dir.join("movies.csv"),
        "movieId,title,genres\n\
         1,Toy Story (1995),Adventure|Animation|Children\n\
         2,Heat (1995),Action|Crime|Thriller\n\
         3,Untitled Short,(no genres listed)\n",
    )
    .unwrap();
    fs::write(
        dir.join("ratings.csv"),
        "userId,movieId,rating,timestamp\n\
         1,1,6.0,964982703\n\
         1,1,4.5,964982800\n\
         1,1,4.5,964982800\n\
         2,2,3.0,964983000\n\
         2,2,bad,964983001\n",
    )
    .unwrap();
    fs::write(
        dir.join("links.csv"),
        "movieId,imdbId,tmdbId\n\
         1,0114709,862\n\
         2,0113277,949\n\
         3,,\n",
    )
    .unwrap();
}

#[tokio::test]
async fn full_run_without_enrichment_loads_normalized_records() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture_dataset(dir.path());

    let config = EtlConfig {
        skip_enrichment: true,
        batch_size: 2,
        ..EtlConfig::default().with_data_dir(dir.path())
    };

    let storage = Storage::open_memory().await.unwrap();
    let stats = EtlPipeline::new(config).run(&storage).await.unwrap();

    assert_eq!(stats.movies_processed, 3);
    assert_eq!(stats.movies_enriched, 0);
    // 6.0 out of range, one duplicate collapsed, one unparseable score.
    assert_eq!(stats.ratings_loaded, 2);
    assert_eq!(stats.genres_discovered, 6);
    assert_eq!(stats.movie_genres_loaded, 6);
    assert_eq!(stats.integrity_violations, 0);

    let movie: (String, Option<i64>, Option<String>) =
        sqlx::query_as("SELECT title, year, imdb_id FROM movies WHERE movie_id = 1")
            .fetch_one(storage.pool())
            .await
            .unwrap();
    assert_eq!(movie.0, "Toy Story");
    assert_eq!(movie.1, Some(1995));
    assert_eq!(movie.2.as_deref(), Some("tt0114709"));
}

#[tokio::test]
async fn rerun_against_same_store_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture_dataset(dir.path());

    let config = EtlConfig {
        skip_enrichment: true,
        ..EtlConfig::default().with_data_dir(dir.path())
    };
    let storage = Storage::open_memory().await.unwrap();
    let pipeline = EtlPipeline::new(config);

    pipeline.run(&storage).await.unwrap();
    let second = pipeline.run(&storage).await.unwrap();

    assert_eq!(second.ratings_loaded, 0);
    assert_eq!(second.movie_genres_loaded, 0);

    let movies: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
        .fetch_one(storage.pool())
        .await
        .unwrap();
    assert_eq!(movies.0, 3);
    let ratings: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ratings")
        .fetch_one(storage.pool())
        .await
        .unwrap();
    assert_eq!(ratings.0, 2);
}

#[tokio::test]
async fn enrichment_payloads_become_detail_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture_dataset(dir.path());

    let config = EtlConfig::default().with_data_dir(dir.path());
    let extracted = extract::extract(&config).unwrap();

    let mut payloads = HashMap::new();
    payloads.insert(
        "tt0114709".to_string(),
        EnrichmentPayload {
            response: Some("True".into()),
            director: Some("John Lasseter".into()),
            runtime: Some("81 min".into()),
            ..Default::default()
        },
    );
    // A structured negative must not produce a detail row.
    payloads.insert(
        "tt0113277".to_string(),
        EnrichmentPayload::not_found("Movie not found!"),
    );

    let output = transform::transform(&extracted.movies, &extracted.ratings, &payloads).unwrap();
    assert_eq!(output.movie_details.len(), 1);

    let storage = Storage::open_memory().await.unwrap();
    let loader = Loader::new(&storage, 100);
    loader.insert_movies(&output.movies).await.unwrap();
    loader
        .insert_movie_details(&output.movie_details)
        .await
        .unwrap();

    let row: (i64, String, String) = sqlx::query_as(
        "SELECT movie_id, director, raw_response FROM movie_details WHERE movie_id = 1",
    )
    .fetch_one(storage.pool())
    .await
    .unwrap();
    assert_eq!(row.0, 1);
    assert_eq!(row.1, "John Lasseter");
    assert!(row.2.contains("81 min"));

    let violations = loader.verify_integrity().await.unwrap();
    assert!(violations.is_empty());
}

#[tokio::test]
async fn missing_source_files_still_complete_the_run() {
    let dir = tempfile::tempdir().unwrap();
    // No CSVs written at all.
    let config = EtlConfig {
        skip_enrichment: true,
        ..EtlConfig::default().with_data_dir(dir.path())
    };

    let storage = Storage::open_memory().await.unwrap();
    let stats = EtlPipeline::new(config).run(&storage).await.unwrap();

    assert_eq!(stats.movies_processed, 0);
    assert_eq!(stats.ratings_loaded, 0);
    assert_eq!(stats.genres_discovered, 0);
}

#[test]
fn normalized_movie_matches_expected_shape() {
    let expected = Movie {
        id: 1,
        title: "Toy Story".into(),
        year: Some(1995),
        imdb_id: Some("tt0114709".into()),
    };

    let cleaned = transform::clean_movies(&[cineload_core::MovieRecord::new(
        1,
        "Toy Story (1995)",
        "Adventure|Animation|Children",
    )
    .with_year(Some(1995))
    .with_imdb_id(Some("tt0114709".into()))]);

    assert_eq!(cleaned, vec![expected]);
}
