use anyhow::Result;
use clap::Parser;

use cineload_core::{EtlConfig, EtlPipeline, Storage};

/// Complete ETL pipeline for a MovieLens dataset with OMDb enrichment.
#[derive(Debug, Parser)]
#[command(name = "cineload", version, about)]
struct Cli {
    /// Run with a limited number of enrichment calls
    #[arg(long)]
    test: bool,
    /// Skip OMDb enrichment entirely
    #[arg(long)]
    skip_api: bool,
    /// Recreate the database from scratch
    #[arg(long)]
    fresh: bool,
    /// Enable DEBUG logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = EtlConfig::from_env();
    if cli.skip_api {
        config.skip_enrichment = true;
    }
    if cli.test {
        config.enrich_limit = Some(config.test_mode_limit);
    }

    if cli.fresh {
        Storage::drop_database(&config.database_path)?;
        tracing::info!("dropped existing database");
    }

    let storage = Storage::open(&config.database_path).await?;
    let stats = EtlPipeline::new(config).run(&storage).await?;

    println!("Total movies processed: {}", stats.movies_processed);
    println!("Movies with API data: {}", stats.movies_enriched);
    println!("Movies without API data: {}", stats.movies_without_details());
    println!("Total ratings loaded: {}", stats.ratings_loaded);
    println!("Total genres found: {}", stats.genres_discovered);
    println!("Execution time: {:.2}s", stats.duration_ms as f64 / 1000.0);

    Ok(())
}
