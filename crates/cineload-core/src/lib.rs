pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod record;
pub mod storage;
pub mod transform;

pub use config::EtlConfig;
pub use enrich::{
    Backoff, EnrichError, EnrichmentPayload, FetchCache, HttpTransport, OmdbClient, Transport,
    TransportError,
};
pub use error::{Error, Result};
pub use extract::{ExtractError, ExtractOutput, LinkRow, MovieRow, RatingRow};
pub use load::{FkViolation, Loader, UpsertPolicy};
pub use pipeline::{EtlPipeline, RunStats};
pub use record::{Genre, Movie, MovieDetail, MovieGenre, MovieRecord, Rating};
pub use storage::Storage;
pub use transform::TransformOutput;
