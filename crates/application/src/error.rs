use gallery_ingest_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error(
        "cannot compress {file} within budget (quality floor {quality_floor:.2}, scale floor {scale_floor:.1})"
    )]
    CompressionUnattainable {
        file: String,
        quality_floor: f32,
        scale_floor: f32,
    },
    #[error("metadata extraction failed for {file}: {reason}")]
    MetadataExtraction { file: String, reason: String },
    #[error("clock moved backwards by {drift_ms}ms, refusing to generate id")]
    ClockRollback { drift_ms: i64 },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("channel error: {0}")]
    Channel(String),
}
