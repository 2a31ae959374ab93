mod error;
mod pool;
mod ports;
mod service;
mod use_cases;

pub use error::ApplicationError;
pub use pool::WorkerPool;
pub use ports::{
    ArtifactStore, Clock, CompressionOutcome, CompressionRequest, Compressor, CopyOutcome,
    IdGenerator, ImageDecoder, JobHandler, JobPublisher, JobStatusStore, MetadataExtractor,
    PhotoRepository, SaveOutcome,
};
pub use service::{
    IngestionPorts, IngestionService, PipelineConfig, StorageLayout, MEDIUM_STAGING_DIR,
};
pub use use_cases::{
    BootstrapCatalogCommand, IngestionReport, JobStatusQuery, OrphanedArtifacts,
    ReconcileCommand, ReconcileReport, SubmitIngestionCommand,
};
