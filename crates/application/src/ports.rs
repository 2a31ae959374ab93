use std::path::{Path, PathBuf};

use gallery_ingest_domain::{
    CaptureMetadata, CompressionAttempt, DecodedImage, ImageFormat, IngestionJob, JobStatus,
    PhotoId, PhotoRecord,
};

use crate::{ApplicationError, IngestionReport};

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Source of globally unique, time-ordered photo ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<PhotoId, ApplicationError>;
}

/// Reads capture metadata. A file without metadata yields an empty result;
/// only unreadable or corrupt files return an error.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<CaptureMetadata, ApplicationError>;
}

pub trait ImageDecoder: Send + Sync {
    fn read_header(&self, path: &Path) -> Result<DecodedImage, ApplicationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRequest {
    pub source: PathBuf,
    pub destination_dir: PathBuf,
    pub max_bytes: u64,
    pub output_format: ImageFormat,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    Written {
        destination: PathBuf,
        bytes: u64,
        attempt: CompressionAttempt,
    },
    /// Destination already present and overwrite was off.
    Skipped { destination: PathBuf },
}

impl CompressionOutcome {
    pub fn destination(&self) -> &Path {
        match self {
            Self::Written { destination, .. } | Self::Skipped { destination } => destination,
        }
    }

    pub fn was_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Re-encodes one image so that the written file fits `max_bytes`.
pub trait Compressor: Send + Sync {
    fn compress(&self, request: &CompressionRequest)
        -> Result<CompressionOutcome, ApplicationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied(PathBuf),
    Skipped(PathBuf),
}

/// File placement in staging and permanent storage.
pub trait ArtifactStore: Send + Sync {
    fn ensure_dir(&self, dir: &Path) -> Result<(), ApplicationError>;

    fn is_dir(&self, dir: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn copy_into(
        &self,
        source: &Path,
        dest_dir: &Path,
        overwrite: bool,
    ) -> Result<CopyOutcome, ApplicationError>;

    fn rename(&self, from: &Path, to: &Path) -> Result<(), ApplicationError>;

    /// Removing a file that is already gone is not an error.
    fn remove_file(&self, path: &Path) -> Result<(), ApplicationError>;

    fn remove_dir_all(&self, dir: &Path) -> Result<(), ApplicationError>;

    /// File names of supported images directly inside `dir`, sorted.
    fn list_images(&self, dir: &Path) -> Result<Vec<String>, ApplicationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(PhotoId),
    /// A record with the same file name existed; its id is kept.
    Updated(PhotoId),
}

pub trait PhotoRepository: Send + Sync {
    fn initialize(&self) -> Result<(), ApplicationError>;

    /// Upserts every record by file name in one transaction. On error none
    /// of them is stored.
    fn save_all(&self, records: &[PhotoRecord]) -> Result<Vec<SaveOutcome>, ApplicationError>;

    fn exists_by_file_name(&self, file_name: &str) -> Result<bool, ApplicationError>;

    fn count(&self) -> Result<u64, ApplicationError>;
}

/// Durable progress store keyed by message id. Plain upsert, last write wins.
pub trait JobStatusStore: Send + Sync {
    fn initialize(&self) -> Result<(), ApplicationError>;

    fn set(&self, status: &JobStatus) -> Result<(), ApplicationError>;

    fn get(&self, message_id: &str) -> Result<Option<JobStatus>, ApplicationError>;
}

/// Hands a job to the message channel and returns immediately. Delivery
/// acknowledgement is only ever logged.
pub trait JobPublisher: Send + Sync {
    fn publish(&self, job: &IngestionJob) -> Result<(), ApplicationError>;
}

/// Consumer-side entry point driven by the message channel.
pub trait JobHandler: Send + Sync {
    fn handle(&self, job: &IngestionJob) -> Result<IngestionReport, ApplicationError>;
}
