mod capture;
mod compression;
mod error;
mod image;
mod job;

pub use capture::{
    format_aperture, format_capture_time, format_shutter, CaptureField, CaptureMetadata,
    TagValue, CAPTURE_TIME_FORMAT, DEFAULT_CAPTURE_OFFSET_HOURS,
};
pub use compression::{
    CompressionAttempt, CompressionPhase, CompressionPlan, QUALITY_FLOOR, QUALITY_START,
    SCALE_FLOOR, SCALE_SEARCH_QUALITY,
};
pub use error::DomainError;
pub use image::{
    derived_file_name, detect_image_format, validate_file_name, DecodedImage, ImageFormat,
    PhotoId, PhotoRecord,
};
pub use job::{IngestionJob, JobMessage, JobPhase, JobStatus};
