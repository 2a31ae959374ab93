pub mod channel;
pub mod compress;
pub mod fs;
pub mod metadata;
pub mod migrations;
pub mod presenters;
pub mod snowflake;
pub mod sqlite;

pub use channel::{ChannelPublisher, InProcessJobChannel};
pub use compress::ImageCrateCompressor;
pub use fs::{FsArtifactStore, SystemClock};
pub use metadata::ExifMetadataExtractor;
pub use presenters::{present_reconcile, present_report, present_status, present_submission};
pub use snowflake::SnowflakeIdGenerator;
pub use sqlite::{SqliteJobStatusStore, SqlitePhotoRepository};

use gallery_ingest_application::ApplicationError;
use gallery_ingest_application::ImageDecoder;
use gallery_ingest_domain::{detect_image_format, DecodedImage};
use std::path::Path;

/// Reads image dimensions from the header without decoding pixels.
#[derive(Debug, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn read_header(&self, path: &Path) -> Result<DecodedImage, ApplicationError> {
        let format = detect_image_format(path);
        if !format.is_supported() {
            return Err(ApplicationError::Decode(format!(
                "unsupported image format: {:?}",
                path
            )));
        }

        let (width, height) = image::ImageReader::open(path)
            .map_err(|error| ApplicationError::Io(error.to_string()))?
            .with_guessed_format()
            .map_err(|error| ApplicationError::Decode(error.to_string()))?
            .into_dimensions()
            .map_err(|error| ApplicationError::Decode(error.to_string()))?;

        Ok(DecodedImage {
            width,
            height,
            format,
        })
    }
}
