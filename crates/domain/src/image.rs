use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CaptureMetadata, DomainError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotoId(u64);

impl PhotoId {
    pub fn new(value: u64) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::InvalidPhotoId(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Unsupported,
}

impl ImageFormat {
    /// Format written for a derived rendition of a source in this format.
    /// PNG sources are flattened and re-encoded as JPEG.
    pub fn derived(self) -> Self {
        match self {
            Self::Png => Self::Jpeg,
            other => other,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

pub fn detect_image_format(path: &Path) -> ImageFormat {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return ImageFormat::Unsupported;
    };

    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        "png" => ImageFormat::Png,
        "webp" => ImageFormat::WebP,
        _ => ImageFormat::Unsupported,
    }
}

/// Name of the derived rendition for `file_name`: the base name is kept,
/// a `.png` suffix becomes `.jpg`, every other supported suffix is kept.
pub fn derived_file_name(file_name: &str) -> Result<String, DomainError> {
    let path = Path::new(file_name);
    match detect_image_format(path) {
        ImageFormat::Png => {
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| DomainError::InvalidFileName(file_name.to_string()))?;
            Ok(format!("{stem}.jpg"))
        }
        ImageFormat::Unsupported => Err(DomainError::UnsupportedFormat(file_name.to_string())),
        ImageFormat::Jpeg | ImageFormat::WebP => Ok(file_name.to_string()),
    }
}

/// Accepts bare file names only; anything that could escape the staging
/// directory is rejected.
pub fn validate_file_name(file_name: &str) -> Result<(), DomainError> {
    let trimmed = file_name.trim();
    if trimmed.is_empty()
        || trimmed != file_name
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name == "."
        || file_name == ".."
    {
        return Err(DomainError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub file_name: String,
    pub author: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
    pub introduce: Option<String>,
    pub rating: i64,
    pub capture_time: Option<String>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub aperture: Option<String>,
    pub shutter: Option<String>,
    pub iso: Option<String>,
}

impl PhotoRecord {
    pub fn new(
        id: PhotoId,
        file_name: impl Into<String>,
        author: impl Into<String>,
        rating: i64,
    ) -> Result<Self, DomainError> {
        if !(0..=1).contains(&rating) {
            return Err(DomainError::InvalidRating(rating));
        }
        Ok(Self {
            id,
            file_name: file_name.into(),
            author: author.into(),
            width: None,
            height: None,
            title: None,
            introduce: None,
            rating,
            capture_time: None,
            camera: None,
            lens: None,
            aperture: None,
            shutter: None,
            iso: None,
        })
    }

    pub fn with_dimensions(mut self, dimensions: Option<DecodedImage>) -> Self {
        if let Some(decoded) = dimensions {
            self.width = Some(decoded.width);
            self.height = Some(decoded.height);
        }
        self
    }

    pub fn with_capture(mut self, capture: CaptureMetadata) -> Self {
        self.capture_time = capture.capture_time;
        self.camera = capture.camera;
        self.lens = capture.lens;
        self.aperture = capture.aperture;
        self.shutter = capture.shutter;
        self.iso = capture.iso;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}
