use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("photo id must be positive, got {0}")]
    InvalidPhotoId(u64),
    #[error("{field} must be in 0..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    #[error("rating must be 0 or 1, got {0}")]
    InvalidRating(i64),
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid job message: {0}")]
    InvalidJobMessage(String),
}
