use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use exif::{Context, Exif, In, Tag, Value};
use gallery_ingest_application::{ApplicationError, MetadataExtractor};
use gallery_ingest_domain::{
    CaptureField, CaptureMetadata, TagValue, DEFAULT_CAPTURE_OFFSET_HOURS,
};
use tracing::debug;

/// EXIF tag to record field, in lookup order. A field already filled by an
/// earlier row is left alone, which makes the second camera row a fallback
/// to the model tag stored in the Exif IFD.
const TAG_BINDINGS: [(Tag, CaptureField); 7] = [
    (Tag::DateTimeOriginal, CaptureField::CaptureTime),
    (Tag::Model, CaptureField::Camera),
    (Tag(Context::Exif, 0x0110), CaptureField::Camera),
    (Tag::LensModel, CaptureField::Lens),
    (Tag::FNumber, CaptureField::Aperture),
    (Tag::ExposureTime, CaptureField::Shutter),
    (Tag::PhotographicSensitivity, CaptureField::Iso),
];

#[derive(Debug, Clone, Copy)]
pub struct ExifMetadataExtractor {
    capture_offset: TimeDelta,
}

impl ExifMetadataExtractor {
    /// `capture_offset_hours` is subtracted from the recorded capture time.
    pub fn new(capture_offset_hours: i64) -> Result<Self, ApplicationError> {
        let capture_offset = TimeDelta::try_hours(capture_offset_hours).ok_or_else(|| {
            ApplicationError::Configuration(format!(
                "capture time offset of {capture_offset_hours}h is out of range"
            ))
        })?;
        Ok(Self { capture_offset })
    }

    fn map_fields(&self, exif: &Exif) -> CaptureMetadata {
        let mut metadata = CaptureMetadata::default();
        for (tag, field) in TAG_BINDINGS {
            if metadata.get(field).is_some() {
                continue;
            }
            let Some(value) = exif
                .get_field(tag, In::PRIMARY)
                .and_then(|found| tag_value(field, &found.value))
            else {
                continue;
            };
            metadata.apply(field, value, self.capture_offset);
        }
        metadata
    }
}

impl Default for ExifMetadataExtractor {
    fn default() -> Self {
        Self {
            capture_offset: TimeDelta::hours(DEFAULT_CAPTURE_OFFSET_HOURS),
        }
    }
}

impl MetadataExtractor for ExifMetadataExtractor {
    fn extract(&self, path: &Path) -> Result<CaptureMetadata, ApplicationError> {
        let file = File::open(path).map_err(|error| ApplicationError::Io(error.to_string()))?;
        let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => {
                debug!(file = %path.display(), "no exif block");
                return Ok(CaptureMetadata::default());
            }
            Err(error) => {
                return Err(ApplicationError::MetadataExtraction {
                    file: path.display().to_string(),
                    reason: error.to_string(),
                })
            }
        };
        Ok(self.map_fields(&exif))
    }
}

fn tag_value(field: CaptureField, value: &Value) -> Option<TagValue> {
    match value {
        Value::Ascii(parts) => {
            let bytes = parts.first()?;
            if field == CaptureField::CaptureTime {
                return parse_exif_datetime(bytes).map(TagValue::DateTime);
            }
            Some(TagValue::Text(String::from_utf8_lossy(bytes).into_owned()))
        }
        Value::Rational(ratios) => ratios.first().map(|ratio| TagValue::Ratio {
            numerator: ratio.num,
            denominator: ratio.denom,
        }),
        Value::Short(values) => values.first().map(|value| TagValue::Integer(u32::from(*value))),
        Value::Long(values) => values.first().copied().map(TagValue::Integer),
        _ => None,
    }
}

fn parse_exif_datetime(bytes: &[u8]) -> Option<NaiveDateTime> {
    let taken = exif::DateTime::from_ascii(bytes).ok()?;
    NaiveDate::from_ymd_opt(
        i32::from(taken.year),
        u32::from(taken.month),
        u32::from(taken.day),
    )?
    .and_hms_opt(
        u32::from(taken.hour),
        u32::from(taken.minute),
        u32::from(taken.second),
    )
}
