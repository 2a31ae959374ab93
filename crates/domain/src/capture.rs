use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

pub const CAPTURE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_CAPTURE_OFFSET_HOURS: i64 = 8;

/// Capture fields a photo record carries. Every field is optional and filled
/// independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureField {
    CaptureTime,
    Camera,
    Lens,
    Aperture,
    Shutter,
    Iso,
}

/// A tag value as read from the image, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Ratio { numerator: u32, denominator: u32 },
    Integer(u32),
    DateTime(NaiveDateTime),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub capture_time: Option<String>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub aperture: Option<String>,
    pub shutter: Option<String>,
    pub iso: Option<String>,
}

impl CaptureMetadata {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn get(&self, field: CaptureField) -> Option<&str> {
        match field {
            CaptureField::CaptureTime => self.capture_time.as_deref(),
            CaptureField::Camera => self.camera.as_deref(),
            CaptureField::Lens => self.lens.as_deref(),
            CaptureField::Aperture => self.aperture.as_deref(),
            CaptureField::Shutter => self.shutter.as_deref(),
            CaptureField::Iso => self.iso.as_deref(),
        }
    }

    /// Formats `value` for `field` and stores it. Returns false when the value
    /// has the wrong shape for the field (the field stays absent).
    pub fn apply(&mut self, field: CaptureField, value: TagValue, offset: TimeDelta) -> bool {
        let formatted = match (field, value) {
            (CaptureField::CaptureTime, TagValue::DateTime(taken)) => {
                format_capture_time(taken, offset)
            }
            (CaptureField::Aperture, TagValue::Ratio { numerator, denominator }) => {
                format_aperture(numerator, denominator)
            }
            (CaptureField::Shutter, TagValue::Ratio { numerator, denominator }) => {
                format_shutter(numerator, denominator)
            }
            (CaptureField::Iso, TagValue::Integer(iso)) => Some(iso.to_string()),
            (CaptureField::Iso | CaptureField::Lens | CaptureField::Camera, TagValue::Text(text)) => {
                non_empty(text)
            }
            _ => None,
        };

        let Some(formatted) = formatted else {
            return false;
        };
        let slot = match field {
            CaptureField::CaptureTime => &mut self.capture_time,
            CaptureField::Camera => &mut self.camera,
            CaptureField::Lens => &mut self.lens,
            CaptureField::Aperture => &mut self.aperture,
            CaptureField::Shutter => &mut self.shutter,
            CaptureField::Iso => &mut self.iso,
        };
        *slot = Some(formatted);
        true
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Shifts the camera clock back by `offset` and renders `yyyy-MM-dd HH:mm:ss`.
pub fn format_capture_time(taken: NaiveDateTime, offset: TimeDelta) -> Option<String> {
    taken
        .checked_sub_signed(offset)
        .map(|corrected| corrected.format(CAPTURE_TIME_FORMAT).to_string())
}

pub fn format_aperture(numerator: u32, denominator: u32) -> Option<String> {
    if denominator == 0 {
        return None;
    }
    Some(format!("F{:.1}", f64::from(numerator) / f64::from(denominator)))
}

pub fn format_shutter(numerator: u32, denominator: u32) -> Option<String> {
    if denominator == 0 {
        return None;
    }
    if denominator == 1 {
        return Some(numerator.to_string());
    }
    if numerator == 1 {
        return Some(format!("1/{denominator}"));
    }
    Some(format!("{:.1}", f64::from(numerator) / f64::from(denominator)))
}
