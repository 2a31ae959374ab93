//! Search order for adaptive compression.
//!
//! Quality and scale are tracked in hundredths so the step sequence is exact:
//! quality runs 0.85, 0.80, ..., 0.20 at full scale, then scale runs
//! 1.0, 0.9, ..., 0.1 at quality 0.70.

pub const QUALITY_START: u8 = 85;
pub const QUALITY_STEP: u8 = 5;
pub const QUALITY_FLOOR: u8 = 20;
pub const SCALE_SEARCH_QUALITY: u8 = 70;
pub const SCALE_START: u8 = 100;
pub const SCALE_STEP: u8 = 10;
pub const SCALE_FLOOR: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPhase {
    Quality,
    Scale,
}

/// One encode in the search. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionAttempt {
    pub phase: CompressionPhase,
    /// Encoder quality in hundredths (85 means 0.85).
    pub quality: u8,
    /// Resize factor in hundredths (100 means unscaled).
    pub scale: u8,
}

impl CompressionAttempt {
    pub fn quality_fraction(self) -> f32 {
        f32::from(self.quality) / 100.0
    }

    pub fn scale_fraction(self) -> f64 {
        f64::from(self.scale) / 100.0
    }

    /// Output dimensions for a source of `width` x `height`, never below 1px.
    pub fn scaled_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.scale >= SCALE_START {
            return (width, height);
        }
        let factor = self.scale_fraction();
        let scaled = |side: u32| ((f64::from(side) * factor).round() as u32).max(1);
        (scaled(width), scaled(height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPlan {
    pub max_bytes: u64,
    /// False for encoders that ignore quality (lossless WebP); the quality
    /// phase then collapses to its first step.
    pub quality_sensitive: bool,
}

impl CompressionPlan {
    pub fn new(max_bytes: u64, quality_sensitive: bool) -> Self {
        Self {
            max_bytes,
            quality_sensitive,
        }
    }

    pub fn attempts(&self) -> Vec<CompressionAttempt> {
        let mut attempts = Vec::new();

        let mut quality = QUALITY_START;
        while quality >= QUALITY_FLOOR {
            attempts.push(CompressionAttempt {
                phase: CompressionPhase::Quality,
                quality,
                scale: SCALE_START,
            });
            if !self.quality_sensitive {
                break;
            }
            quality -= QUALITY_STEP;
        }

        let mut scale = SCALE_START;
        while scale >= SCALE_FLOOR {
            attempts.push(CompressionAttempt {
                phase: CompressionPhase::Scale,
                quality: SCALE_SEARCH_QUALITY,
                scale,
            });
            scale -= SCALE_STEP;
        }

        attempts
    }

    pub fn fits(&self, encoded_len: usize) -> bool {
        encoded_len as u64 <= self.max_bytes
    }
}
