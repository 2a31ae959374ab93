use std::borrow::Cow;
use std::fs;

use gallery_ingest_application::{
    ApplicationError, CompressionOutcome, CompressionRequest, Compressor,
};
use gallery_ingest_domain::{
    derived_file_name, CompressionAttempt, CompressionPlan, ImageFormat, QUALITY_FLOOR,
    SCALE_FLOOR,
};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::debug;

/// Adaptive re-encoder backed by the `image` crate. Every attempt is encoded
/// in memory; only an encode within budget reaches the destination.
#[derive(Debug, Default)]
pub struct ImageCrateCompressor;

impl Compressor for ImageCrateCompressor {
    fn compress(
        &self,
        request: &CompressionRequest,
    ) -> Result<CompressionOutcome, ApplicationError> {
        let file_name = request
            .source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ApplicationError::Validation(format!(
                    "source has no usable file name: {}",
                    request.source.display()
                ))
            })?;
        let destination = request.destination_dir.join(derived_file_name(file_name)?);
        if destination.exists() && !request.overwrite {
            debug!(file = %destination.display(), "rendition exists, skipped");
            return Ok(CompressionOutcome::Skipped { destination });
        }

        let decoded = ImageReader::open(&request.source)
            .map_err(|error| ApplicationError::Io(error.to_string()))?
            .with_guessed_format()
            .map_err(|error| ApplicationError::Decode(error.to_string()))?
            .decode()
            .map_err(|error| ApplicationError::Decode(error.to_string()))?;
        let source = flatten_for(decoded, request.output_format)?;

        let plan = CompressionPlan::new(
            request.max_bytes,
            request.output_format != ImageFormat::WebP,
        );
        for attempt in plan.attempts() {
            let encoded = encode(&source, attempt, request.output_format)?;
            if !plan.fits(encoded.len()) {
                continue;
            }
            fs::create_dir_all(&request.destination_dir)
                .map_err(|error| ApplicationError::Io(error.to_string()))?;
            fs::write(&destination, &encoded)
                .map_err(|error| ApplicationError::Io(error.to_string()))?;
            debug!(
                file = %destination.display(),
                quality = attempt.quality,
                scale = attempt.scale,
                bytes = encoded.len(),
                "rendition written"
            );
            return Ok(CompressionOutcome::Written {
                destination,
                bytes: encoded.len() as u64,
                attempt,
            });
        }

        Err(ApplicationError::CompressionUnattainable {
            file: request.source.display().to_string(),
            quality_floor: f32::from(QUALITY_FLOOR) / 100.0,
            scale_floor: f32::from(SCALE_FLOOR) / 100.0,
        })
    }
}

/// JPEG has no alpha channel, so anything headed there becomes RGB8.
fn flatten_for(image: DynamicImage, format: ImageFormat) -> Result<DynamicImage, ApplicationError> {
    match format {
        ImageFormat::Jpeg => Ok(DynamicImage::ImageRgb8(image.to_rgb8())),
        ImageFormat::WebP => Ok(DynamicImage::ImageRgba8(image.to_rgba8())),
        ImageFormat::Png | ImageFormat::Unsupported => Err(ApplicationError::Validation(format!(
            "{format:?} is not a rendition format"
        ))),
    }
}

fn encode(
    image: &DynamicImage,
    attempt: CompressionAttempt,
    format: ImageFormat,
) -> Result<Vec<u8>, ApplicationError> {
    let (width, height) = attempt.scaled_dimensions(image.width(), image.height());
    let scaled = if (width, height) == (image.width(), image.height()) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image.resize_exact(width, height, FilterType::Triangle))
    };

    let mut bytes = Vec::new();
    let written = match format {
        ImageFormat::WebP => scaled.write_with_encoder(WebPEncoder::new_lossless(&mut bytes)),
        _ => scaled.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, attempt.quality)),
    };
    written.map_err(|error| ApplicationError::Io(format!("encode failed: {error}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use gallery_ingest_domain::CompressionPhase;
    use image::{ImageBuffer, Rgb, Rgba};
    use tempfile::TempDir;

    use super::*;

    fn noise(width: u32, height: u32) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503))
                .wrapping_mul(2_246_822_519);
            Rgb([(v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
        })
    }

    fn request(source: &Path, destination_dir: &Path, max_bytes: u64) -> CompressionRequest {
        CompressionRequest {
            source: source.to_path_buf(),
            destination_dir: destination_dir.to_path_buf(),
            max_bytes,
            output_format: gallery_ingest_domain::detect_image_format(source).derived(),
            overwrite: false,
        }
    }

    fn staged(dir: &TempDir) -> (PathBuf, PathBuf) {
        let out = dir.path().join("out");
        (dir.path().to_path_buf(), out)
    }

    #[test]
    fn smooth_jpeg_fits_on_the_first_quality_step() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("a.jpg");
        ImageBuffer::from_fn(200, 120, |x, _y| Rgb([(x % 256) as u8, 40_u8, 80_u8]))
            .save(&src)
            .expect("save");

        let outcome = ImageCrateCompressor
            .compress(&request(&src, &out, 100 * 1024))
            .expect("compress");

        match outcome {
            CompressionOutcome::Written {
                destination,
                bytes,
                attempt,
            } => {
                assert_eq!(destination, out.join("a.jpg"));
                assert_eq!(attempt.quality, 85);
                assert_eq!(attempt.phase, CompressionPhase::Quality);
                assert_eq!(fs::metadata(&destination).expect("meta").len(), bytes);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn noisy_image_falls_through_to_scale_search_and_stays_in_budget() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("noise.jpg");
        noise(800, 800).save(&src).expect("save");
        let budget = 40 * 1024;

        let outcome = ImageCrateCompressor
            .compress(&request(&src, &out, budget))
            .expect("compress");

        let CompressionOutcome::Written { destination, attempt, .. } = outcome else {
            panic!("expected a write");
        };
        assert_eq!(attempt.phase, CompressionPhase::Scale);
        assert_eq!(attempt.quality, 70);
        assert!(fs::metadata(&destination).expect("meta").len() <= budget);
        let written = image::open(&destination).expect("decodes");
        assert!(written.width() < 800);
    }

    #[test]
    fn png_becomes_a_flattened_jpg_with_the_same_base_name() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("b.png");
        ImageBuffer::from_fn(64, 64, |x, y| Rgba([x as u8, y as u8, 30_u8, 128_u8]))
            .save(&src)
            .expect("save");

        let outcome = ImageCrateCompressor
            .compress(&request(&src, &out, 100 * 1024))
            .expect("compress");

        assert_eq!(outcome.destination(), out.join("b.jpg"));
        let format = ImageReader::open(outcome.destination())
            .expect("open")
            .with_guessed_format()
            .expect("guess")
            .format();
        assert_eq!(format, Some(image::ImageFormat::Jpeg));
    }

    #[test]
    fn webp_stays_webp() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("c.webp");
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(48, 32, |_x, _y| Rgb([200_u8, 10, 10])))
            .save(&src)
            .expect("save");

        let outcome = ImageCrateCompressor
            .compress(&request(&src, &out, 100 * 1024))
            .expect("compress");

        assert_eq!(outcome.destination(), out.join("c.webp"));
        assert!(outcome.was_written());
    }

    #[test]
    fn impossible_budget_fails_without_writing() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("tiny.jpg");
        noise(64, 64).save(&src).expect("save");

        let err = ImageCrateCompressor
            .compress(&request(&src, &out, 16))
            .expect_err("cannot fit");

        match err {
            ApplicationError::CompressionUnattainable {
                file,
                quality_floor,
                scale_floor,
            } => {
                assert!(file.ends_with("tiny.jpg"));
                assert!((quality_floor - 0.2).abs() < f32::EPSILON);
                assert!((scale_floor - 0.1).abs() < f32::EPSILON);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!out.join("tiny.jpg").exists());
    }

    #[test]
    fn existing_destination_is_left_untouched_without_overwrite() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("a.jpg");
        noise(32, 32).save(&src).expect("save");
        fs::create_dir_all(&out).expect("mkdir");
        fs::write(out.join("a.jpg"), b"keep me").expect("write");

        let outcome = ImageCrateCompressor
            .compress(&request(&src, &out, 100 * 1024))
            .expect("compress");

        assert!(!outcome.was_written());
        assert_eq!(fs::read(out.join("a.jpg")).expect("read"), b"keep me");

        let mut forced = request(&src, &out, 100 * 1024);
        forced.overwrite = true;
        let outcome = ImageCrateCompressor.compress(&forced).expect("compress");
        assert!(outcome.was_written());
        assert_ne!(fs::read(out.join("a.jpg")).expect("read"), b"keep me");
    }

    #[test]
    fn undecodable_source_is_a_decode_error() {
        let dir = TempDir::new().expect("tempdir");
        let (root, out) = staged(&dir);
        let src = root.join("broken.jpg");
        fs::write(&src, b"\xFF\xD8 not really").expect("write");

        assert!(matches!(
            ImageCrateCompressor.compress(&request(&src, &out, 1024)),
            Err(ApplicationError::Decode(_))
        ));
    }
}
