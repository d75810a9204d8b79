//! Image transformations and before/after statistics.
//!
//! Everything here is synchronous and CPU-bound: bytes in, bytes and
//! stats out. Callers on the async runtime should run it through
//! `spawn_blocking`.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::models::job::{Dimensions, JobStats};
use crate::models::processing::{ProcessingType, ResizeMode, Strategy, MAX_BOUND};

/// Content type of every produced output.
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

/// Largest resize target, in pixels.
pub const MAX_OUTPUT_PIXELS: u64 = 8192 * 8192;

/// A decoded source image.
pub struct SourceImage {
    image: DynamicImage,
    pub dimensions: Dimensions,
}

/// Decode image bytes, guessing the format from the content.
pub fn decode(bytes: &[u8]) -> Result<SourceImage, ProcessingError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ProcessingError::Read)?
        .decode()
        .map_err(ProcessingError::Decode)?;

    let dimensions = Dimensions::new(image.width(), image.height());
    if dimensions.pixel_count() == 0 {
        return Err(ProcessingError::EmptyImage);
    }

    Ok(SourceImage { image, dimensions })
}

/// Raster formats accepted on upload.
const ACCEPTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// MIME type of an accepted raster image, read from its magic bytes.
///
/// Returns `None` for anything else, including SVG and other text formats.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    ACCEPTED_FORMATS
        .contains(&format)
        .then(|| format.to_mime_type())
}

/// Read dimensions from an encoded image header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Result<Dimensions, ProcessingError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ProcessingError::Read)?
        .into_dimensions()
        .map_err(ProcessingError::Decode)?;
    Ok(Dimensions::new(width, height))
}

/// Target size for the pixel strategy.
///
/// Percentage mode rounds each axis on its own, so the aspect ratio can
/// drift by a fraction of a pixel. Aspect-preserving bounds never enlarge.
/// Without aspect preservation, a single bound scales the other axis
/// proportionally and two bounds are applied as-is.
pub fn target_dimensions(original: Dimensions, mode: &ResizeMode) -> Dimensions {
    let (w, h) = (f64::from(original.width), f64::from(original.height));

    match *mode {
        ResizeMode::Percentage(percentage) => {
            let factor = f64::from(percentage) / 100.0;
            Dimensions::new(scale_axis(w, factor), scale_axis(h, factor))
        }
        ResizeMode::Bounds {
            max_width,
            max_height,
            preserve_aspect: true,
        } => {
            let width_scale = max_width.map(|mw| f64::from(mw) / w);
            let height_scale = max_height.map(|mh| f64::from(mh) / h);

            match (width_scale, height_scale) {
                (Some(ws), hs) if ws < 1.0 && hs.map_or(true, |hs| ws <= hs) => {
                    Dimensions::new(max_width.unwrap_or(original.width), scale_axis(h, ws))
                }
                (_, Some(hs)) if hs < 1.0 => {
                    Dimensions::new(scale_axis(w, hs), max_height.unwrap_or(original.height))
                }
                _ => original,
            }
        }
        ResizeMode::Bounds {
            max_width,
            max_height,
            preserve_aspect: false,
        } => match (max_width, max_height) {
            (Some(mw), Some(mh)) => Dimensions::new(mw, mh),
            (Some(mw), None) => Dimensions::new(mw, scale_axis(h, f64::from(mw) / w)),
            (None, Some(mh)) => Dimensions::new(scale_axis(w, f64::from(mh) / h), mh),
            (None, None) => original,
        },
    }
}

fn scale_axis(length: f64, factor: f64) -> u32 {
    // Saturates at u32::MAX; oversized results are caught by `check_target`.
    ((length * factor).round() as u32).max(1)
}

/// Refuse targets the encoder cannot write or that would exhaust memory.
pub fn check_target(target: Dimensions) -> Result<(), ProcessingError> {
    if target.width > MAX_BOUND
        || target.height > MAX_BOUND
        || target.pixel_count() > MAX_OUTPUT_PIXELS
    {
        return Err(ProcessingError::TargetTooLarge(target));
    }
    Ok(())
}

/// Apply `strategy` to a decoded image and return JPEG bytes.
pub fn transform(source: &SourceImage, strategy: &Strategy) -> Result<Vec<u8>, ProcessingError> {
    match strategy {
        Strategy::Quality { quality } => encode_jpeg(&source.image, *quality),
        Strategy::Pixel { resize, quality } => {
            let target = target_dimensions(source.dimensions, resize);
            check_target(target)?;
            if target == source.dimensions {
                encode_jpeg(&source.image, *quality)
            } else {
                let resized =
                    source
                        .image
                        .resize_exact(target.width, target.height, FilterType::Lanczos3);
                encode_jpeg(&resized, *quality)
            }
        }
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    // Baseline JPEG; the encoder has no progressive mode. JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(ProcessingError::Encode)?;
    Ok(output)
}

/// Stats for a finished run, from actual sizes and decoded dimensions.
pub fn compute_stats(
    original_size: usize,
    processed_size: usize,
    original_dimensions: Dimensions,
    new_dimensions: Dimensions,
    kind: ProcessingType,
) -> JobStats {
    let compression_ratio = if original_size == 0 {
        0.0
    } else {
        (original_size as f64 - processed_size as f64) / original_size as f64 * 100.0
    };

    let pixel_reduction = match kind {
        ProcessingType::Pixel => {
            let before = original_dimensions.pixel_count() as f64;
            let after = new_dimensions.pixel_count() as f64;
            Some(if before == 0.0 { 0.0 } else { (before - after) / before * 100.0 })
        }
        ProcessingType::Quality => None,
    };

    JobStats {
        original_size: original_size as u64,
        processed_size: processed_size as u64,
        compression_ratio,
        original_dimensions: Some(original_dimensions),
        new_dimensions: Some(new_dimensions),
        pixel_reduction,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to read image: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] ImageError),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Resize target {}x{} is too large", .0.width, .0.height)]
    TargetTooLarge(Dimensions),

    #[error("Image worker failed: {0}")]
    Worker(String),
}
