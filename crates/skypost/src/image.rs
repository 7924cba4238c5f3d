//! Fitting images under the blob size ceiling.
//!
//! Images already small enough pass through untouched. Larger ones are
//! shrunk in rounds: each round multiplies a cumulative scale by
//! [`SCALE_STEP`], resamples the decoded original to
//! `floor(original * scale)` with a bilinear filter and re-encodes it in the
//! original container format. The number of rounds is capped; an image that
//! is still too large after the last round is an error rather than a hang.

use std::io::Cursor;

use bytes::Bytes;
use ::image::imageops::FilterType;
use ::image::{
    DynamicImage, ImageError, ImageFormat, ImageReader, guess_format,
    load_from_memory_with_format,
};
use skypost_common::types::MimeType;

/// Factor applied to the cumulative scale each round.
pub const SCALE_STEP: f64 = 0.9;

/// Default cap on rescale rounds. `0.9^32` is about 3% of the original edge.
pub const DEFAULT_MAX_RESCALE_ROUNDS: u32 = 32;

/// An image ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// Encoded bytes, at most the requested ceiling
    pub bytes: Bytes,
    /// MIME type sniffed from `bytes`
    pub mime_type: MimeType,
    /// Pixel width of `bytes`
    pub width: u32,
    /// Pixel height of `bytes`
    pub height: u32,
}

/// The input is not an image this crate can read.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DecodeError {
    /// Not a PNG, JPEG or GIF container
    #[error("unsupported image format{}", .detected.map(|f| format!(" ({f:?})")).unwrap_or_default())]
    #[diagnostic(
        code(skypost::image::unsupported),
        help("images must be PNG, JPEG or GIF")
    )]
    Unsupported {
        /// Format that was recognised but is not accepted, if any
        detected: Option<ImageFormat>,
    },
    /// The container was recognised but its contents could not be read
    #[error("failed to decode image: {0}")]
    #[diagnostic(code(skypost::image::decode))]
    Image(#[source] ImageError),
}

/// The image could not be brought under the ceiling.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum EncodeError {
    /// The encoder itself failed
    #[error("failed to encode image: {0}")]
    #[diagnostic(code(skypost::image::encode))]
    Image(#[source] ImageError),
    /// Still too large after the last permitted round
    #[error("image still {size} bytes after {rounds} rescale rounds (limit {max_size} bytes)")]
    #[diagnostic(
        code(skypost::image::rounds_exhausted),
        help("raise the round limit or the size ceiling, or shrink the image before attaching it")
    )]
    RoundsExhausted {
        /// Rounds attempted
        rounds: u32,
        /// Size of the last encoding
        size: usize,
        /// The ceiling
        max_size: usize,
    },
}

/// Either half of a failed normalization.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum NormalizeError {
    /// The input could not be read
    #[error(transparent)]
    #[diagnostic(transparent)]
    Decode(#[from] DecodeError),
    /// The output could not be produced
    #[error(transparent)]
    #[diagnostic(transparent)]
    Encode(#[from] EncodeError),
}

/// Normalize with the default round cap.
pub fn normalize(raw: &[u8], max_size_bytes: usize) -> Result<NormalizedImage, NormalizeError> {
    normalize_with_rounds(raw, max_size_bytes, DEFAULT_MAX_RESCALE_ROUNDS)
}

/// Bring `raw` to at most `max_size_bytes`, trying at most `max_rounds`
/// rescales.
pub fn normalize_with_rounds(
    raw: &[u8],
    max_size_bytes: usize,
    max_rounds: u32,
) -> Result<NormalizedImage, NormalizeError> {
    let format = sniff(raw)?;
    let (width, height) = ImageReader::with_format(Cursor::new(raw), format)
        .into_dimensions()
        .map_err(DecodeError::Image)?;

    if raw.len() <= max_size_bytes {
        return Ok(NormalizedImage {
            bytes: Bytes::copy_from_slice(raw),
            mime_type: mime_type(format),
            width,
            height,
        });
    }

    tracing::debug!(
        size = raw.len(),
        max_size_bytes,
        width,
        height,
        ?format,
        "image over size ceiling, rescaling"
    );

    let original = load_from_memory_with_format(raw, format).map_err(DecodeError::Image)?;
    let mut scale = 1.0;
    let mut last_size = raw.len();
    for round in 1..=max_rounds {
        scale *= SCALE_STEP;
        let (w, h) = (scaled(width, scale), scaled(height, scale));
        let encoded = encode(&original.resize_exact(w, h, FilterType::Triangle), format)?;
        tracing::debug!(round, width = w, height = h, size = encoded.len(), "rescaled image");

        if encoded.len() <= max_size_bytes {
            let mime = guess_format(&encoded).unwrap_or(format);
            return Ok(NormalizedImage {
                bytes: Bytes::from(encoded),
                mime_type: mime_type(mime),
                width: w,
                height: h,
            });
        }
        last_size = encoded.len();
    }

    Err(EncodeError::RoundsExhausted {
        rounds: max_rounds,
        size: last_size,
        max_size: max_size_bytes,
    }
    .into())
}

/// Detect the container from content bytes alone.
pub fn sniff(raw: &[u8]) -> Result<ImageFormat, DecodeError> {
    match guess_format(raw) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif)) => Ok(format),
        Ok(other) => Err(DecodeError::Unsupported {
            detected: Some(other),
        }),
        Err(_) => Err(DecodeError::Unsupported { detected: None }),
    }
}

/// MIME type for one of the accepted containers. Anything else is treated as
/// PNG, matching what [`encode`] would produce for it.
pub fn mime_type(format: ImageFormat) -> MimeType {
    match format {
        ImageFormat::Jpeg => MimeType::new_static(MimeType::JPEG),
        ImageFormat::Gif => MimeType::new_static(MimeType::GIF),
        _ => MimeType::new_static(MimeType::PNG),
    }
}

fn scaled(dimension: u32, scale: f64) -> u32 {
    ((dimension as f64 * scale).floor() as u32).max(1)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, EncodeError> {
    let mut out = Cursor::new(Vec::new());
    // the JPEG encoder has no alpha support and GIF wants 8-bit RGBA
    let result = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut out, format),
        ImageFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut out, format),
        _ => image.write_to(&mut out, ImageFormat::Png),
    };
    result.map_err(EncodeError::Image)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};

    /// Deterministic noise, which compresses badly in every format.
    fn noise(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x9e37_79b9;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn encoded(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn small_image_passes_through() {
        let raw = encoded(&noise(16, 8), ImageFormat::Png);
        let out = normalize(&raw, raw.len()).unwrap();
        assert_eq!(out.bytes.as_ref(), raw.as_slice());
        assert_eq!(out.mime_type.as_str(), "image/png");
        assert_eq!((out.width, out.height), (16, 8));
    }

    #[test]
    fn oversized_png_is_shrunk_under_ceiling() {
        let raw = encoded(&noise(256, 128), ImageFormat::Png);
        let max = raw.len() / 3;
        let out = normalize(&raw, max).unwrap();

        assert!(out.bytes.len() <= max);
        assert_eq!(out.mime_type.as_str(), "image/png");
        assert!(out.width < 256 && out.height < 128);
        // both edges use the same cumulative scale
        assert!(out.width == out.height * 2 || out.width == out.height * 2 + 1);
        let (w, h) = ImageReader::new(Cursor::new(out.bytes.as_ref()))
            .with_guessed_format()
            .unwrap()
            .into_dimensions()
            .unwrap();
        assert_eq!((w, h), (out.width, out.height));
    }

    #[test]
    fn oversized_jpeg_stays_jpeg() {
        let raw = encoded(&noise(200, 200), ImageFormat::Jpeg);
        let max = raw.len() / 2;
        let out = normalize(&raw, max).unwrap();
        assert!(out.bytes.len() <= max);
        assert_eq!(out.mime_type.as_str(), "image/jpeg");
        assert_eq!(out.width, out.height);
    }

    #[test]
    fn gif_dimensions_are_read() {
        let raw = encoded(
            &DynamicImage::ImageRgba8(noise(10, 20).to_rgba8()),
            ImageFormat::Gif,
        );
        let out = normalize(&raw, usize::MAX).unwrap();
        assert_eq!(out.mime_type.as_str(), "image/gif");
        assert_eq!((out.width, out.height), (10, 20));
    }

    #[test]
    fn unsupported_bytes_fail_to_decode() {
        let err = normalize(b"definitely not an image", 1_000_000).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::Decode(DecodeError::Unsupported { detected: None })
        ));

        let bmp = b"BM\x3a\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00";
        let err = normalize(bmp, 1_000_000).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::Decode(DecodeError::Unsupported {
                detected: Some(ImageFormat::Bmp)
            })
        ));
    }

    #[test]
    fn impossible_ceiling_fails_after_bounded_rounds() {
        let raw = encoded(&noise(64, 64), ImageFormat::Png);
        let err = normalize_with_rounds(&raw, 10, 3).unwrap_err();
        match err {
            NormalizeError::Encode(EncodeError::RoundsExhausted {
                rounds,
                size,
                max_size,
            }) => {
                assert_eq!(rounds, 3);
                assert_eq!(max_size, 10);
                assert!(size > 10);
            }
            other => panic!("expected RoundsExhausted, got {other:?}"),
        }
    }

    #[test]
    fn scaled_edges_never_reach_zero() {
        assert_eq!(scaled(100, 0.9), 90);
        assert_eq!(scaled(3, 0.1), 1);
        assert_eq!(scaled(1, 0.9), 1);
    }
}
