//! Lossy re-encoding for images that cannot be uploaded as-is.

use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use wabot_core::error::WabotError;

/// Images at or below this size are inlined without re-encoding.
pub const COMPRESS_ABOVE_BYTES: usize = 50 * 1024;
/// A first-pass result above this size is re-encoded at [`AGGRESSIVE_QUALITY`].
pub const AGGRESSIVE_ABOVE_BYTES: usize = 30 * 1024;
pub const DEFAULT_QUALITY: u8 = 70;
pub const AGGRESSIVE_QUALITY: u8 = 30;
pub const THUMBNAIL_QUALITY: u8 = 10;

fn decode(bytes: &[u8]) -> Result<DynamicImage, WabotError> {
    image::load_from_memory(bytes)
        .map_err(|e| WabotError::Media(format!("failed to decode image: {e}")))
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, WabotError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| WabotError::Media(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

/// Shrink an image for inline delivery: JPEG at quality 70, and at quality 30
/// when that is still above 30 KB. Small images are returned unchanged.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, WabotError> {
    if bytes.len() <= COMPRESS_ABOVE_BYTES {
        return Ok(bytes.to_vec());
    }
    let img = decode(bytes)?;
    let first = encode_jpeg(&img, DEFAULT_QUALITY)?;
    if first.len() <= AGGRESSIVE_ABOVE_BYTES {
        return Ok(first);
    }
    tracing::debug!(
        "compressed image still {} bytes, retrying at quality {AGGRESSIVE_QUALITY}",
        first.len()
    );
    encode_jpeg(&img, AGGRESSIVE_QUALITY)
}

/// Nearest-neighbour thumbnail whose longer side is `max_px`, as a low-quality JPEG.
pub fn thumbnail(bytes: &[u8], max_px: u32) -> Result<Vec<u8>, WabotError> {
    let img = decode(bytes)?;
    let max_px = max_px.max(1);
    let small = img.resize(max_px, max_px, FilterType::Nearest);
    encode_jpeg(&small, THUMBNAIL_QUALITY)
}

/// `data:<mime>;base64,<payload>`.
pub fn data_url(mimetype: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mimetype};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
