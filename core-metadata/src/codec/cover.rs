//! Cover image normalization.
//!
//! Tags always receive JPEG. Provider covers are also shrunk to fit the
//! 500x500 box before they are stored on a [`SongMetadata`](crate::model::SongMetadata).

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};

use crate::error::Result;
use crate::model::sniff_image_mime;

/// Longest edge for provider covers.
pub const COVER_MAX_EDGE: u32 = 500;

/// JPEG quality used whenever we re-encode.
pub const COVER_JPEG_QUALITY: u8 = 85;

/// Returns JPEG bytes for `data`.
///
/// JPEG input is passed through untouched; anything else `image` can decode
/// is re-encoded without resizing.
pub fn normalize_to_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    if sniff_image_mime(data) == Some("image/jpeg") {
        return Ok(data.to_vec());
    }

    let img = image::load_from_memory(data)?;
    encode_jpeg(&img, COVER_JPEG_QUALITY)
}

/// Decodes `data`, shrinks it to fit `max_edge` (never enlarging) and encodes
/// it as JPEG at `quality`.
pub fn thumbnail_jpeg(data: &[u8], max_edge: u32, quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    let (width, height) = img.dimensions();

    let img = if width > max_edge || height > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };

    encode_jpeg(&img, quality)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buffer)
}
