//! Pure Rust image decoding plus libwebp encoding.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, BMP, GIF, TGA) | `image::load_from_memory` |
//! | Pixel normalization | `DynamicImage::to_rgb8` / `to_rgba8` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → WebP (lossy) | `webp::Encoder::encode_simple` |

use super::calculations::scaled_width;
use super::codec::{CodecError, DecodedImage, ImageCodec};
use super::params::EncodeParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Pixel, Rgb, Rgba};

/// Production codec built on the `image` and `webp` crates.
///
/// Decoded pages are normalized to RGB8, or RGBA8 when the source carries an
/// alpha channel, since those are the layouts libwebp accepts.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(img: DynamicImage) -> Result<DecodedImage, CodecError> {
    let (width, height) = (img.width(), img.height());
    if img.color().has_alpha() {
        DecodedImage::from_raw(width, height, 4, img.to_rgba8().into_raw())
    } else {
        DecodedImage::from_raw(width, height, 3, img.to_rgb8().into_raw())
    }
}

/// Optionally resize a borrowed pixel buffer, returning owned pixels and dimensions.
fn resample<P>(
    image: &DecodedImage,
    target_height: Option<u32>,
) -> Result<(Vec<u8>, u32, u32), CodecError>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let Some(th) = target_height else {
        return Ok((image.pixels.clone(), image.width, image.height));
    };
    let view: ImageBuffer<P, &[u8]> =
        ImageBuffer::from_raw(image.width, image.height, image.pixels.as_slice()).ok_or_else(
            || CodecError::Encode("pixel buffer does not match dimensions".into()),
        )?;
    let tw = scaled_width(image.width, image.height, th);
    let resized = image::imageops::resize(&view, tw, th, FilterType::Lanczos3);
    Ok((resized.into_raw(), tw, th))
}

fn encode_webp(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    quality: f32,
) -> Result<Vec<u8>, CodecError> {
    let encoder = match channels {
        3 => webp::Encoder::from_rgb(pixels, width, height),
        4 => webp::Encoder::from_rgba(pixels, width, height),
        other => return Err(CodecError::UnsupportedLayout { channels: other }),
    };
    let memory = encoder
        .encode_simple(false, quality)
        .map_err(|e| CodecError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let img = image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        normalize(img)
    }

    fn encode(&self, image: &DecodedImage, params: EncodeParams) -> Result<Vec<u8>, CodecError> {
        let (pixels, width, height) = match image.channels {
            3 => resample::<Rgb<u8>>(image, params.target_height)?,
            4 => resample::<Rgba<u8>>(image, params.target_height)?,
            other => return Err(CodecError::UnsupportedLayout { channels: other }),
        };
        encode_webp(
            &pixels,
            width,
            height,
            image.channels,
            params.quality.value() as f32,
        )
    }

    fn output_extension(&self) -> &'static str {
        "webp"
    }
}
