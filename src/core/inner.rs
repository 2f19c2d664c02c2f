//! Inner image codec
//!
//! Pixels travel inside a LAMO payload as a PNG. Decoding treats that PNG as
//! hostile: the pixel count from its header is checked against an explicit
//! ceiling before any pixel buffer is allocated, and the `image` crate's own
//! allocation limit is set from the same ceiling.

use crate::config::Limits;
use crate::error::{FormatError, LamoError, Result};
use image::codecs::png::PngDecoder;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Format tag written to `inner_format`
pub const INNER_FORMAT: &str = "PNG";

/// Worst-case bytes per pixel (RGBA, 16 bits per channel)
const MAX_BYTES_PER_PIXEL: u64 = 8;

/// A losslessly serialized image plus its descriptive properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Pixel layout tag (`RGB`, `RGBA`, `L`, ...)
    pub mode: String,
    /// Format of `data`
    pub format: String,
}

/// Image collaborator used by the high-level API
pub trait ImageCodec: Send + Sync {
    /// Serialize pixels to a lossless format
    fn encode_lossless(&self, image: &DynamicImage) -> Result<EncodedImage>;

    /// Decode bytes produced by `encode_lossless`, honoring `max_pixels`
    fn decode(&self, bytes: &[u8], max_pixels: u64) -> Result<DynamicImage>;
}

/// PNG implementation of [`ImageCodec`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn encode_lossless(&self, image: &DynamicImage) -> Result<EncodedImage> {
        let image = storable(image);
        let mut data = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .map_err(|e| {
                debug!("PNG encode failed: {}", e);
                LamoError::from(FormatError::InvalidInnerImage)
            })?;

        Ok(EncodedImage {
            data,
            width: image.width(),
            height: image.height(),
            mode: mode_tag(image.color()).to_string(),
            format: INNER_FORMAT.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8], max_pixels: u64) -> Result<DynamicImage> {
        let decoder = PngDecoder::with_limits(Cursor::new(bytes), decode_limits(max_pixels))
            .map_err(invalid_image)?;

        let (width, height) = decoder.dimensions();
        let pixels = u64::from(width) * u64::from(height);
        if pixels > max_pixels {
            warn!(
                "Inner image {}x{} exceeds pixel ceiling {}",
                width, height, max_pixels
            );
            return Err(FormatError::InvalidInnerImage.into());
        }

        DynamicImage::from_decoder(decoder).map_err(invalid_image)
    }
}

/// Pixel layout tag for a color type, as Pillow names the mode
///
/// Pillow has no 16-bit mode for multi-channel images and reports them by
/// channel layout alone; only 16-bit grayscale keeps its own `I;16` tag.
/// Float layouts never reach this point for stored images; see [`storable`].
pub fn mode_tag(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::L16 => "I;16",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        _ => "RGBA",
    }
}

/// Upper-case name of a source format, as recorded in `orig_format`
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Gif => "GIF",
        _ => "UNKNOWN",
    }
}

/// Open an image file of any enabled format, under the pixel ceiling
pub fn open_source_image(path: &Path, limits: &Limits) -> Result<(DynamicImage, Option<ImageFormat>)> {
    let mut reader = ImageReader::open(path)
        .map_err(LamoError::io(path))?
        .with_guessed_format()
        .map_err(LamoError::io(path))?;
    reader.limits(decode_limits(limits.max_pixels));

    let format = reader.format();
    let decoder = reader.into_decoder().map_err(invalid_image)?;
    let (width, height) = decoder.dimensions();
    if u64::from(width) * u64::from(height) > limits.max_pixels {
        warn!("Source image {:?} exceeds pixel ceiling", path);
        return Err(FormatError::InvalidInnerImage.into());
    }

    let image = DynamicImage::from_decoder(decoder).map_err(invalid_image)?;
    Ok((image, format))
}

/// Convert layouts PNG cannot hold (float) to 16-bit equivalents
fn storable(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16 => Cow::Borrowed(image),
        ColorType::Rgb32F => Cow::Owned(DynamicImage::ImageRgb16(image.to_rgb16())),
        _ => Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16())),
    }
}

fn decode_limits(max_pixels: u64) -> image::Limits {
    let mut limits = image::Limits::default();
    limits.max_alloc = Some(max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));
    limits
}

fn invalid_image(e: image::ImageError) -> LamoError {
    debug!("Image decode failed: {}", e);
    FormatError::InvalidInnerImage.into()
}
