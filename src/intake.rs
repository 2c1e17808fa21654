//! Image intake: turns the Base64 text posted by a client into a canonical
//! in-memory pixel buffer, or a typed reason why it could not

use base64::{
    alphabet,
    engine::{self, general_purpose},
    Engine as _,
};
use image::{io::Reader as ImageReader, DynamicImage, ImageFormat};
use std::fmt::Debug;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Standard alphabet, padding optional. Browsers always pad, but other
/// clients strip it
const B64: engine::GeneralPurpose = engine::GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(engine::DecodePaddingMode::Indifferent),
);

/// Why an image payload could not be turned into pixels
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 encoding: {0}")]
    InvalidEncoding(String),

    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("image payload is {len} bytes, limit is {limit}")]
    PayloadTooLarge { len: usize, limit: usize },

    #[error("image is {width}x{height}, limit is {limit} pixels")]
    DimensionsTooLarge { width: u32, height: u32, limit: u64 },
}

impl From<base64::DecodeError> for DecodeError {
    fn from(err: base64::DecodeError) -> Self {
        DecodeError::InvalidEncoding(err.to_string())
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError::UnsupportedImageFormat(err.to_string())
    }
}

/// Size limits applied before and during decoding
#[derive(Debug, Clone, Copy)]
pub struct IntakeLimits {
    pub max_payload_bytes: usize,
    pub max_pixels: u64,
}

/// An image as posted by the client: Base64 text, with the MIME type from a
/// `data:` URI prefix if there was one
#[derive(Clone, PartialEq)]
pub struct EncodedImageRequest {
    pub mime_type_hint: Option<String>,
    pub payload: String,
}

impl Debug for EncodedImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EncodedImageRequest {{ mime_type_hint: {:?}, payload: <{} bytes> }}",
            self.mime_type_hint,
            self.payload.len()
        )
    }
}

impl EncodedImageRequest {
    /// Split an optional `data:<mime>;base64,` prefix off the posted field.
    /// The prefix runs up to and including the first comma
    pub fn parse(field: String) -> Result<Self, DecodeError> {
        if !field.starts_with("data:") {
            return Ok(EncodedImageRequest {
                mime_type_hint: None,
                payload: field,
            });
        }

        let (header, payload) = field
            .split_once(',')
            .ok_or_else(|| DecodeError::InvalidEncoding("data URI has no ',' separator".into()))?;

        let mut params = header["data:".len()..].split(';');
        let mime = params.next().unwrap_or_default();
        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(DecodeError::InvalidEncoding(
                "data URI is not base64 encoded".into(),
            ));
        }

        Ok(EncodedImageRequest {
            mime_type_hint: (!mime.is_empty()).then(|| mime.to_string()),
            payload: payload.to_string(),
        })
    }
}

/// Order of the interleaved channels in `DecodedImage::pixels`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Bgr,
    Rgb,
    Grayscale,
}

impl ChannelOrder {
    pub fn channels(self) -> usize {
        match self {
            ChannelOrder::Bgr | ChannelOrder::Rgb => 3,
            ChannelOrder::Grayscale => 1,
        }
    }
}

/// A decoded image. `pixels` holds `width * height * channels` bytes, row
/// major, channels interleaved
#[derive(Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channel_order: ChannelOrder,
    pub pixels: Vec<u8>,
}

impl Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodedImage {{ {}x{} {:?}, pixels: <{} bytes> }}",
            self.width,
            self.height,
            self.channel_order,
            self.pixels.len()
        )
    }
}

impl DecodedImage {
    fn from_dynamic(image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        let mut pixels = rgb.into_raw();
        for px in pixels.chunks_exact_mut(3) {
            px.swap(0, 2);
        }

        DecodedImage {
            width,
            height,
            channel_order: ChannelOrder::Bgr,
            pixels,
        }
    }

    /// Re-pack the pixel buffer into another channel order
    pub fn convert(&self, order: ChannelOrder) -> DecodedImage {
        if order == self.channel_order {
            return self.clone();
        }

        let pixels = match (self.channel_order, order) {
            (ChannelOrder::Grayscale, _) => self
                .pixels
                .iter()
                .flat_map(|&v| [v, v, v])
                .collect(),
            (_, ChannelOrder::Grayscale) => {
                let (r, b) = match self.channel_order {
                    ChannelOrder::Bgr => (2, 0),
                    _ => (0, 2),
                };
                self.pixels
                    .chunks_exact(3)
                    .map(|px| luma(px[r], px[1], px[b]))
                    .collect()
            }
            // Bgr <-> Rgb
            _ => {
                let mut pixels = self.pixels.clone();
                for px in pixels.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                pixels
            }
        };

        DecodedImage {
            width: self.width,
            height: self.height,
            channel_order: order,
            pixels,
        }
    }
}

/// ITU-R BT.601 luma
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// Decode a client payload into a BGR pixel buffer
pub fn decode_request(
    raw: &EncodedImageRequest,
    limits: &IntakeLimits,
) -> Result<DecodedImage, DecodeError> {
    if raw.payload.len() > limits.max_payload_bytes {
        return Err(DecodeError::PayloadTooLarge {
            len: raw.payload.len(),
            limit: limits.max_payload_bytes,
        });
    }

    let text: Vec<u8> = raw
        .payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if text.is_empty() {
        return Err(DecodeError::InvalidEncoding("payload is empty".into()));
    }
    let bytes = B64.decode(text)?;

    let format = image::guess_format(&bytes)?;
    let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format).into_dimensions()?;
    if u64::from(width) * u64::from(height) > limits.max_pixels {
        return Err(DecodeError::DimensionsTooLarge {
            width,
            height,
            limit: limits.max_pixels,
        });
    }

    let hinted = raw.mime_type_hint.as_deref().and_then(expected_format);
    if hinted.is_some_and(|hinted| hinted != format) {
        debug!(
            "payload declared as {:?} but looks like {:?}",
            raw.mime_type_hint, format
        );
    }
    debug!("decoding {:?} image ({}x{})", format, width, height);

    let image = image::load_from_memory_with_format(&bytes, format)?;
    Ok(DecodedImage::from_dynamic(image))
}

/// Format named by a `data:` URI MIME type. Advisory only: the hint is
/// compared with the sniffed format for logging, and the sniffed format is
/// always what gets decoded
fn expected_format(mime: &str) -> Option<ImageFormat> {
    match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        "image/bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}
