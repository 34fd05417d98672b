// ============================================================================
// CODEC: decode host-supplied images, encode the composite for export
// ============================================================================
//
// Everything here works on in-memory bytes. Files are only ever touched by
// the CLI front end.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder};

use crate::canvas::{MAX_PIXELS, PixelBuffer};
use crate::error::{EditorError, EditorResult};

/// Where a new session's pixels come from.
#[derive(Clone, Copy, Debug)]
pub enum ImageSource<'a> {
    /// Encoded file bytes (PNG, JPEG, WebP, BMP, GIF).
    Encoded(&'a [u8]),
    /// `data:image/...;base64,...`
    DataUrl(&'a str),
    /// Straight RGBA, `width * height * 4` bytes.
    Raw { width: u32, height: u32, rgba: &'a [u8] },
}

/// Export formats the encoder supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Bmp,
}

impl ExportFormat {
    /// Case-insensitive lookup. Unlike blend modes this is not total: an
    /// unsupported name is an encode error.
    pub fn from_name(name: &str) -> EditorResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            "bmp" => Ok(ExportFormat::Bmp),
            other => Err(EditorError::Encode(format!("unsupported export format '{}'", other))),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Bmp => "image/bmp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Bmp => "bmp",
        }
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode any [`ImageSource`] into an RGBA buffer.
pub fn decode(source: ImageSource<'_>) -> EditorResult<PixelBuffer> {
    let buffer = match source {
        ImageSource::Encoded(bytes) => decode_bytes(bytes)?,
        ImageSource::DataUrl(url) => {
            let bytes = parse_data_url(url)?;
            decode_bytes(&bytes)?
        }
        ImageSource::Raw { width, height, rgba } => {
            check_dimensions(width, height)?;
            PixelBuffer::from_raw(width, height, rgba.to_vec())?
        }
    };
    Ok(buffer)
}

fn decode_bytes(bytes: &[u8]) -> EditorResult<PixelBuffer> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    check_dimensions(img.width(), img.height())?;
    Ok(PixelBuffer::from_rgba_image(img))
}

pub(crate) fn check_dimensions(width: u32, height: u32) -> EditorResult<()> {
    if width == 0 || height == 0 {
        return Err(EditorError::InvalidDimensions(format!("{}x{}", width, height)));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(EditorError::InvalidDimensions(format!(
            "{}x{} exceeds the {} pixel limit",
            width, height, MAX_PIXELS
        )));
    }
    Ok(())
}

/// Extract the payload of a base64 data URL.
pub fn parse_data_url(url: &str) -> EditorResult<Vec<u8>> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| EditorError::InvalidDataUrl("missing 'data:' prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| EditorError::InvalidDataUrl("missing ',' separator".to_string()))?;
    if !header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(EditorError::InvalidDataUrl("only base64 payloads are supported".to_string()));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| EditorError::InvalidDataUrl(e.to_string()))
}

// ============================================================================
// ENCODING
// ============================================================================

/// Map a (0, 1] quality factor onto the JPEG encoder's 1..=100 scale.
/// Anything outside the range falls back to `0.9`.
pub fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality > 0.0 && quality <= 1.0 { quality } else { 0.9 };
    (q * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode a buffer. JPEG has no alpha channel, so the image is converted to
/// RGB first.
pub fn encode(buffer: &PixelBuffer, format: ExportFormat, quality: f32) -> EditorResult<Vec<u8>> {
    let img = buffer.as_image();
    let (w, h) = (img.width(), img.height());
    let mut out = Cursor::new(Vec::new());
    let to_encode_err = |e: image::ImageError| EditorError::Encode(e.to_string());

    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out)
                .write_image(img.as_raw(), w, h, ColorType::Rgba8)
                .map_err(to_encode_err)?;
        }
        ExportFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
                .encode(rgb.as_raw(), w, h, ColorType::Rgb8)
                .map_err(to_encode_err)?;
        }
        ExportFormat::Bmp => {
            BmpEncoder::new(&mut out)
                .encode(img.as_raw(), w, h, ColorType::Rgba8)
                .map_err(to_encode_err)?;
        }
    }
    Ok(out.into_inner())
}

/// Encode a buffer as a `data:` URL.
pub fn encode_data_url(buffer: &PixelBuffer, format: ExportFormat, quality: f32) -> EditorResult<String> {
    let bytes = encode(buffer, format, quality)?;
    Ok(format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> PixelBuffer {
        let mut buf = PixelBuffer::new_filled(3, 2, Rgba([10, 20, 30, 255]));
        buf.put_pixel(2, 1, Rgba([200, 100, 0, 128]));
        buf
    }

    #[test]
    fn png_is_lossless() {
        let buf = sample();
        let bytes = encode(&buf, ExportFormat::Png, 1.0).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let back = decode(ImageSource::Encoded(&bytes)).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn data_url_carries_mime_type() {
        let url = encode_data_url(&sample(), ExportFormat::Jpeg, 0.8).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let back = decode(ImageSource::DataUrl(&url)).unwrap();
        assert_eq!(back.dimensions(), sample().dimensions());
        // JPEG drops alpha.
        assert_eq!(back.get_pixel(2, 1)[3], 255);
    }

    #[test]
    fn format_names() {
        assert_eq!(ExportFormat::from_name("JPG").unwrap(), ExportFormat::Jpeg);
        assert_eq!(ExportFormat::from_name("bmp").unwrap().mime_type(), "image/bmp");
        assert!(matches!(ExportFormat::from_name("webp"), Err(EditorError::Encode(_))));
        assert!(ExportFormat::from_name("tiff").is_err());
    }

    #[test]
    fn quality_mapping() {
        assert_eq!(jpeg_quality(0.9), 90);
        assert_eq!(jpeg_quality(0.001), 1);
        assert_eq!(jpeg_quality(0.0), 90);
        assert_eq!(jpeg_quality(7.0), 90);
    }

    #[test]
    fn bad_inputs_are_rejected() {
        assert!(matches!(
            decode(ImageSource::Encoded(b"not an image")),
            Err(EditorError::Decode(_))
        ));
        assert!(matches!(
            decode(ImageSource::DataUrl("data:image/png,abc")),
            Err(EditorError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode(ImageSource::DataUrl("data:image/png;base64,@@@")),
            Err(EditorError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode(ImageSource::Raw { width: 2, height: 2, rgba: &[0; 15] }),
            Err(EditorError::InvalidRawBuffer { expected: 16, actual: 15 })
        ));
        assert!(matches!(
            decode(ImageSource::Raw { width: 0, height: 2, rgba: &[] }),
            Err(EditorError::InvalidDimensions(_))
        ));
    }
}
