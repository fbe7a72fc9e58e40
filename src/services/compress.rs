use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

/// Client-side downscale and re-encode settings applied before upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 1200,
            quality: 70,
        }
    }
}

/// Image bytes ready for the multipart upload.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// `None` when the input could not be decoded and was passed through untouched.
    pub dimensions: Option<(u32, u32)>,
}

/// Resize to fit the bounds (never upscaling) and re-encode as JPEG.
///
/// Undecodable input is passed through unchanged so the upload can still proceed.
pub fn compress_image(data: &[u8], file_name: &str, settings: CompressionSettings) -> CompressedImage {
    match try_compress(data, settings) {
        Ok((bytes, dimensions)) => {
            tracing::debug!(
                original_bytes = data.len(),
                compressed_bytes = bytes.len(),
                width = dimensions.0,
                height = dimensions.1,
                "Image compressed"
            );
            CompressedImage {
                bytes,
                file_name: jpeg_file_name(file_name),
                dimensions: Some(dimensions),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, file_name = %file_name, "Image compression failed, sending original");
            CompressedImage {
                bytes: data.to_vec(),
                file_name: file_name.to_string(),
                dimensions: None,
            }
        }
    }
}

fn try_compress(data: &[u8], settings: CompressionSettings) -> Result<(Vec<u8>, (u32, u32)), image::ImageError> {
    let mut img = image::load_from_memory(data)?;

    let (width, height) = img.dimensions();
    if width > settings.max_width || height > settings.max_height {
        img = img.resize(settings.max_width, settings.max_height, FilterType::Triangle);
    }

    let rgb = img.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, settings.quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    Ok((buf.into_inner(), rgb.dimensions()))
}

/// `receipt.png` → `receipt.jpg`
fn jpeg_file_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    format!("{}.jpg", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_wide_image_is_bounded() {
        let out = compress_image(&png_bytes(2400, 1200), "receipt.png", CompressionSettings::default());
        assert_eq!(out.dimensions, Some((1200, 600)));
        assert_eq!(out.file_name, "receipt.jpg");
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_tall_image_is_bounded() {
        let out = compress_image(&png_bytes(600, 2400), "dish.webp", CompressionSettings::default());
        assert_eq!(out.dimensions, Some((300, 1200)));
    }

    #[test]
    fn test_small_image_not_upscaled() {
        let out = compress_image(&png_bytes(320, 200), "item", CompressionSettings::default());
        assert_eq!(out.dimensions, Some((320, 200)));
        assert_eq!(out.file_name, "item.jpg");
    }

    #[test]
    fn test_undecodable_bytes_pass_through() {
        let out = compress_image(b"not an image", "x.png", CompressionSettings::default());
        assert_eq!(out.bytes, b"not an image");
        assert_eq!(out.file_name, "x.png");
        assert!(out.dimensions.is_none());
    }
}
