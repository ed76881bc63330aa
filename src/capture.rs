// capture.rs — Grabs one monitor via `xcap`, PNG-encodes and base64-encodes
// the bitmap for submission as a data URL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GenericImageView, ImageEncoder};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("screen capture failed: {0}")]
    Screen(String),
    #[error("no monitors found")]
    NoMonitor,
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Capture the primary monitor (falling back to the first enumerated one)
/// and return the screenshot as base64-encoded PNG.
///
/// Blocking: call from a blocking-friendly thread.
pub fn grab_png_base64() -> Result<String, CaptureError> {
    let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Screen(e.to_string()))?;
    let monitor = monitors
        .into_iter()
        .find(|m| m.is_primary())
        .or_else(|| xcap::Monitor::all().ok()?.into_iter().next())
        .ok_or(CaptureError::NoMonitor)?;

    let raw = monitor
        .capture_image()
        .map_err(|e| CaptureError::Screen(e.to_string()))?;

    encode_png_base64(&DynamicImage::ImageRgba8(raw))
}

/// PNG-encode an image and base64 the result.
pub fn encode_png_base64(img: &DynamicImage) -> Result<String, CaptureError> {
    let (w, h) = img.dimensions();
    let mut png_buf: Vec<u8> = Vec::new();
    PngEncoder::new(&mut png_buf).write_image(
        img.to_rgba8().as_raw(),
        w,
        h,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(BASE64.encode(&png_buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid_image(r: u8, g: u8, b: u8, w: u32, h: u32) -> DynamicImage {
        let mut img = RgbaImage::new(w, h);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([r, g, b, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn encoded_output_is_valid_base64_png() {
        let img = solid_image(10, 20, 30, 16, 8);
        let b64 = encode_png_base64(&img).unwrap();

        let bytes = BASE64.decode(b64.as_bytes()).unwrap();
        // PNG signature
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
    }

    #[test]
    fn encoding_round_trips_pixels() {
        let img = solid_image(200, 100, 50, 4, 4);
        let b64 = encode_png_base64(&img).unwrap();
        let bytes = BASE64.decode(b64.as_bytes()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(2, 2).0, [200, 100, 50, 255]);
    }
}
