use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use imerge_core::frame::{FrameBuffer, PixelFormat};
use imerge_core::{Color, DataUri, MergeError};

pub const JPEG_MIME: &str = "image/jpeg";

/// Baseline JPEG encoder for finished surfaces.
/// JPEG carries no alpha, so the surface is flattened onto a matte first.
pub struct JpegEncoder {
    quality: u8,
    matte: Color,
}

impl JpegEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8, matte: Color) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            matte,
        }
    }

    /// Encode a frame buffer to JPEG bytes.
    pub fn encode(&self, frame: &FrameBuffer) -> Result<Vec<u8>, MergeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(MergeError::Encode(format!(
                "cannot encode an empty {}x{} surface",
                frame.width, frame.height
            )));
        }
        let expected = frame.pixel_count() * frame.format.bytes_per_pixel();
        if frame.data.len() != expected {
            return Err(MergeError::Encode(format!(
                "surface holds {} bytes, expected {} for {}x{}",
                frame.data.len(),
                expected,
                frame.width,
                frame.height
            )));
        }

        let rgb = match frame.format {
            PixelFormat::Rgb8 => frame.clone(),
            PixelFormat::Rgba8 => frame.flatten_onto(&self.matte),
        };

        let mut out = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(&rgb.data, rgb.width, rgb.height, ExtendedColorType::Rgb8)
            .map_err(|e| MergeError::Encode(format!("failed to write JPEG: {}", e)))?;

        tracing::debug!(
            "Encoded {}x{} surface to JPEG ({} bytes, quality {})",
            frame.width,
            frame.height,
            out.len(),
            self.quality
        );

        Ok(out)
    }

    /// Encode a frame buffer to a `data:image/jpeg;base64,...` URI.
    pub fn encode_data_uri(&self, frame: &FrameBuffer) -> Result<String, MergeError> {
        let bytes = self.encode(frame)?;
        Ok(DataUri::new(JPEG_MIME, bytes).to_string())
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(92, Color::BLACK)
    }
}
