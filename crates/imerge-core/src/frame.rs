use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::math::{Circle, Rect};
use crate::Color;

/// Pixel format of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (4 bytes per pixel).
    Rgba8,
    /// 8-bit RGB (3 bytes per pixel, no alpha).
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A raw raster: decoded source images and the output surface share this type.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Raw pixel data, row-major, no padding.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with zeros (transparent black).
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            data: vec![0u8; size],
            width,
            height,
            format,
        }
    }

    /// Create an RGBA frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &Color) -> Self {
        let pixel = color.to_rgba8();
        let pixel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&pixel);
        }
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Take ownership of a decoded RGBA image.
    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Copy into an `image` RGBA buffer. RGB buffers get an opaque alpha channel.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let data = match self.format {
            PixelFormat::Rgba8 => self.data.clone(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
        };
        // Buffer length always matches width * height * 4 here.
        RgbaImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Total byte size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        match self.format {
            PixelFormat::Rgba8 => Some([
                self.data[offset],
                self.data[offset + 1],
                self.data[offset + 2],
                self.data[offset + 3],
            ]),
            PixelFormat::Rgb8 => Some([
                self.data[offset],
                self.data[offset + 1],
                self.data[offset + 2],
                255,
            ]),
        }
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        self.data[offset..offset + bpp].copy_from_slice(&rgba[..bpp]);
    }

    /// Resample to exactly `width` x `height` (triangle filter).
    pub fn resized(&self, width: u32, height: u32) -> FrameBuffer {
        if width == self.width && height == self.height && self.format == PixelFormat::Rgba8 {
            return self.clone();
        }
        let scaled = imageops::resize(&self.to_rgba_image(), width, height, FilterType::Triangle);
        FrameBuffer::from_rgba_image(scaled)
    }

    /// Stretch `src` over the whole buffer, replacing the current contents.
    pub fn fill_stretched(&mut self, src: &FrameBuffer) {
        if self.width == 0 || self.height == 0 || src.width == 0 || src.height == 0 {
            return;
        }
        let scaled = src.resized(self.width, self.height);
        match self.format {
            PixelFormat::Rgba8 => self.data = scaled.data,
            PixelFormat::Rgb8 => self.composite_over(&scaled, 0, 0),
        }
    }

    /// Scale `src` into `dst` and composite it over this buffer.
    ///
    /// With a clip circle only pixels whose centers fall inside the circle are
    /// touched. Parts of `dst` outside the buffer are dropped before any
    /// resampling, so the work is bounded by the buffer size whatever `dst` is.
    pub fn draw_image(&mut self, src: &FrameBuffer, dst: Rect, clip: Option<&Circle>) {
        if dst.is_empty() || src.width == 0 || src.height == 0 {
            return;
        }
        let (dx, dy, w, h) = dst.to_pixels();
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + w as i64).min(self.width as i64);
        let y1 = (dy + h as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        if x0 == dx && y0 == dy && x1 == dx + w as i64 && y1 == dy + h as i64 {
            let scaled = src.resized(w, h);
            self.composite_over_clipped(&scaled, dx, dy, clip);
            return;
        }

        let window = src.scaled_window(
            (w, h),
            (x0 - dx, y0 - dy),
            ((x1 - x0) as u32, (y1 - y0) as u32),
        );
        self.composite_over_clipped(&window, x0, y0, clip);
    }

    /// The part of `self` scaled to `full` that lands at `offset` with size
    /// `visible`, resampled without materializing the full scaled image.
    fn scaled_window(
        &self,
        full: (u32, u32),
        offset: (i64, i64),
        visible: (u32, u32),
    ) -> FrameBuffer {
        let (left, span_w) = source_span(self.width, full.0, offset.0, visible.0);
        let (top, span_h) = source_span(self.height, full.1, offset.1, visible.1);
        let img = self.to_rgba_image();
        let cropped = imageops::crop_imm(&img, left, top, span_w, span_h).to_image();
        let scaled = imageops::resize(&cropped, visible.0, visible.1, FilterType::Triangle);
        FrameBuffer::from_rgba_image(scaled)
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy).
    pub fn composite_over(&mut self, src: &FrameBuffer, dx: i64, dy: i64) {
        self.composite_over_clipped(src, dx, dy, None);
    }

    fn composite_over_clipped(
        &mut self,
        src: &FrameBuffer,
        dx: i64,
        dy: i64,
        clip: Option<&Circle>,
    ) {
        if src.format != PixelFormat::Rgba8 {
            return;
        }

        let dst_width = self.width as i64;
        let dst_height = self.height as i64;

        let start_y = (-dy).max(0);
        let end_y = (src.height as i64).min(dst_height - dy);
        let start_x = (-dx).max(0);
        let end_x = (src.width as i64).min(dst_width - dx);

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        let bpp = self.format.bytes_per_pixel();
        let src_stride = src.width as usize * 4;
        let dst_stride = self.width as usize * bpp;

        for sy in start_y..end_y {
            let dst_y = dy + sy;
            let src_row_start = (sy as usize * src_stride) + (start_x as usize * 4);
            let dst_row_start = (dst_y as usize * dst_stride) + ((dx + start_x) as usize * bpp);
            let len = (end_x - start_x) as usize;

            let src_slice = &src.data[src_row_start..src_row_start + len * 4];
            let dst_slice = &mut self.data[dst_row_start..dst_row_start + len * bpp];

            for (i, (s, d)) in src_slice
                .chunks_exact(4)
                .zip(dst_slice.chunks_exact_mut(bpp))
                .enumerate()
            {
                if let Some(circle) = clip {
                    if !circle.covers_pixel(dx + start_x + i as i64, dst_y) {
                        continue;
                    }
                }
                blend_pixel(s, d);
            }
        }
    }

    /// Composite this buffer over an opaque matte, producing an RGB buffer.
    pub fn flatten_onto(&self, matte: &Color) -> FrameBuffer {
        let mut out = FrameBuffer::new(self.width, self.height, PixelFormat::Rgb8);
        let m = [matte.r as u32, matte.g as u32, matte.b as u32];
        for (s, d) in self
            .data
            .chunks_exact(self.format.bytes_per_pixel())
            .zip(out.data.chunks_exact_mut(3))
        {
            let a = if self.format == PixelFormat::Rgba8 { s[3] as u32 } else { 255 };
            let inv = 255 - a;
            for c in 0..3 {
                d[c] = ((s[c] as u32 * a + m[c] * inv + 127) / 255) as u8;
            }
        }
        out
    }
}

/// Source pixels `[start, start + len)` covering destination pixels
/// `[offset, offset + visible)` when `src_len` is stretched to `full_len`.
/// Always at least one pixel wide.
fn source_span(src_len: u32, full_len: u32, offset: i64, visible: u32) -> (u32, u32) {
    let ratio = src_len as f64 / full_len as f64;
    let start = ((offset as f64 * ratio).floor() as u32).min(src_len - 1);
    let end = (((offset + visible as i64) as f64) * ratio).ceil() as u32;
    let end = end.clamp(start + 1, src_len);
    (start, end - start)
}

/// Source-over blend of one straight-alpha RGBA pixel into an RGBA or RGB pixel.
fn blend_pixel(s: &[u8], d: &mut [u8]) {
    let sa = s[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        d[..3].copy_from_slice(&s[..3]);
        if d.len() == 4 {
            d[3] = 255;
        }
        return;
    }

    let da = if d.len() == 4 { d[3] as u32 } else { 255 };
    let inv_sa = 255 - sa;
    let out_a = sa + ((da * inv_sa) / 255);
    if out_a == 0 {
        return;
    }

    for c in 0..3 {
        let v = (s[c] as u32 * sa * 255 + d[c] as u32 * da * inv_sa) / (out_a * 255);
        d[c] = v as u8;
    }
    if d.len() == 4 {
        d[3] = out_a as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_new() {
        let fb = FrameBuffer::new(800, 400, PixelFormat::Rgba8);
        assert_eq!(fb.width, 800);
        assert_eq!(fb.height, 400);
        assert_eq!(fb.byte_size(), 800 * 400 * 4);
        assert_eq!(fb.pixel_count(), 800 * 400);
    }

    #[test]
    fn test_frame_buffer_get_set_pixel() {
        let mut fb = FrameBuffer::new(10, 10, PixelFormat::Rgba8);
        fb.set_pixel(5, 5, [128, 64, 32, 255]);
        assert_eq!(fb.get_pixel(5, 5), Some([128, 64, 32, 255]));
        assert_eq!(fb.get_pixel(10, 0), None);
    }

    #[test]
    fn test_composite_over_opaque() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.composite_over(&src, 1, 1);
        assert_eq!(dst.get_pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(0, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_composite_over_semi_transparent() {
        let mut dst = FrameBuffer::solid(2, 2, &Color::WHITE);
        let mut src = FrameBuffer::new(1, 1, PixelFormat::Rgba8);
        src.set_pixel(0, 0, [255, 0, 0, 128]);

        dst.composite_over(&src, 0, 0);

        let pixel = dst.get_pixel(0, 0).unwrap();
        assert!(pixel[0] > 200);
        assert!(pixel[1] > 50 && pixel[1] < 200);
        assert!(pixel[2] > 50 && pixel[2] < 200);
    }

    #[test]
    fn test_composite_over_negative_offset_clips() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(3, 3, &Color::RED);
        dst.composite_over(&src, -2, -2);
        assert_eq!(dst.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(1, 1), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_draw_image_scales_into_rect() {
        let mut dst = FrameBuffer::solid(20, 20, &Color::BLUE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.draw_image(&src, Rect::new(5.0, 5.0, 10.0, 4.0), None);
        assert_eq!(dst.get_pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(14, 8), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(15, 8), Some([0, 0, 255, 255]));
        assert_eq!(dst.get_pixel(14, 9), Some([0, 0, 255, 255]));
        assert_eq!(dst.get_pixel(4, 5), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_draw_image_circle_clip() {
        let mut dst = FrameBuffer::solid(40, 40, &Color::BLUE);
        let src = FrameBuffer::solid(8, 8, &Color::RED);
        let circle = Circle::inscribed_at(10.0, 10.0, 10.0);
        dst.draw_image(&src, circle.bounds(), Some(&circle));
        // center of the circle is painted
        assert_eq!(dst.get_pixel(20, 20), Some([255, 0, 0, 255]));
        // corners of the bounding square are not
        assert_eq!(dst.get_pixel(10, 10), Some([0, 0, 255, 255]));
        assert_eq!(dst.get_pixel(29, 29), Some([0, 0, 255, 255]));
        assert_eq!(dst.get_pixel(10, 29), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_draw_image_offscreen_is_noop() {
        let mut dst = FrameBuffer::solid(10, 10, &Color::BLUE);
        let before = dst.data.clone();
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.draw_image(&src, Rect::new(50.0, 50.0, 10.0, 10.0), None);
        dst.draw_image(&src, Rect::new(2.0, 2.0, 0.2, 10.0), None);
        assert_eq!(dst.data, before);
    }

    #[test]
    fn test_draw_image_oversized_rect_only_resamples_visible_part() {
        let mut dst = FrameBuffer::solid(16, 8, &Color::BLUE);
        let src = FrameBuffer::solid(4, 4, &Color::RED);
        dst.draw_image(&src, Rect::new(0.0, 0.0, 1e9, 1e9), None);
        assert!(dst.data.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn test_draw_image_partially_offscreen() {
        let mut dst = FrameBuffer::solid(10, 10, &Color::BLUE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.draw_image(&src, Rect::new(-5.0, 6.0, 10.0, 10.0), None);
        assert_eq!(dst.get_pixel(0, 6), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(4, 9), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(5, 9), Some([0, 0, 255, 255]));
        assert_eq!(dst.get_pixel(0, 5), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_source_span_stays_inside_source() {
        assert_eq!(source_span(10, 20, 0, 20), (0, 10));
        assert_eq!(source_span(10, 20, 4, 6), (2, 3));
        assert_eq!(source_span(4, 1_000_000_000, 0, 16), (0, 1));
        assert_eq!(source_span(4, 8, 7, 1), (3, 1));
    }

    #[test]
    fn test_fill_stretched_covers_everything() {
        let mut dst = FrameBuffer::new(16, 8, PixelFormat::Rgba8);
        let src = FrameBuffer::solid(3, 5, &Color::GREEN);
        dst.fill_stretched(&src);
        assert!(dst.data.chunks_exact(4).all(|p| p == [0, 255, 0, 255]));
    }

    #[test]
    fn test_flatten_onto_matte() {
        let mut fb = FrameBuffer::new(2, 1, PixelFormat::Rgba8);
        fb.set_pixel(0, 0, [255, 0, 0, 255]);
        let flat = fb.flatten_onto(&Color::WHITE);
        assert_eq!(flat.format, PixelFormat::Rgb8);
        assert_eq!(flat.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(flat.get_pixel(1, 0), Some([255, 255, 255, 255]));
    }
}
