use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use uuid::Uuid;

pub const BYTES_PER_PIXEL: usize = 4;

/// Channel order of a 4-byte pixel, as declared by the capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    #[default]
    Bgra,
    Rgba,
}

impl PixelLayout {
    /// Byte offsets of (red, green, blue, alpha) inside one pixel.
    pub fn offsets(self) -> (usize, usize, usize, usize) {
        match self {
            PixelLayout::Bgra => (2, 1, 0, 3),
            PixelLayout::Rgba => (0, 1, 2, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub frame_id: Uuid,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        layout: PixelLayout,
        pixels: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            width,
            height,
            stride,
            layout,
            pixels,
            captured_at,
            frame_id: Uuid::new_v4(),
        }
    }

    /// A tightly packed frame where every pixel has the same color.
    pub fn solid(width: u32, height: u32, layout: PixelLayout, rgb: [u8; 3]) -> Self {
        let (r, g, b, a) = layout.offsets();
        let mut pixel = [0u8; BYTES_PER_PIXEL];
        pixel[r] = rgb[0];
        pixel[g] = rgb[1];
        pixel[b] = rgb[2];
        pixel[a] = u8::MAX;
        let pixels = pixel.repeat(width as usize * height as usize);
        Self::new(
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            layout,
            pixels,
            Utc::now(),
        )
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |reason| PipelineError::InvalidFrame {
            width: self.width,
            height: self.height,
            stride: self.stride,
            len: self.pixels.len(),
            reason,
        };

        if self.width == 0 || self.height == 0 {
            return Err(invalid("zero-sized frame"));
        }
        if self.stride < self.row_bytes() {
            return Err(invalid("stride shorter than a row of pixels"));
        }
        let required = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|rows| rows.checked_add(self.row_bytes()))
            .ok_or_else(|| invalid("declared dimensions overflow"))?;
        if self.pixels.len() < required {
            return Err(invalid("buffer shorter than declared dimensions"));
        }
        Ok(())
    }

    /// Red, green and blue of the pixel at (x, y). Callers must have validated the frame.
    #[inline]
    pub fn pixel_rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let (r, g, b, _) = self.layout.offsets();
        let index = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        (
            self.pixels[index + r],
            self.pixels[index + g],
            self.pixels[index + b],
        )
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage, PipelineError> {
        self.validate()?;
        let mut image = RgbaImage::new(self.width, self.height);
        let (r, g, b, a) = self.layout.offsets();
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let index = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
            pixel.0 = [
                self.pixels[index + r],
                self.pixels[index + g],
                self.pixels[index + b],
                self.pixels[index + a],
            ];
        }
        Ok(image)
    }

    pub fn from_rgba_image(image: &RgbaImage, layout: PixelLayout) -> Self {
        let (width, height) = image.dimensions();
        let (r, g, b, a) = layout.offsets();
        let mut pixels = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
        for (chunk, pixel) in pixels.chunks_exact_mut(BYTES_PER_PIXEL).zip(image.pixels()) {
            chunk[r] = pixel[0];
            chunk[g] = pixel[1];
            chunk[b] = pixel[2];
            chunk[a] = pixel[3];
        }
        Self::new(
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            layout,
            pixels,
            Utc::now(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn zero_sized_frame_is_invalid() {
        let frame = Frame::new(0, 480, 0, PixelLayout::Bgra, vec![], Utc::now());
        assert!(matches!(
            frame.validate(),
            Err(PipelineError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn short_buffer_is_invalid() {
        let frame = Frame::new(4, 4, 16, PixelLayout::Bgra, vec![0; 40], Utc::now());
        assert!(frame.validate().is_err());
    }

    #[test]
    fn oversized_stride_is_invalid_not_a_panic() {
        let frame = Frame::new(
            1,
            3,
            usize::MAX / 2 + 1,
            PixelLayout::Bgra,
            vec![0; 4],
            Utc::now(),
        );
        assert!(matches!(
            frame.validate(),
            Err(PipelineError::InvalidFrame {
                reason: "declared dimensions overflow",
                ..
            })
        ));
    }

    #[test]
    fn padded_stride_is_accepted() {
        // last row does not need trailing padding
        let frame = Frame::new(2, 2, 12, PixelLayout::Rgba, vec![0; 20], Utc::now());
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn bgra_channels_are_read_in_declared_order() {
        let frame = Frame::solid(2, 2, PixelLayout::Bgra, [10, 20, 30]);
        assert_eq!(&frame.pixels[0..4], &[30, 20, 10, 255]);
        assert_eq!(frame.pixel_rgb(1, 1), (10, 20, 30));
    }

    #[test]
    fn rgba_image_conversion_respects_layout() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(2, 1, Rgba([1, 2, 3, 4]));
        let frame = Frame::from_rgba_image(&image, PixelLayout::Bgra);
        assert_eq!(frame.pixel_rgb(2, 1), (1, 2, 3));

        let back = frame.to_rgba_image().unwrap();
        assert_eq!(back.get_pixel(2, 1), &Rgba([1, 2, 3, 4]));
    }
}
