//! Reusable display resources.
//!
//! A gallery cell keeps one RGBA buffer per filter key. Reloading the same
//! key copies the new rendering into the existing buffer; the buffer is only
//! reallocated when the rendering size changes.

use image::{DynamicImage, RgbaImage};

/// Outcome of [`DisplayResource::present`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUse {
    /// The existing buffer was reused.
    Reused,
    /// The buffer had to be (re)allocated.
    Allocated,
}

/// Pre-allocated, display-ready pixel buffer for one filter key.
#[derive(Debug, Clone)]
pub struct DisplayResource {
    key: String,
    buffer: RgbaImage,
    presented: u64,
}

impl DisplayResource {
    /// Allocate a resource of the given size.
    pub fn new(key: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            key: key.into(),
            buffer: RgbaImage::new(width, height),
            presented: 0,
        }
    }

    /// Filter key this resource displays.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current buffer size.
    pub fn size(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Resize the buffer. Returns `true` when a new allocation was needed.
    /// Contents are cleared either way.
    pub fn set_image_size(&mut self, width: u32, height: u32) -> bool {
        if self.buffer.dimensions() == (width, height) {
            self.clear();
            return false;
        }
        self.buffer = RgbaImage::new(width, height);
        true
    }

    /// Copy a rendering into the buffer.
    pub fn present(&mut self, image: &DynamicImage) -> ResourceUse {
        let usage = if self.set_image_size(image.width(), image.height()) {
            ResourceUse::Allocated
        } else {
            ResourceUse::Reused
        };
        match image.as_rgba8() {
            Some(rgba) => self.buffer.copy_from_slice(rgba.as_raw()),
            None => self.buffer.copy_from_slice(image.to_rgba8().as_raw()),
        }
        self.presented += 1;
        usage
    }

    /// Fill with transparent black (the placeholder look).
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    /// The displayed pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.buffer
    }

    /// How many renderings have been presented.
    pub fn presented_count(&self) -> u64 {
        self.presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    #[test]
    fn test_reuse_when_size_matches() {
        let mut res = DisplayResource::new("sepia", 2, 2);
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255])));
        assert_eq!(res.present(&img), ResourceUse::Reused);
        assert_eq!(res.pixels().get_pixel(1, 1), &Rgba([9, 8, 7, 255]));
        assert_eq!(res.presented_count(), 1);
    }

    #[test]
    fn test_reallocate_on_new_size() {
        let mut res = DisplayResource::new("sepia", 2, 2);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 1, Rgb([1, 2, 3])));
        assert_eq!(res.present(&img), ResourceUse::Allocated);
        assert_eq!(res.size(), (3, 1));
        assert_eq!(res.pixels().get_pixel(2, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_clear() {
        let mut res = DisplayResource::new("x", 1, 1);
        res.present(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([5, 5, 5, 5]))));
        res.clear();
        assert_eq!(res.pixels().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }
}
