//! Core value types shared by the catalog, the caches and the loader.
//!
//! Images are stored behind `Arc` so one decoded input can be handed to every
//! transform of a batch without copying. Each distinct image gets an
//! [`ImageId`]; the render cache uses it to decide whether a rendered result
//! is still valid for the current input.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one image value.
///
/// Two `SharedImage`s compare equal only when they were created from the same
/// allocation; re-wrapping identical pixels yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(u64);

impl ImageId {
    fn next() -> Self {
        Self(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img#{}", self.0)
    }
}

/// Cheaply clonable, immutable image handle.
#[derive(Debug, Clone)]
pub struct SharedImage {
    id: ImageId,
    data: Arc<DynamicImage>,
}

impl SharedImage {
    /// Wrap a decoded image, assigning it a fresh identity.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            id: ImageId::next(),
            data: Arc::new(image),
        }
    }

    /// Load an image from disk.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::open(path)?))
    }

    /// Identity of this image.
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Borrow the pixel data.
    pub fn image(&self) -> &DynamicImage {
        &self.data
    }

    /// Dimensions as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.data.width(), self.data.height())
    }

    /// Whether both handles hold bit-identical pixels.
    pub fn same_pixels(&self, other: &SharedImage) -> bool {
        self.size() == other.size()
            && self.data.color() == other.data.color()
            && self.data.as_bytes() == other.data.as_bytes()
    }

    /// Approximate memory footprint in bytes.
    pub fn estimated_memory_size(&self) -> usize {
        self.data.as_bytes().len()
    }
}

impl PartialEq for SharedImage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SharedImage {}

impl From<DynamicImage> for SharedImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Identifier of one consuming view (a gallery instance).
///
/// Render caches are scoped per view; the id only shows up in logs and
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub Uuid);

impl ViewId {
    /// Create a new random view ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// RGBA color value used by color parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color from RGBA components.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from RGB components (alpha = 255).
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(value: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([value, value, value, 255])))
    }

    #[test]
    fn test_ids_are_unique() {
        let a = SharedImage::new(solid(10));
        let b = SharedImage::new(solid(10));
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert!(a.same_pixels(&b));
    }

    #[test]
    fn test_clone_keeps_identity() {
        let a = SharedImage::new(solid(10));
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.size(), (4, 4));
    }

    #[test]
    fn test_different_pixels() {
        let a = SharedImage::new(solid(10));
        let b = SharedImage::new(solid(11));
        assert!(!a.same_pixels(&b));
        assert_eq!(a.estimated_memory_size(), 4 * 4 * 4);
    }

    #[test]
    fn test_view_id_display() {
        let id = ViewId::new();
        assert_eq!(id.to_string().len(), 8);
    }
}
