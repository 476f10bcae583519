//! Shared input image collaborator.

use crate::core::types::SharedImage;
use parking_lot::RwLock;

/// Source of the image a gallery renders from.
pub trait InputProvider: Send + Sync {
    /// The current input.
    fn current_input(&self) -> SharedImage;

    /// Size of the current input as `(width, height)`.
    fn current_input_size(&self) -> (u32, u32) {
        self.current_input().size()
    }

    /// Secondary image for blend filters, if any.
    fn current_blend(&self) -> Option<SharedImage> {
        None
    }
}

/// Input and optional blend image of one batch.
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Primary image.
    pub image: SharedImage,
    /// Secondary image for blend filters.
    pub blend: Option<SharedImage>,
}

impl BatchInput {
    /// Input without a blend image.
    pub fn new(image: SharedImage) -> Self {
        Self { image, blend: None }
    }

    /// Attach a blend image.
    pub fn with_blend(mut self, blend: SharedImage) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Read both images from a provider.
    pub fn from_provider(provider: &dyn InputProvider) -> Self {
        Self {
            image: provider.current_input(),
            blend: provider.current_blend(),
        }
    }
}

impl From<SharedImage> for BatchInput {
    fn from(image: SharedImage) -> Self {
        Self::new(image)
    }
}

/// Swappable input, for galleries whose photo changes over time.
#[derive(Debug)]
pub struct StaticInput {
    image: RwLock<SharedImage>,
    blend: RwLock<Option<SharedImage>>,
}

impl StaticInput {
    /// Start with `image` and no blend image.
    pub fn new(image: SharedImage) -> Self {
        Self {
            image: RwLock::new(image),
            blend: RwLock::new(None),
        }
    }

    /// Replace the input.
    pub fn set_input(&self, image: SharedImage) {
        *self.image.write() = image;
    }

    /// Replace the blend image.
    pub fn set_blend(&self, blend: Option<SharedImage>) {
        *self.blend.write() = blend;
    }
}

impl InputProvider for StaticInput {
    fn current_input(&self) -> SharedImage {
        self.image.read().clone()
    }

    fn current_blend(&self) -> Option<SharedImage> {
        self.blend.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    #[test]
    fn test_static_input() {
        let first = SharedImage::new(DynamicImage::ImageRgba8(RgbaImage::new(3, 2)));
        let provider = StaticInput::new(first.clone());
        assert_eq!(provider.current_input_size(), (3, 2));

        let second = SharedImage::new(DynamicImage::ImageRgba8(RgbaImage::new(1, 1)));
        provider.set_input(second.clone());
        provider.set_blend(Some(first.clone()));
        let batch = BatchInput::from_provider(&provider);
        assert_eq!(batch.image, second);
        assert_eq!(batch.blend, Some(first));
    }
}
