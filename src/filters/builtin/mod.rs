//! Built-in filter implementations.
//!
//! This module contains the standard filters that ship with Filterkit and
//! their default category grouping.

mod blur;
mod color;
mod composite;
mod utility;

use crate::core::descriptor::Descriptor;
use crate::filters::category::{CategoryAssignment, CollectionAssignment};
use crate::filters::registry::FilterRegistry;

pub use utility::NULL_FILTER;

/// Every built-in descriptor.
pub fn descriptors() -> Vec<Descriptor> {
    let mut all = utility::descriptors();
    all.extend(color::descriptors());
    all.extend(blur::descriptors());
    all.extend(composite::descriptors());
    all
}

/// Register all built-in filters.
pub fn register_all(registry: &mut FilterRegistry) {
    for descriptor in descriptors() {
        // Rejections are logged by the registry.
        let _ = registry.register(descriptor);
    }
}

/// Default category membership of the built-ins.
pub fn default_categories() -> Vec<CategoryAssignment> {
    fn group(name: &str, title: &str, keys: &[&str]) -> CategoryAssignment {
        (
            name.to_string(),
            title.to_string(),
            keys.iter().map(|k| k.to_string()).collect(),
        )
    }

    vec![
        group("basic", "Basic", &[NULL_FILTER, "brightness", "contrast", "saturation"]),
        group("color", "Color", &["grayscale", "invert", "posterize", "sepia", "vignette"]),
        group("blur", "Blur & Sharpen", &["gaussian_blur", "sharpen"]),
        group("blend", "Blend", &["multiply_blend", "overlay_blend", "screen_blend"]),
    ]
}

/// Default collections over [`default_categories`].
pub fn default_collections() -> Vec<CollectionAssignment> {
    vec![
        (
            "essentials".to_string(),
            "Essentials".to_string(),
            vec!["basic".to_string(), "color".to_string()],
        ),
        (
            "creative".to_string(),
            "Creative".to_string(),
            vec!["blend".to_string(), "blur".to_string()],
        ),
    ]
}
