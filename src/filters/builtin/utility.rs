//! Utility filters.

use crate::core::descriptor::{Descriptor, FilterOperation};

/// Key of the identity filter, used to show the unmodified image.
pub const NULL_FILTER: &str = "null";

pub(super) fn descriptors() -> Vec<Descriptor> {
    vec![Descriptor::builder(NULL_FILTER, "No Filter", FilterOperation::single(|img, _| Some(img.clone())))
        .description("Pass the input through unchanged")
        .build()]
}
