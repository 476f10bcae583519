//! # Filterkit - Filter Catalog and Thumbnail Render Cache
//!
//! Filterkit keeps a catalog of named, parameterized image filters grouped
//! into categories, and renders live thumbnail galleries of them in the
//! background without blocking the UI thread.
//!
//! ## Features
//!
//! - **Filter Catalog**: Unique-keyed registry of descriptors plus sorted categories
//! - **Selection State**: Current collection/category/filter, favourites and persistent per-filter flags
//! - **Render Cache**: Rendered images, reusable display buffers and descriptor lookups per view
//! - **Cancellable Loading**: Generation-tagged batches; superseded work is never observed
//! - **Presets and Lookups**: Extra filters manufactured from JSON presets and tone curves
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filterkit::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(Catalog::with_builtins());
//! let selection = Arc::new(SelectionState::in_memory(catalog.clone()));
//! let input = Arc::new(StaticInput::new(SharedImage::open("photo.jpg")?));
//!
//! let gallery = FilterGallery::new(catalog, selection, input, &GalleryConfig::default())?;
//! let events = gallery.subscribe();
//! gallery.show_category("color");
//!
//! // On the UI thread:
//! gallery.dispatch();
//! for event in events.drain() {
//!     if let GalleryEvent::ItemReady { key } = event {
//!         let thumbnail = gallery.thumbnail(&key);
//!         // Update that one cell...
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Shared images, descriptors, parameters, events and errors
//! - [`filters`]: Registry, categories, catalog files, presets and built-in filters
//! - [`selection`]: Selection state and the settings store it persists to
//! - [`render`]: Render cache, display resources and the async loader
//! - [`gallery`]: Facade tying a catalog, a selection and a loader together
//! - [`config`]: TOML gallery configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod filters;
pub mod gallery;
pub mod render;
pub mod selection;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use filterkit::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{Color, ImageId, SharedImage, ViewId};
    pub use crate::core::parameter::{ParameterDefinition, ParameterKind, ParameterSet, ParameterValue};
    pub use crate::core::descriptor::{Descriptor, DescriptorBuilder, FilterKind, FilterOperation};
    pub use crate::core::events::{Broadcaster, SubscriberId, Subscription};

    // Errors
    pub use crate::core::error::{
        CatalogError, ConfigError, FilterKitError, PresetError, Result, StoreError,
    };

    // Filters
    pub use crate::filters::registry::{FilterRegistry, Registration};
    pub use crate::filters::category::{Category, CategoryIndex, Collection};
    pub use crate::filters::catalog::{Catalog, CatalogFile};
    pub use crate::filters::preset::{PresetAdjustments, PresetSource};
    pub use crate::filters::lookup::ToneLookup;
    pub use crate::filters::builtin::NULL_FILTER;

    // Selection
    pub use crate::selection::state::{SelectionEvent, SelectionState, FAVOURITES_CATEGORY};
    pub use crate::selection::store::{JsonFileStore, MemoryStore, SettingsStore};

    // Rendering
    pub use crate::render::cache::{CacheStats, RenderCache};
    pub use crate::render::resource::DisplayResource;
    pub use crate::render::progress::{BatchSummary, Generation, LoaderEvent, RenderSource, SkipReason};
    pub use crate::render::input::{BatchInput, InputProvider, StaticInput};
    pub use crate::render::loader::{AsyncFilterLoader, CategoryChangePolicy, LoaderOptions, LoaderState};

    // Gallery
    pub use crate::gallery::{FilterGallery, GalleryEvent};
    pub use crate::config::GalleryConfig;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "filterkit");
    }

    #[test]
    fn test_category_scenario() {
        let catalog = Arc::new(Catalog::new());
        for key in ["C", "A", "B"] {
            let op = FilterOperation::single(|img, _| Some(img.clone()));
            catalog.register(Descriptor::builder(key, key, op).build()).unwrap();
            catalog.add_member("x", key);
        }
        let selection = SelectionState::in_memory(catalog.clone());
        assert!(selection.set_category("x"));
        assert_eq!(selection.current_filter().as_deref(), Some("A"));
        assert_eq!(catalog.filters("x"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_builtin_categories_are_consistent() {
        let catalog = Catalog::with_builtins();
        for category in catalog.categories() {
            for key in category.members() {
                assert!(catalog.lookup(key).is_some(), "{} in {}", key, category.name);
            }
        }
        assert!(catalog.contains(NULL_FILTER));
    }
}
