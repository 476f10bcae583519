//! Rendering side of a gallery: the per-view render cache, display
//! resources, and the cancellable background loader that fills them.

pub mod cache;
pub mod resource;
pub mod progress;
pub mod input;
pub mod loader;

pub use cache::{CacheStats, RenderCache, RenderedEntry, DEFAULT_IMAGE_CAPACITY};
pub use resource::{DisplayResource, ResourceUse};
pub use progress::{
    BatchSummary, BatchTracker, Generation, GenerationToken, LoaderEvent, RenderSource, SkipReason,
};
pub use input::{BatchInput, InputProvider, StaticInput};
pub use loader::{
    AsyncFilterLoader, CategoryChangePolicy, CompleteHandler, ItemHandler, LoaderOptions, LoaderState,
    MAX_WORKERS,
};
