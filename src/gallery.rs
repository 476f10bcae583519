//! Gallery facade.
//!
//! Wires the catalog, selection state, render cache and loader together the
//! way a thumbnail gallery uses them: pick a category, render its shown
//! filters against the current input, and redo that when the input changes.
//! Loader callbacks are republished as [`GalleryEvent`]s so any number of
//! views can observe them.

use crate::config::GalleryConfig;
use crate::core::error::Result;
use crate::core::events::{Broadcaster, SubscriberId, Subscription};
use crate::core::types::SharedImage;
use crate::filters::catalog::Catalog;
use crate::render::cache::RenderCache;
use crate::render::input::InputProvider;
use crate::render::loader::{AsyncFilterLoader, CategoryChangePolicy, LoaderState};
use crate::render::progress::{BatchSummary, Generation, LoaderEvent};
use crate::selection::state::SelectionState;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Notification for gallery views.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
    /// A thumbnail is ready in the cache.
    ItemReady { key: String },
    /// Every shown filter of the batch has been attempted.
    BatchComplete { summary: BatchSummary },
}

/// One gallery view over a shared catalog and selection.
pub struct FilterGallery {
    catalog: Arc<Catalog>,
    selection: Arc<SelectionState>,
    input: Arc<dyn InputProvider>,
    loader: AsyncFilterLoader,
    policy: CategoryChangePolicy,
    events: Arc<Broadcaster<GalleryEvent>>,
}

impl FilterGallery {
    /// Create a gallery with its own render cache.
    pub fn new(
        catalog: Arc<Catalog>,
        selection: Arc<SelectionState>,
        input: Arc<dyn InputProvider>,
        config: &GalleryConfig,
    ) -> Result<Self> {
        let cache = Arc::new(RenderCache::new(config.image_capacity()));
        let options = config.loader_options();
        let policy = options.category_policy;
        let loader = AsyncFilterLoader::new(Arc::clone(&catalog), cache, options)?;
        Ok(Self {
            catalog,
            selection,
            input,
            loader,
            policy,
            events: Arc::new(Broadcaster::new()),
        })
    }

    /// Show `category`: select it, apply the category change policy and
    /// start rendering its shown filters.
    pub fn show_category(&self, category: &str) -> Generation {
        if self.selection.set_category(category) && self.policy == CategoryChangePolicy::Evict {
            self.loader.cache().invalidate_all();
        }
        self.reload()
    }

    /// Show `collection`: select it and its first category, then render as
    /// [`show_category`](Self::show_category) does.
    pub fn show_collection(&self, collection: &str) -> Generation {
        let before = self.selection.current_category();
        self.selection.set_collection(collection);
        if self.selection.current_category() != before && self.policy == CategoryChangePolicy::Evict {
            self.loader.cache().invalidate_all();
        }
        self.reload()
    }

    /// Render the shown filters of the current category again. Keys that
    /// are still cached for the current input are not recomputed.
    pub fn reload(&self) -> Generation {
        let keys = self
            .selection
            .current_category()
            .map(|category| self.selection.shown_filters(&category))
            .unwrap_or_default();

        let ready = Arc::clone(&self.events);
        let complete = Arc::clone(&self.events);
        self.loader.load_current(
            self.input.as_ref(),
            keys,
            move |key| ready.publish(GalleryEvent::ItemReady { key: key.to_string() }),
            move |summary| complete.publish(GalleryEvent::BatchComplete { summary }),
        )
    }

    /// The input image changed: drop every thumbnail and render again.
    pub fn input_changed(&self) -> Generation {
        self.loader.cache().invalidate_all();
        self.reload()
    }

    /// The gallery is going away: cancel the batch and release its
    /// thumbnails. Returns how many keys were released.
    pub fn dismiss(&self) -> usize {
        let released = self.loader.unload_all();
        info!("[{}] dismissed, released {} filters", self.loader.cache().view(), released);
        released
    }

    /// Deliver pending loader callbacks. Call from the UI context.
    pub fn dispatch(&self) -> Vec<LoaderEvent> {
        self.loader.dispatch()
    }

    /// Dispatch until the current batch completes or `timeout` elapses.
    pub fn run_until_idle(&self, timeout: Duration) -> bool {
        self.loader.run_until_idle(timeout)
    }

    /// Whether a batch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loader.state() != LoaderState::Idle
    }

    /// Rendered thumbnail of `key` for the current input.
    pub fn thumbnail(&self, key: &str) -> Option<SharedImage> {
        self.loader.cache().get_image(key)
    }

    /// Thumbnail of the current filter, if rendered.
    pub fn current_thumbnail(&self) -> Option<SharedImage> {
        self.selection.current_filter().and_then(|key| self.thumbnail(&key))
    }

    /// Observe gallery events.
    pub fn subscribe(&self) -> Subscription<GalleryEvent> {
        self.events.subscribe()
    }

    /// Stop observing.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Catalog shown by this gallery.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Shared selection state.
    pub fn selection(&self) -> &Arc<SelectionState> {
        &self.selection
    }

    /// Render cache of this gallery.
    pub fn cache(&self) -> &Arc<RenderCache> {
        self.loader.cache()
    }

    /// Loader of this gallery.
    pub fn loader(&self) -> &AsyncFilterLoader {
        &self.loader
    }
}
