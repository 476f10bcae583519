//! Render cache for one gallery view.
//!
//! Three maps share the filter-key space:
//! - rendered images, valid only for the currently bound input image
//! - reusable display resources, recycled across reloads
//! - memoized descriptor lookups
//!
//! Every map sits behind its own lock so the background loader can write
//! while the UI thread reads. The bound input and the image map are always
//! locked in that order, which keeps a result rendered against an old input
//! from slipping in after an invalidation.

use crate::core::descriptor::Descriptor;
use crate::core::types::{ImageId, SharedImage, ViewId};
use crate::filters::catalog::Catalog;
use crate::render::resource::{DisplayResource, ResourceUse};
use image::DynamicImage;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, trace, warn};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound on the rendered-image map.
pub const DEFAULT_IMAGE_CAPACITY: usize = 256;

/// A rendered image with the input it was computed from.
#[derive(Debug, Clone)]
pub struct RenderedEntry {
    /// The rendering.
    pub image: SharedImage,
    /// Input image the rendering belongs to.
    pub input: ImageId,
    /// How long the transform took.
    pub render_time: Duration,
    /// When the entry was stored.
    pub created_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of image cache hits.
    pub hits: u64,
    /// Number of image cache misses.
    pub misses: u64,
    /// Number of images evicted by the capacity bound.
    pub evictions: u64,
    /// Number of full invalidations.
    pub invalidations: u64,
    /// Results refused because they belonged to an old input.
    pub stale_rejected: u64,
    /// Display buffers allocated.
    pub resource_allocations: u64,
    /// Display buffers reused.
    pub resource_reuses: u64,
    /// Total render time saved by hits.
    pub time_saved: Duration,
}

impl CacheStats {
    /// Calculate hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Thread-safe render cache.
pub struct RenderCache {
    view: ViewId,
    input: RwLock<Option<ImageId>>,
    images: Mutex<LruCache<String, RenderedEntry>>,
    resources: RwLock<HashMap<String, Arc<Mutex<DisplayResource>>>>,
    descriptors: RwLock<HashMap<String, Arc<Descriptor>>>,
    locks: Mutex<HashMap<String, usize>>,
    stats: Mutex<CacheStats>,
}

impl RenderCache {
    /// Create a cache holding at most `capacity` rendered images.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            view: ViewId::new(),
            input: RwLock::new(None),
            images: Mutex::new(LruCache::new(capacity)),
            resources: RwLock::new(HashMap::new()),
            descriptors: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// View this cache belongs to.
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Bind the input image renderings are computed from.
    ///
    /// Binding a different image invalidates every rendered image. Returns
    /// whether the binding changed.
    pub fn bind_input(&self, input: &SharedImage) -> bool {
        let mut bound = self.input.write();
        if *bound == Some(input.id()) {
            return false;
        }
        *bound = Some(input.id());
        self.clear_images();
        debug!("[{}] bound input {}", self.view, input.id());
        true
    }

    /// Currently bound input.
    pub fn bound_input(&self) -> Option<ImageId> {
        *self.input.read()
    }

    /// Drop every rendered image and unbind the input. Resources and
    /// descriptors stay.
    ///
    /// Renderings still in flight were started against the old binding, so
    /// they are refused until the next [`bind_input`](Self::bind_input).
    pub fn invalidate_all(&self) {
        let mut bound = self.input.write();
        *bound = None;
        self.clear_images();
        debug!("[{}] invalidated, input unbound", self.view);
    }

    fn clear_images(&self) {
        self.images.lock().clear();
        self.stats.lock().invalidations += 1;
    }

    /// Rendered image for `key`, if one exists for the bound input.
    pub fn get_image(&self, key: &str) -> Option<SharedImage> {
        let bound = *self.input.read();
        let mut images = self.images.lock();
        let mut stats = self.stats.lock();
        match images.get(key) {
            Some(entry) if Some(entry.input) == bound => {
                stats.hits += 1;
                stats.time_saved += entry.render_time;
                Some(entry.image.clone())
            }
            _ => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Whether a rendered image exists for `key`. Does not touch statistics
    /// or recency.
    pub fn contains_image(&self, key: &str) -> bool {
        self.images.lock().contains(key)
    }

    /// Store a rendering of `key` computed from `input`.
    ///
    /// Refused (returns `false`) when `input` is not the bound input.
    pub fn put_image(&self, key: &str, image: SharedImage, input: ImageId, render_time: Duration) -> bool {
        let bound = self.input.read();
        if *bound != Some(input) {
            self.stats.lock().stale_rejected += 1;
            trace!("[{}] refused stale rendering of '{}' from {}", self.view, key, input);
            return false;
        }
        let entry = RenderedEntry {
            image,
            input,
            render_time,
            created_at: Instant::now(),
        };
        if let Some((evicted, _)) = self.images.lock().push(key.to_string(), entry) {
            if evicted != key {
                self.stats.lock().evictions += 1;
            }
        }
        true
    }

    /// Remove one rendered image.
    pub fn remove_image(&self, key: &str) -> bool {
        self.images.lock().pop(key).is_some()
    }

    /// Keys with a rendered image, most recently used first.
    pub fn image_keys(&self) -> Vec<String> {
        self.images.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Every key with an image, a resource or a memoized descriptor.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.images.lock().iter().map(|(k, _)| k.clone()).collect();
        keys.extend(self.resources.read().keys().cloned());
        keys.extend(self.descriptors.read().keys().cloned());
        keys.sort();
        keys.dedup();
        keys
    }

    /// Copy a rendering into the display resource of `key`, creating the
    /// resource on first use.
    pub fn present(&self, key: &str, image: &DynamicImage) -> Arc<Mutex<DisplayResource>> {
        let resource = self.resource_or_insert(key);
        let usage = resource.lock().present(image);
        let mut stats = self.stats.lock();
        match usage {
            ResourceUse::Reused => stats.resource_reuses += 1,
            ResourceUse::Allocated => stats.resource_allocations += 1,
        }
        resource
    }

    fn resource_or_insert(&self, key: &str) -> Arc<Mutex<DisplayResource>> {
        if let Some(existing) = self.resources.read().get(key) {
            return Arc::clone(existing);
        }
        // Empty until the first present sizes it.
        let mut resources = self.resources.write();
        let entry = resources
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DisplayResource::new(key, 0, 0))));
        Arc::clone(entry)
    }

    /// Like [`present`](Self::present), but only while `input` is still the
    /// bound input. Keeps a superseded batch from overwriting a cell that a
    /// newer input already filled.
    pub fn present_for(
        &self,
        key: &str,
        image: &DynamicImage,
        input: ImageId,
    ) -> Option<Arc<Mutex<DisplayResource>>> {
        let bound = self.input.read();
        if *bound != Some(input) {
            self.stats.lock().stale_rejected += 1;
            return None;
        }
        Some(self.present(key, image))
    }

    /// Display resource of `key`, if allocated.
    pub fn resource(&self, key: &str) -> Option<Arc<Mutex<DisplayResource>>> {
        self.resources.read().get(key).cloned()
    }

    /// Memoized descriptor of `key`, if cached.
    pub fn descriptor(&self, key: &str) -> Option<Arc<Descriptor>> {
        self.descriptors.read().get(key).cloned()
    }

    /// Memoized descriptor lookup, falling back to the catalog.
    ///
    /// An unregister that purges `key` between the catalog lookup and the
    /// memo insert is caught by looking the key up again afterwards; the
    /// memo only keeps a descriptor the catalog still holds.
    pub fn descriptor_or_lookup(&self, key: &str, catalog: &Catalog) -> Option<Arc<Descriptor>> {
        if let Some(found) = self.descriptor(key) {
            return Some(found);
        }
        let found = catalog.lookup(key)?;
        self.descriptors
            .write()
            .insert(key.to_string(), Arc::clone(&found));
        let still_registered = catalog.lookup(key).map_or(false, |d| Arc::ptr_eq(&d, &found));
        if !still_registered {
            let mut descriptors = self.descriptors.write();
            if descriptors.get(key).map_or(false, |d| Arc::ptr_eq(d, &found)) {
                descriptors.remove(key);
            }
            trace!("[{}] '{}' was unregistered during lookup", self.view, key);
            return None;
        }
        Some(found)
    }

    /// Release everything cached for `key` unless it is locked.
    pub fn release(&self, key: &str) -> bool {
        if self.is_locked(key) {
            debug!("[{}] '{}' is locked, not releasing", self.view, key);
            return false;
        }
        self.remove_all(key);
        true
    }

    /// Remove everything cached for `key`, locked or not. Used when the
    /// filter itself goes away.
    pub fn purge(&self, key: &str) {
        self.locks.lock().remove(key);
        self.remove_all(key);
    }

    fn remove_all(&self, key: &str) {
        self.images.lock().pop(key);
        self.resources.write().remove(key);
        self.descriptors.write().remove(key);
    }

    /// Pin `key` so that [`release`](Self::release) leaves it alone.
    /// Locks nest.
    pub fn lock(&self, key: &str) {
        *self.locks.lock().entry(key.to_string()).or_insert(0) += 1;
    }

    /// Undo one [`lock`](Self::lock). Returns `false` if `key` was not
    /// locked.
    pub fn unlock(&self, key: &str) -> bool {
        let mut locks = self.locks.lock();
        match locks.get_mut(key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                locks.remove(key);
                true
            }
            None => {
                warn!("[{}] unlock of '{}' without a matching lock", self.view, key);
                false
            }
        }
    }

    /// Whether `key` is locked.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.lock().contains_key(key)
    }

    /// Drop everything, including locks and the input binding.
    pub fn reset(&self) {
        let mut bound = self.input.write();
        *bound = None;
        self.clear_images();
        self.resources.write().clear();
        self.descriptors.write().clear();
        self.locks.lock().clear();
        debug!("[{}] reset", self.view);
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Number of rendered images.
    pub fn image_count(&self) -> usize {
        self.images.lock().len()
    }

    /// Number of allocated display resources.
    pub fn resource_count(&self) -> usize {
        self.resources.read().len()
    }

    /// Number of memoized descriptors.
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.read().len()
    }

    /// Approximate bytes held by rendered images.
    pub fn memory_usage(&self) -> usize {
        self.images
            .lock()
            .iter()
            .map(|(_, e)| e.image.estimated_memory_size())
            .sum()
    }

    /// PNG thumbnail of the rendered image for `key` as a `data:` URI.
    pub fn encoded_thumbnail(&self, key: &str, max_size: u32) -> Option<String> {
        let image = self.images.lock().peek(key).map(|e| e.image.clone())?;
        let thumbnail = image.image().thumbnail(max_size.max(1), max_size.max(1));
        let mut buffer = Cursor::new(Vec::new());
        if let Err(e) = thumbnail.write_to(&mut buffer, image::ImageFormat::Png) {
            warn!("[{}] failed to encode thumbnail for '{}': {}", self.view, key, e);
            return None;
        }
        Some(format!("data:image/png;base64,{}", BASE64.encode(buffer.into_inner())))
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_CAPACITY)
    }
}
