//! Filter registry: the flat table of every known descriptor.

use crate::core::descriptor::Descriptor;
use crate::core::error::CatalogError;
use crate::render::cache::RenderCache;
use indexmap::IndexMap;
use log::{debug, error, warn};
use std::sync::{Arc, Weak};

/// Registry entry: the descriptor plus its display resource slot.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// The registered descriptor.
    pub descriptor: Arc<Descriptor>,
    /// Stable slot index allocated at registration time.
    pub slot: usize,
}

/// Outcome of a successful [`FilterRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The descriptor was inserted.
    Added,
    /// An identical descriptor was already registered; nothing changed.
    AlreadyPresent,
}

/// Registry for all available filters.
///
/// Keys are unique. The first descriptor registered under a key wins; later
/// attempts are either no-ops (identical definition) or rejected (different
/// definition). Iteration follows registration order.
pub struct FilterRegistry {
    /// Filters indexed by their unique key.
    filters: IndexMap<String, RegistryEntry>,
    /// Next resource slot to hand out.
    next_slot: usize,
    /// Render caches to purge when a key is unregistered.
    caches: Vec<Weak<RenderCache>>,
}

impl FilterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            filters: IndexMap::new(),
            next_slot: 0,
            caches: Vec::new(),
        }
    }

    /// Create a registry pre-populated with built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::filters::builtin::register_all(&mut registry);
        registry
    }

    /// Register a descriptor under its key.
    ///
    /// Duplicate keys never replace the existing descriptor: an identical
    /// re-registration logs a warning and returns
    /// [`Registration::AlreadyPresent`], a different one logs an error and
    /// returns [`CatalogError::DuplicateKey`].
    pub fn register(&mut self, descriptor: Descriptor) -> Result<Registration, CatalogError> {
        let key = descriptor.key().to_string();
        if key.trim().is_empty() {
            error!("Refusing to register a filter with an empty key");
            return Err(CatalogError::EmptyKey);
        }

        if let Some(existing) = self.filters.get(&key) {
            if existing.descriptor.same_definition(&descriptor) {
                warn!("Filter '{}' registered twice, keeping the first", key);
                return Ok(Registration::AlreadyPresent);
            }
            error!("Filter '{}' already registered with a different definition", key);
            return Err(CatalogError::DuplicateKey { key });
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        debug!("Registered filter '{}' in slot {}", key, slot);
        self.filters.insert(
            key,
            RegistryEntry {
                descriptor: Arc::new(descriptor),
                slot,
            },
        );
        Ok(Registration::Added)
    }

    /// Look up a descriptor by key. Absent keys are not an error.
    pub fn lookup(&self, key: &str) -> Option<Arc<Descriptor>> {
        self.filters.get(key).map(|e| Arc::clone(&e.descriptor))
    }

    /// Get a registry entry.
    pub fn get_entry(&self, key: &str) -> Option<&RegistryEntry> {
        self.filters.get(key)
    }

    /// Check if a filter is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.filters.contains_key(key)
    }

    /// Remove a descriptor and purge its cached outputs from every attached
    /// render cache.
    pub fn unregister(&mut self, key: &str) -> bool {
        let removed = self.filters.shift_remove(key).is_some();
        if removed {
            self.caches.retain(|weak| match weak.upgrade() {
                Some(cache) => {
                    cache.purge(key);
                    true
                }
                None => false,
            });
            debug!("Unregistered filter '{}'", key);
        }
        removed
    }

    /// Attach a render cache so that [`unregister`](Self::unregister) can
    /// purge it. Caches are held weakly.
    pub fn attach_cache(&mut self, cache: &Arc<RenderCache>) {
        self.caches.retain(|weak| weak.strong_count() > 0);
        self.caches.push(Arc::downgrade(cache));
    }

    /// Number of live attached caches.
    pub fn attached_caches(&self) -> usize {
        self.caches.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// All registered keys, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|s| s.as_str())
    }

    /// All registered descriptors, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<Descriptor>> {
        self.filters.values().map(|e| &e.descriptor)
    }

    /// Search filters by key, title, description or tag.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.filters
            .iter()
            .filter(|(key, entry)| {
                let d = &entry.descriptor;
                key.to_lowercase().contains(&query)
                    || d.title().to_lowercase().contains(&query)
                    || d.description().to_lowercase().contains(&query)
                    || d.tags().iter().any(|t| t.to_lowercase().contains(&query))
            })
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Get the total number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::FilterOperation;
    use crate::core::types::SharedImage;
    use image::{DynamicImage, RgbaImage};
    use proptest::prelude::*;
    use std::time::Duration;

    fn identity(key: &str, title: &str) -> Descriptor {
        Descriptor::builder(key, title, FilterOperation::single(|img, _| Some(img.clone())))
            .tag("test")
            .build()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = FilterRegistry::new();
        assert_eq!(registry.register(identity("sepia", "Sepia")), Ok(Registration::Added));
        assert!(registry.contains("sepia"));
        assert_eq!(registry.lookup("sepia").unwrap().title(), "Sepia");
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_identical_reregistration_is_noop() {
        let mut registry = FilterRegistry::new();
        registry.register(identity("sepia", "Sepia")).unwrap();
        assert_eq!(
            registry.register(identity("sepia", "Sepia")),
            Ok(Registration::AlreadyPresent)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut registry = FilterRegistry::new();
        registry.register(identity("sepia", "Sepia")).unwrap();
        let err = registry.register(identity("sepia", "Old Photo")).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateKey { key: "sepia".to_string() });
        assert_eq!(registry.lookup("sepia").unwrap().title(), "Sepia");
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut registry = FilterRegistry::new();
        assert_eq!(registry.register(identity("  ", "Blank")), Err(CatalogError::EmptyKey));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_slots_are_stable() {
        let mut registry = FilterRegistry::new();
        registry.register(identity("a", "A")).unwrap();
        registry.register(identity("b", "B")).unwrap();
        registry.unregister("a");
        registry.register(identity("c", "C")).unwrap();
        assert_eq!(registry.get_entry("b").unwrap().slot, 1);
        assert_eq!(registry.get_entry("c").unwrap().slot, 2);
    }

    #[test]
    fn test_search() {
        let mut registry = FilterRegistry::new();
        registry.register(identity("sepia", "Old Photo")).unwrap();

        assert_eq!(registry.search("photo"), vec!["sepia"]);
        assert_eq!(registry.search("TEST"), vec!["sepia"]);
        assert!(registry.search("nonexistent").is_empty());
    }

    #[test]
    fn test_unregister_purges_attached_cache() {
        let mut registry = FilterRegistry::new();
        registry.register(identity("sepia", "Sepia")).unwrap();

        let cache = Arc::new(RenderCache::new(8));
        registry.attach_cache(&cache);
        let input = SharedImage::new(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)));
        cache.bind_input(&input);
        assert!(cache.put_image("sepia", input.clone(), input.id(), Duration::ZERO));

        assert!(registry.unregister("sepia"));
        assert!(cache.get_image("sepia").is_none());
        assert!(!registry.unregister("sepia"));

        drop(cache);
        assert_eq!(registry.attached_caches(), 0);
    }

    proptest! {
        #[test]
        fn prop_first_registration_wins(titles in proptest::collection::vec("[a-z]{1,6}", 1..12)) {
            let mut registry = FilterRegistry::new();
            for title in &titles {
                let _ = registry.register(identity("shared", title));
            }
            prop_assert_eq!(registry.len(), 1);
            let kept = registry.lookup("shared").unwrap();
            prop_assert_eq!(kept.title(), titles[0].as_str());
        }
    }
}
