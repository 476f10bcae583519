//! The catalog: registry and category index behind coarse locks.
//!
//! Both halves are read-mostly after construction. Mutations (`register`,
//! `add_member`, `unregister`) take the write lock of the half they touch;
//! `unregister` takes both so that no category ever lists a missing key.
//! Locks are always taken registry first, then index.

use crate::core::descriptor::{Descriptor, FilterOperation};
use crate::core::error::{CatalogError, FilterKitError, Result};
use crate::filters::builtin;
use crate::filters::category::{Category, CategoryAssignment, CategoryIndex, Collection, CollectionAssignment};
use crate::filters::lookup::{CurveSpec, ToneLookup};
use crate::filters::preset::PresetSource;
use crate::filters::registry::{FilterRegistry, Registration};
use crate::render::cache::RenderCache;
use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Major catalog file version understood by this crate.
pub const SUPPORTED_CATALOG_MAJOR: u64 = 1;

/// Category entry of a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryDefinition {
    /// Category name.
    pub key: String,
    /// Display title, defaults to the name.
    #[serde(default)]
    pub title: Option<String>,
    /// Member filter keys.
    #[serde(default)]
    pub filters: Vec<String>,
}

/// Collection entry of a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionDefinition {
    /// Collection name.
    pub key: String,
    /// Display title, defaults to the name.
    #[serde(default)]
    pub title: Option<String>,
    /// Category names, in display order.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Lookup-table entry of a catalog file. Either `image` (a strip image,
/// relative to the catalog directory) or `curves` must be given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupDefinition {
    /// Filter key.
    pub key: String,
    /// Display title, defaults to the key.
    #[serde(default)]
    pub title: Option<String>,
    /// Strip image path.
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Curve control points.
    #[serde(default)]
    pub curves: Option<CurveSpec>,
}

fn default_true() -> bool {
    true
}

/// Catalog definition file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Format version; only major version 1 is accepted.
    pub version: semver::Version,
    /// Include the built-in filters.
    #[serde(default = "default_true")]
    pub builtins: bool,
    /// Explicit categories. When empty, the built-in grouping is used plus
    /// one category each for presets and lookups.
    #[serde(default)]
    pub categories: Vec<CategoryDefinition>,
    /// Explicit collections. When empty and the categories are defaulted,
    /// the built-in collections are used.
    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,
    /// Inline preset records.
    #[serde(default)]
    pub presets: Vec<serde_json::Value>,
    /// Directory of preset `*.json` files, relative to the catalog.
    #[serde(default)]
    pub preset_dir: Option<PathBuf>,
    /// Lookup-table filters.
    #[serde(default)]
    pub lookups: Vec<LookupDefinition>,
    /// Keys of expensive filters.
    #[serde(default)]
    pub slow: Vec<String>,
    /// Keys hidden unless the user un-hides them.
    #[serde(default)]
    pub hidden: Vec<String>,
    /// Default ratings.
    #[serde(default)]
    pub ratings: BTreeMap<String, i64>,
}

impl CatalogFile {
    /// Parse from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a catalog file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn check_version(&self) -> std::result::Result<(), CatalogError> {
        if self.version.major != SUPPORTED_CATALOG_MAJOR {
            return Err(CatalogError::UnsupportedVersion {
                found: self.version.to_string(),
                supported: SUPPORTED_CATALOG_MAJOR,
            });
        }
        Ok(())
    }
}

/// Registry and category index shared between the gallery, the selection
/// state and the loader.
pub struct Catalog {
    registry: RwLock<FilterRegistry>,
    index: RwLock<CategoryIndex>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::from_parts(FilterRegistry::new(), CategoryIndex::new())
    }

    /// Wrap an existing registry and index.
    pub fn from_parts(registry: FilterRegistry, index: CategoryIndex) -> Self {
        Self {
            registry: RwLock::new(registry),
            index: RwLock::new(index),
        }
    }

    /// Catalog of built-in filters in their default categories.
    pub fn with_builtins() -> Self {
        let registry = FilterRegistry::with_builtins();
        let mut index = CategoryIndex::new();
        index.rebuild(&builtin::default_categories(), &registry);
        index.rebuild_collections(&builtin::default_collections());
        Self::from_parts(registry, index)
    }

    /// Build a catalog from a catalog file. Relative paths resolve against
    /// `base_dir`.
    ///
    /// Bad preset records and unreadable lookup tables are logged and
    /// skipped. Only an unsupported version fails.
    pub fn from_file(file: &CatalogFile, base_dir: &Path) -> Result<Self> {
        file.check_version()?;

        let slow: BTreeSet<&str> = file.slow.iter().map(String::as_str).collect();
        let hidden: BTreeSet<&str> = file.hidden.iter().map(String::as_str).collect();

        let mut descriptors = Vec::new();
        if file.builtins {
            descriptors.extend(builtin::descriptors());
        }

        let mut presets = PresetSource::from_json_value(serde_json::Value::Array(file.presets.clone()))?;
        if let Some(dir) = &file.preset_dir {
            presets.merge(PresetSource::from_dir(&base_dir.join(dir)));
        }
        let preset_keys: Vec<String> = presets.records().iter().map(|r| r.key.clone()).collect();
        descriptors.extend(presets.descriptors());

        let mut lookup_keys = Vec::new();
        for def in &file.lookups {
            match lookup_descriptor(def, base_dir) {
                Ok(descriptor) => {
                    lookup_keys.push(def.key.clone());
                    descriptors.push(descriptor);
                }
                Err(e) => warn!("Skipping lookup '{}': {}", def.key, e),
            }
        }

        let mut registry = FilterRegistry::new();
        for descriptor in descriptors {
            let key = descriptor.key().to_string();
            let descriptor = descriptor.with_catalog_defaults(
                slow.contains(key.as_str()),
                hidden.contains(key.as_str()),
                file.ratings.get(&key).copied(),
            );
            // The registry logs rejections itself.
            let _ = registry.register(descriptor);
        }

        let mut default_collections = Vec::new();
        let assignments: Vec<CategoryAssignment> = if file.categories.is_empty() {
            let mut defaults = if file.builtins {
                default_collections = builtin::default_collections();
                builtin::default_categories()
            } else {
                Vec::new()
            };
            let mut looks = Vec::new();
            if !preset_keys.is_empty() {
                defaults.push(("presets".to_string(), "Presets".to_string(), preset_keys));
                looks.push("presets".to_string());
            }
            if !lookup_keys.is_empty() {
                defaults.push(("lookup".to_string(), "Lookup".to_string(), lookup_keys));
                looks.push("lookup".to_string());
            }
            if !looks.is_empty() {
                default_collections.push(("looks".to_string(), "Looks".to_string(), looks));
            }
            defaults
        } else {
            file.categories
                .iter()
                .map(|c| {
                    let title = c.title.clone().unwrap_or_else(|| c.key.clone());
                    (c.key.clone(), title, c.filters.clone())
                })
                .collect()
        };

        let collections: Vec<CollectionAssignment> = if file.collections.is_empty() {
            default_collections
        } else {
            file.collections
                .iter()
                .map(|c| {
                    let title = c.title.clone().unwrap_or_else(|| c.key.clone());
                    (c.key.clone(), title, c.categories.clone())
                })
                .collect()
        };

        let mut index = CategoryIndex::new();
        index.rebuild(&assignments, &registry);
        index.rebuild_collections(&collections);
        info!(
            "Catalog loaded: {} filters in {} categories, {} collections",
            registry.len(),
            index.len(),
            index.collections().len()
        );
        Ok(Self::from_parts(registry, index))
    }

    /// Read a catalog file from disk, resolving relative paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = CatalogFile::from_path(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_file(&file, base_dir)
    }

    /// Register a descriptor.
    pub fn register(&self, descriptor: Descriptor) -> std::result::Result<Registration, CatalogError> {
        self.registry.write().register(descriptor)
    }

    /// Look up a descriptor.
    pub fn lookup(&self, key: &str) -> Option<Arc<Descriptor>> {
        self.registry.read().lookup(key)
    }

    /// Whether a key is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.registry.read().contains(key)
    }

    /// Remove a filter from the registry, every category and every attached
    /// render cache.
    pub fn unregister(&self, key: &str) -> bool {
        let mut registry = self.registry.write();
        let mut index = self.index.write();
        index.remove_everywhere(key);
        registry.unregister(key)
    }

    /// Attach a render cache for purge-on-unregister.
    pub fn attach_cache(&self, cache: &Arc<RenderCache>) {
        self.registry.write().attach_cache(cache);
    }

    /// Search the registry.
    pub fn search(&self, query: &str) -> Vec<String> {
        self.registry
            .read()
            .search(query)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// All registered keys in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.registry.read().keys().map(str::to_string).collect()
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// Create or retitle a category.
    pub fn add_category(&self, name: &str, title: &str) -> bool {
        self.index.write().add_category(name, title)
    }

    /// Add a registered filter to a category.
    pub fn add_member(&self, category: &str, key: &str) -> bool {
        let registry = self.registry.read();
        self.index.write().add_member(category, key, &registry)
    }

    /// Remove a filter from one category.
    pub fn remove_member(&self, category: &str, key: &str) -> bool {
        self.index.write().remove_member(category, key)
    }

    /// Replace every category.
    pub fn rebuild_categories(&self, assignments: &[CategoryAssignment]) {
        let registry = self.registry.read();
        self.index.write().rebuild(assignments, &registry);
    }

    /// Snapshot of all categories, ordered by name.
    pub fn categories(&self) -> Vec<Category> {
        self.index.read().categories().into_iter().cloned().collect()
    }

    /// Whether a category exists.
    pub fn has_category(&self, name: &str) -> bool {
        self.index.read().get(name).is_some()
    }

    /// Sorted member keys of a category.
    pub fn filters(&self, category: &str) -> Vec<String> {
        self.index.read().filters(category)
    }

    /// Sorted member keys of a category, minus those `is_hidden` rejects.
    pub fn shown_filters(&self, category: &str, is_hidden: impl Fn(&str) -> bool) -> Vec<String> {
        self.filters(category)
            .into_iter()
            .filter(|key| !is_hidden(key))
            .collect()
    }

    /// Position of a category in name order.
    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.index.read().index_of(category)
    }

    /// Name of the category at `index`, clamped.
    pub fn category_at(&self, index: usize) -> Option<String> {
        self.index.read().category_at(index).map(|c| c.name.clone())
    }

    /// Name of the category `delta` positions from `category`, clamped.
    pub fn step(&self, category: &str, delta: isize) -> Option<String> {
        self.index.read().step(category, delta).map(|c| c.name.clone())
    }

    /// Snapshot of all collections, ordered by name.
    pub fn collections(&self) -> Vec<Collection> {
        self.index.read().collections().into_iter().cloned().collect()
    }

    /// Whether a collection exists.
    pub fn has_collection(&self, name: &str) -> bool {
        self.index.read().collection(name).is_some()
    }

    /// Create or retitle a collection.
    pub fn add_collection(&self, name: &str, title: &str) -> bool {
        self.index.write().add_collection(name, title)
    }

    /// Append an existing category to a collection.
    pub fn add_to_collection(&self, collection: &str, category: &str) -> bool {
        self.index.write().add_to_collection(collection, category)
    }

    /// Replace every collection.
    pub fn rebuild_collections(&self, assignments: &[CollectionAssignment]) {
        self.index.write().rebuild_collections(assignments);
    }

    /// Categories of a collection; all categories for an empty name.
    pub fn categories_in(&self, collection: &str) -> Vec<String> {
        self.index.read().categories_in(collection)
    }

    /// Position of a collection in name order.
    pub fn collection_index_of(&self, name: &str) -> Option<usize> {
        self.index.read().collection_index_of(name)
    }

    /// Name of the collection at `index`, clamped.
    pub fn collection_at(&self, index: usize) -> Option<String> {
        self.index.read().collection_at(index).map(|c| c.name.clone())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_descriptor(def: &LookupDefinition, base_dir: &Path) -> Result<Descriptor> {
    let table = match (&def.image, &def.curves) {
        (Some(image), _) => ToneLookup::from_path(&def.key, &base_dir.join(image))?,
        (None, Some(curves)) => ToneLookup::from_curves(&def.key, curves)?,
        (None, None) => {
            return Err(FilterKitError::Other(format!(
                "lookup '{}' has neither an image nor curves",
                def.key
            )))
        }
    };
    let title = def.title.clone().unwrap_or_else(|| def.key.clone());
    Ok(Descriptor::builder(def.key.clone(), title, FilterOperation::Lookup(Arc::new(table)))
        .tag("lookup")
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FilterKind;
    use image::{DynamicImage, Rgba, RgbaImage};

    const CATALOG: &str = r#"{
        "version": "1.2.0",
        "categories": [
            {"key": "looks", "title": "Looks", "filters": ["warm", "noir", "sepia", "ghost"]},
            {"key": "basic", "filters": ["null", "brightness"]}
        ],
        "presets": [
            {"key": "warm", "title": "Warm", "settings": {"temperature": 0.5}},
            {"title": "broken"}
        ],
        "lookups": [
            {"key": "noir", "curves": {"all": [[0, 0], [255, 200]]}},
            {"key": "missing", "image": "nowhere.png"}
        ],
        "collections": [
            {"key": "daily", "title": "Daily", "categories": ["looks", "basic", "gone"]}
        ],
        "hidden": ["sepia"],
        "slow": ["noir"],
        "ratings": {"warm": 3}
    }"#;

    #[test]
    fn test_builtins() {
        let catalog = Catalog::with_builtins();
        assert!(catalog.contains("null"));
        assert!(!catalog.categories().is_empty());
        for category in catalog.categories() {
            for key in category.members() {
                assert!(catalog.lookup(key).is_some(), "{} missing", key);
            }
        }
    }

    #[test]
    fn test_from_file() {
        let file = CatalogFile::from_json_str(CATALOG).unwrap();
        let catalog = Catalog::from_file(&file, Path::new(".")).unwrap();

        assert_eq!(catalog.filters("looks"), vec!["noir", "sepia", "warm"]);
        assert_eq!(catalog.categories()[0].title, "basic");
        assert!(!catalog.contains("missing"));

        let warm = catalog.lookup("warm").unwrap();
        assert_eq!(warm.kind(), FilterKind::Preset);
        assert_eq!(warm.default_rating(), 3);
        assert!(catalog.lookup("noir").unwrap().is_slow());
        assert!(catalog.lookup("sepia").unwrap().hidden_by_default());

        assert_eq!(catalog.categories_in("daily"), vec!["looks", "basic"]);
        assert!(!catalog.has_collection("essentials"));
    }

    #[test]
    fn test_default_collections() {
        let catalog = Catalog::with_builtins();
        assert_eq!(catalog.categories_in("essentials"), vec!["basic", "color"]);
        assert_eq!(catalog.collection_at(0).as_deref(), Some("creative"));
        assert_eq!(catalog.categories_in("").len(), catalog.categories().len());

        let file = CatalogFile::from_json_str(
            r#"{"version": "1.0.0", "presets": [{"key": "p1"}]}"#,
        )
        .unwrap();
        let catalog = Catalog::from_file(&file, Path::new(".")).unwrap();
        assert_eq!(catalog.categories_in("looks"), vec!["presets"]);
        assert!(catalog.has_collection("essentials"));
    }

    #[test]
    fn test_default_categories_for_presets() {
        let file = CatalogFile::from_json_str(
            r#"{"version": "1.0.0", "builtins": false,
                "presets": [{"key": "p1"}, {"key": "p2"}]}"#,
        )
        .unwrap();
        let catalog = Catalog::from_file(&file, Path::new(".")).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.filters("presets"), vec!["p1", "p2"]);
    }

    #[test]
    fn test_lookup_strip_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let strip = RgbaImage::from_fn(256, 1, |x, _| Rgba([x as u8, x as u8, 255 - x as u8, 255]));
        DynamicImage::ImageRgba8(strip).save(dir.path().join("strip.png")).unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"version": "1.0.0", "builtins": false,
                "lookups": [{"key": "cool", "image": "strip.png"}]}"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.lookup("cool").unwrap().kind(), FilterKind::Lookup);
        assert_eq!(catalog.filters("lookup"), vec!["cool"]);
    }

    #[test]
    fn test_unsupported_version() {
        let file = CatalogFile::from_json_str(r#"{"version": "2.0.0"}"#).unwrap();
        let err = Catalog::from_file(&file, Path::new(".")).err().unwrap();
        assert!(matches!(
            err,
            FilterKitError::Catalog(CatalogError::UnsupportedVersion { supported: 1, .. })
        ));
    }

    #[test]
    fn test_unregister_keeps_categories_consistent() {
        let catalog = Catalog::with_builtins();
        let category = catalog
            .categories()
            .into_iter()
            .find(|c| c.contains("sepia"))
            .unwrap();
        assert!(catalog.unregister("sepia"));
        assert!(!catalog.filters(&category.name).contains(&"sepia".to_string()));
        assert!(catalog.lookup("sepia").is_none());
    }

    #[test]
    fn test_shown_filters() {
        let catalog = Catalog::with_builtins();
        let all = catalog.filters("color");
        let shown = catalog.shown_filters("color", |k| k == "sepia");
        assert_eq!(shown.len() + 1, all.len());
        assert!(!shown.contains(&"sepia".to_string()));
    }
}
