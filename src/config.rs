//! Gallery configuration.
//!
//! ```toml
//! [loader]
//! workers = 2
//! reuse_cached = true
//!
//! [cache]
//! image_capacity = 128
//! category_change = "retain"
//! ```
//!
//! Every section and field is optional.

use crate::core::error::ConfigError;
use crate::render::cache::DEFAULT_IMAGE_CAPACITY;
use crate::render::loader::{CategoryChangePolicy, LoaderOptions, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Loader section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    /// Background workers, clamped to `1..=4`.
    pub workers: usize,
    /// Serve already-rendered keys from the cache.
    pub reuse_cached: bool,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            workers: 1,
            reuse_cached: true,
        }
    }
}

/// Cache section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Bound on rendered images kept per view.
    pub image_capacity: usize,
    /// What a category switch does to rendered images.
    pub category_change: CategoryChangePolicy,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            image_capacity: DEFAULT_IMAGE_CAPACITY,
            category_change: CategoryChangePolicy::Evict,
        }
    }
}

/// Top-level gallery configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Loader settings.
    pub loader: LoaderSection,
    /// Cache settings.
    pub cache: CacheSection,
}

impl GalleryConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loader options described by this configuration.
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions::new()
            .with_workers(self.loader.workers.clamp(1, MAX_WORKERS))
            .with_reuse_cached(self.loader.reuse_cached)
            .with_category_policy(self.cache.category_change)
    }

    /// Image cache capacity, at least one.
    pub fn image_capacity(&self) -> usize {
        self.cache.image_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GalleryConfig::from_toml_str("").unwrap();
        assert_eq!(config, GalleryConfig::default());
        let options = config.loader_options();
        assert_eq!(options.workers, 1);
        assert!(options.reuse_cached);
        assert_eq!(options.category_policy, CategoryChangePolicy::Evict);
        assert_eq!(config.image_capacity(), DEFAULT_IMAGE_CAPACITY);
    }

    #[test]
    fn test_full_config() {
        let config = GalleryConfig::from_toml_str(
            r#"
            [loader]
            workers = 9
            reuse_cached = false

            [cache]
            image_capacity = 0
            category_change = "retain"
            "#,
        )
        .unwrap();
        let options = config.loader_options();
        assert_eq!(options.workers, MAX_WORKERS);
        assert!(!options.reuse_cached);
        assert_eq!(options.category_policy, CategoryChangePolicy::Retain);
        assert_eq!(config.image_capacity(), 1);
    }

    #[test]
    fn test_bad_policy_rejected() {
        let err = GalleryConfig::from_toml_str("[cache]\ncategory_change = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = GalleryConfig::from_path("/nonexistent/filterkit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
