//! Error types for Filterkit.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the filter key or category involved
//! - Stay local: per-item failures inside a batch are reported as skip
//!   reasons, never as errors of the whole batch
//! - Support error chaining for context

use thiserror::Error;

/// Top-level error type for Filterkit.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum FilterKitError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Preset error: {0}")]
    Preset(#[from] PresetError),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to the filter registry and category index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Filter '{key}' is already registered with a different definition")]
    DuplicateKey { key: String },

    #[error("Filter '{0}' not found")]
    UnknownFilter(String),

    #[error("Category '{0}' not found")]
    UnknownCategory(String),

    #[error("Filter key must not be empty")]
    EmptyKey,

    #[error("Catalog version {found} is not supported (expected {supported}.x)")]
    UnsupportedVersion { found: String, supported: u64 },
}

/// Errors while turning external preset or lookup data into descriptors.
#[derive(Error, Debug, Clone)]
pub enum PresetError {
    #[error("Preset record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Preset data is not a list of records: {0}")]
    NotAList(String),

    #[error("Lookup table for '{key}' is invalid: {reason}")]
    InvalidLookup { key: String, reason: String },
}

/// Errors from the persistent settings store.
///
/// Callers treat every variant the same way: log it and keep the value in
/// memory for the rest of the session.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Settings store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings store is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings store unavailable: {0}")]
    Unavailable(String),
}

/// Errors while loading gallery configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from {path}: {error}")]
    Read { path: String, error: std::io::Error },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Convenience alias for results carrying a [`FilterKitError`].
pub type Result<T> = std::result::Result<T, FilterKitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_converts() {
        let err: FilterKitError = CatalogError::UnknownFilter("sepia".to_string()).into();
        assert!(matches!(err, FilterKitError::Catalog(CatalogError::UnknownFilter(_))));
        assert_eq!(err.to_string(), "Catalog error: Filter 'sepia' not found");
    }

    #[test]
    fn test_duplicate_message_names_key() {
        let err = CatalogError::DuplicateKey {
            key: "vignette".to_string(),
        };
        assert!(err.to_string().contains("vignette"));
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
