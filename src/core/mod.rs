//! Core types for the filter catalog and render cache.
//!
//! This module contains the foundational types shared across the crate:
//! - Shared image handles and view identifiers
//! - Parameter definitions
//! - Filter descriptors and the transform capability
//! - Change-notification channels
//! - Error types

pub mod types;
pub mod parameter;
pub mod descriptor;
pub mod events;
pub mod error;

// Re-export commonly used types
pub use types::{Color, ImageId, SharedImage, ViewId};
pub use parameter::{ParameterDefinition, ParameterKind, ParameterSet, ParameterValue};
pub use descriptor::{Descriptor, DescriptorBuilder, FilterKind, FilterOperation};
pub use events::{Broadcaster, SubscriberId, Subscription};
pub use error::{CatalogError, ConfigError, FilterKitError, PresetError, StoreError};
