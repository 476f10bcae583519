//! Filter module.
//!
//! Contains the filter registry, the category index, the catalog that pairs
//! them, external preset and lookup data, and the built-in filters.

pub mod registry;
pub mod category;
pub mod catalog;
pub mod preset;
pub mod lookup;
pub mod builtin;

pub use registry::{FilterRegistry, Registration, RegistryEntry};
pub use category::{Category, CategoryAssignment, CategoryIndex};
pub use catalog::{Catalog, CatalogFile, CategoryDefinition, LookupDefinition};
pub use preset::{PresetAdjustments, PresetRecord, PresetSource};
pub use lookup::{CurveSpec, ToneLookup};
pub use builtin::NULL_FILTER;
