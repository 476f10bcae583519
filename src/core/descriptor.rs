//! Filter descriptors and the transform capability.
//!
//! A [`Descriptor`] is the immutable identity of one filter: its key, display
//! metadata, parameter list and the operation that applies it. Heterogeneous
//! filter kinds (single-image, blend, preset, lookup table, style model) share
//! one capability, [`FilterOperation::apply`], selected by variant at
//! construction time.

use crate::core::parameter::{ParameterDefinition, ParameterSet};
use crate::filters::lookup::ToneLookup;
use crate::filters::preset::PresetAdjustments;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Transform over one image.
pub type SingleFn = Arc<dyn Fn(&DynamicImage, &ParameterSet) -> Option<DynamicImage> + Send + Sync>;

/// Transform combining the primary image with a secondary (blend) image.
pub type BlendFn =
    Arc<dyn Fn(&DynamicImage, &DynamicImage, &ParameterSet) -> Option<DynamicImage> + Send + Sync>;

/// Opaque model-backed transform (style transfer and the like).
pub type StyleFn = Arc<dyn Fn(&DynamicImage) -> Option<DynamicImage> + Send + Sync>;

/// Kind tag of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Operates on the primary image only
    SingleInput,
    /// Needs a secondary blend image
    Blend,
    /// Parametrised adjustment chain built from preset data
    Preset,
    /// Per-channel lookup table
    Lookup,
    /// Opaque model
    Style,
}

impl FilterKind {
    /// Get the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            FilterKind::SingleInput => "Single Input",
            FilterKind::Blend => "Blend",
            FilterKind::Preset => "Preset",
            FilterKind::Lookup => "Lookup",
            FilterKind::Style => "Style",
        }
    }
}

/// The apply capability of a descriptor.
#[derive(Clone)]
pub enum FilterOperation {
    Single(SingleFn),
    Blend(BlendFn),
    Preset(Arc<PresetAdjustments>),
    Lookup(Arc<ToneLookup>),
    Style(StyleFn),
}

impl FilterOperation {
    /// Wrap a single-image transform.
    pub fn single<F>(f: F) -> Self
    where
        F: Fn(&DynamicImage, &ParameterSet) -> Option<DynamicImage> + Send + Sync + 'static,
    {
        FilterOperation::Single(Arc::new(f))
    }

    /// Wrap a two-image transform.
    pub fn blend<F>(f: F) -> Self
    where
        F: Fn(&DynamicImage, &DynamicImage, &ParameterSet) -> Option<DynamicImage>
            + Send
            + Sync
            + 'static,
    {
        FilterOperation::Blend(Arc::new(f))
    }

    /// Wrap an opaque model transform.
    pub fn style<F>(f: F) -> Self
    where
        F: Fn(&DynamicImage) -> Option<DynamicImage> + Send + Sync + 'static,
    {
        FilterOperation::Style(Arc::new(f))
    }

    /// Kind tag of this operation.
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterOperation::Single(_) => FilterKind::SingleInput,
            FilterOperation::Blend(_) => FilterKind::Blend,
            FilterOperation::Preset(_) => FilterKind::Preset,
            FilterOperation::Lookup(_) => FilterKind::Lookup,
            FilterOperation::Style(_) => FilterKind::Style,
        }
    }

    /// Whether a secondary image must be supplied.
    pub fn requires_secondary(&self) -> bool {
        matches!(self, FilterOperation::Blend(_))
    }

    /// Apply the operation. Returns `None` when the transform fails or a
    /// required secondary image is missing.
    pub fn apply(
        &self,
        primary: &DynamicImage,
        secondary: Option<&DynamicImage>,
        params: &ParameterSet,
    ) -> Option<DynamicImage> {
        match self {
            FilterOperation::Single(f) => f(primary, params),
            FilterOperation::Blend(f) => secondary.and_then(|s| f(primary, s, params)),
            FilterOperation::Preset(adjustments) => Some(adjustments.apply(primary)),
            FilterOperation::Lookup(table) => Some(table.apply(primary)),
            FilterOperation::Style(f) => f(primary),
        }
    }
}

impl fmt::Debug for FilterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperation::Single(_) => write!(f, "Single(<transform>)"),
            FilterOperation::Blend(_) => write!(f, "Blend(<transform>)"),
            FilterOperation::Preset(p) => f.debug_tuple("Preset").field(p).finish(),
            FilterOperation::Lookup(_) => write!(f, "Lookup(<table>)"),
            FilterOperation::Style(_) => write!(f, "Style(<model>)"),
        }
    }
}

/// Immutable identity, metadata and transform of one filter.
#[derive(Debug, Clone)]
pub struct Descriptor {
    key: String,
    title: String,
    description: String,
    parameters: Vec<ParameterDefinition>,
    defaults: ParameterSet,
    operation: FilterOperation,
    slow: bool,
    hidden_by_default: bool,
    default_rating: u8,
    tags: Vec<String>,
}

impl Descriptor {
    /// Start building a descriptor.
    pub fn builder(
        key: impl Into<String>,
        title: impl Into<String>,
        operation: FilterOperation,
    ) -> DescriptorBuilder {
        DescriptorBuilder::new(key, title, operation)
    }

    /// Unique key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display title (not used for identity).
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Longer description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ordered parameter definitions.
    pub fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    /// Default parameter values.
    pub fn defaults(&self) -> &ParameterSet {
        &self.defaults
    }

    /// Kind tag.
    pub fn kind(&self) -> FilterKind {
        self.operation.kind()
    }

    /// The operation itself.
    pub fn operation(&self) -> &FilterOperation {
        &self.operation
    }

    /// Whether a secondary image is required.
    pub fn requires_secondary(&self) -> bool {
        self.operation.requires_secondary()
    }

    /// Whether the transform is known to be expensive.
    pub fn is_slow(&self) -> bool {
        self.slow
    }

    /// Catalog default for the hidden flag.
    pub fn hidden_by_default(&self) -> bool {
        self.hidden_by_default
    }

    /// Catalog default rating (0..=3).
    pub fn default_rating(&self) -> u8 {
        self.default_rating
    }

    /// Searchable tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Apply with default parameters.
    pub fn apply(&self, primary: &DynamicImage, secondary: Option<&DynamicImage>) -> Option<DynamicImage> {
        self.operation.apply(primary, secondary, &self.defaults)
    }

    /// Apply with explicit parameters.
    pub fn apply_with(
        &self,
        primary: &DynamicImage,
        secondary: Option<&DynamicImage>,
        params: &ParameterSet,
    ) -> Option<DynamicImage> {
        self.operation.apply(primary, secondary, params)
    }

    /// Apply catalog-file overrides before registration. `slow` and
    /// `hidden` can only switch the flag on.
    pub fn with_catalog_defaults(mut self, slow: bool, hidden: bool, rating: Option<i64>) -> Self {
        self.slow |= slow;
        self.hidden_by_default |= hidden;
        if let Some(rating) = rating {
            self.default_rating = rating.clamp(0, 3) as u8;
        }
        self
    }

    /// Whether two descriptors describe the same filter.
    ///
    /// Compares key, title, description, kind and parameters. Transform
    /// closures are not comparable and are ignored.
    pub fn same_definition(&self, other: &Descriptor) -> bool {
        self.key == other.key
            && self.title == other.title
            && self.description == other.description
            && self.kind() == other.kind()
            && self.parameters == other.parameters
    }
}

/// Builder for [`Descriptor`].
pub struct DescriptorBuilder {
    key: String,
    title: String,
    description: String,
    parameters: Vec<ParameterDefinition>,
    operation: FilterOperation,
    slow: bool,
    hidden_by_default: bool,
    default_rating: u8,
    tags: Vec<String>,
}

impl DescriptorBuilder {
    /// Create a new builder with required fields.
    pub fn new(key: impl Into<String>, title: impl Into<String>, operation: FilterOperation) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            description: String::new(),
            parameters: Vec::new(),
            operation,
            slow: false,
            hidden_by_default: false,
            default_rating: 0,
            tags: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.parameters.push(param);
        self
    }

    /// Mark as slow.
    pub fn slow(mut self, slow: bool) -> Self {
        self.slow = slow;
        self
    }

    /// Hide from galleries unless the user un-hides it.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden_by_default = hidden;
        self
    }

    /// Default rating, clamped to 0..=3.
    pub fn rating(mut self, rating: i64) -> Self {
        self.default_rating = rating.clamp(0, 3) as u8;
        self
    }

    /// Add a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> Descriptor {
        let defaults = ParameterSet::from_defaults(&self.parameters);
        Descriptor {
            key: self.key,
            title: self.title,
            description: self.description,
            parameters: self.parameters,
            defaults,
            operation: self.operation,
            slow: self.slow,
            hidden_by_default: self.hidden_by_default,
            default_rating: self.default_rating,
            tags: self.tags,
        }
    }
}
