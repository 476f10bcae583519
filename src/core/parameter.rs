//! Parameter definitions for filter descriptors.
//!
//! Parameters are the named numeric/vector controls a transform exposes. A
//! descriptor lists them in display order together with their defaults; the
//! gallery renders thumbnails with the defaults.

use crate::core::types::Color;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of control a parameter represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Scalar slider
    Float,
    /// Color picker
    Color,
    /// 2D position in normalised image coordinates
    Position,
    /// Free-form numeric vector
    Vector,
}

impl ParameterKind {
    /// Map an attribute type name from external definitions to a kind.
    ///
    /// Scalar-like names (time, angle, distance, count, boolean...) are all
    /// treated as floats; unrecognised names yield `None`.
    pub fn from_attribute(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "float" | "scalar" | "time" | "angle" | "distance" | "integer" | "count"
            | "boolean" => Some(ParameterKind::Float),
            "color" => Some(ParameterKind::Color),
            "position" => Some(ParameterKind::Position),
            "vector" | "offset" | "rectangle" | "position3" => Some(ParameterKind::Vector),
            _ => None,
        }
    }
}

/// Value of a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ParameterValue {
    Float(f32),
    Color(Color),
    Vector(Vec<f32>),
}

impl ParameterValue {
    /// Try to get this value as a float.
    pub fn as_float(&self) -> Option<f32> {
        if let ParameterValue::Float(f) = self {
            Some(*f)
        } else {
            None
        }
    }

    /// Try to get this value as a color.
    pub fn as_color(&self) -> Option<Color> {
        if let ParameterValue::Color(c) = self {
            Some(*c)
        } else {
            None
        }
    }

    /// Try to get this value as a vector.
    pub fn as_vector(&self) -> Option<&[f32]> {
        if let ParameterValue::Vector(v) = self {
            Some(v)
        } else {
            None
        }
    }
}

/// Definition of one filter parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDefinition {
    /// Unique name within the descriptor
    pub name: String,
    /// Human-readable name
    pub title: String,
    /// Kind of control
    pub kind: ParameterKind,
    /// Lower bound for float parameters
    pub min: f32,
    /// Upper bound for float parameters
    pub max: f32,
    /// Default value
    pub default: ParameterValue,
}

impl ParameterDefinition {
    /// Create a float parameter. The default is clamped into `[min, max]`.
    pub fn float(name: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        let name = name.into();
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Self {
            title: Self::name_to_title(&name),
            name,
            kind: ParameterKind::Float,
            min: lo,
            max: hi,
            default: ParameterValue::Float(default.clamp(lo, hi)),
        }
    }

    /// Create a color parameter.
    pub fn color(name: impl Into<String>, default: Color) -> Self {
        let name = name.into();
        Self {
            title: Self::name_to_title(&name),
            name,
            kind: ParameterKind::Color,
            min: 0.0,
            max: 1.0,
            default: ParameterValue::Color(default),
        }
    }

    /// Create a vector or position parameter.
    pub fn vector(name: impl Into<String>, kind: ParameterKind, default: Vec<f32>) -> Self {
        let name = name.into();
        Self {
            title: Self::name_to_title(&name),
            name,
            kind,
            min: 0.0,
            max: 1.0,
            default: ParameterValue::Vector(default),
        }
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Clamp a float value into this parameter's range.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Convert snake_case / camelCase names to a title.
    fn name_to_title(name: &str) -> String {
        let name = name.strip_prefix("input").unwrap_or(name);
        let mut title = String::with_capacity(name.len() + 4);
        let mut capitalize = true;
        for (i, c) in name.chars().enumerate() {
            if c == '_' {
                title.push(' ');
                capitalize = true;
                continue;
            }
            if c.is_uppercase() && i > 0 && !title.ends_with(' ') {
                title.push(' ');
            }
            if capitalize {
                title.extend(c.to_uppercase());
                capitalize = false;
            } else {
                title.push(c);
            }
        }
        title
    }
}

/// Concrete parameter values handed to a transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: IndexMap<String, ParameterValue>,
}

impl ParameterSet {
    /// Materialise the defaults of a definition list.
    pub fn from_defaults(definitions: &[ParameterDefinition]) -> Self {
        Self {
            values: definitions
                .iter()
                .map(|d| (d.name.clone(), d.default.clone()))
                .collect(),
        }
    }

    /// Read a float, falling back when absent or of another kind.
    pub fn float_or(&self, name: &str, fallback: f32) -> f32 {
        self.values
            .get(name)
            .and_then(ParameterValue::as_float)
            .unwrap_or(fallback)
    }

    /// Read a color, falling back when absent or of another kind.
    pub fn color_or(&self, name: &str, fallback: Color) -> Color {
        self.values
            .get(name)
            .and_then(ParameterValue::as_color)
            .unwrap_or(fallback)
    }

    /// Read a raw value.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
