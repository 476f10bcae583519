//! Preset data source.
//!
//! Presets are external records (key, title, a handful of numeric settings)
//! that become [`FilterKind::Preset`](crate::core::FilterKind) descriptors at
//! catalog-build time. A malformed record is logged and skipped; it never
//! fails catalog construction.

use crate::core::descriptor::{Descriptor, FilterOperation};
use crate::core::error::PresetError;
use crate::core::parameter::ParameterDefinition;
use image::DynamicImage;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// Numeric adjustment chain applied by a preset.
///
/// Neutral values leave the image untouched: exposure, brightness,
/// temperature and vibrance at `0.0`, contrast and saturation at `1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetAdjustments {
    /// Exposure in stops
    pub exposure: f32,
    /// Contrast multiplier around mid-grey
    pub contrast: f32,
    /// Saturation multiplier
    pub saturation: f32,
    /// Additive brightness (-1.0 to 1.0)
    pub brightness: f32,
    /// Warm (positive) or cool (negative) shift (-1.0 to 1.0)
    pub temperature: f32,
    /// Saturation boost weighted towards muted colors
    pub vibrance: f32,
}

impl Default for PresetAdjustments {
    fn default() -> Self {
        Self {
            exposure: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            brightness: 0.0,
            temperature: 0.0,
            vibrance: 0.0,
        }
    }
}

impl PresetAdjustments {
    /// Build from named settings. Unknown names are ignored with a warning.
    pub fn from_settings(key: &str, settings: &BTreeMap<String, f32>) -> Self {
        let mut adj = Self::default();
        for (name, value) in settings {
            match name.as_str() {
                "exposure" => adj.exposure = value.clamp(-4.0, 4.0),
                "contrast" => adj.contrast = value.clamp(0.0, 4.0),
                "saturation" => adj.saturation = value.clamp(0.0, 4.0),
                "brightness" => adj.brightness = value.clamp(-1.0, 1.0),
                "temperature" => adj.temperature = value.clamp(-1.0, 1.0),
                "vibrance" => adj.vibrance = value.clamp(-1.0, 1.0),
                other => warn!("Preset '{}': ignoring unknown setting '{}'", key, other),
            }
        }
        adj
    }

    /// Whether applying these adjustments is a no-op.
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Parameter definitions describing the current values.
    pub fn parameters(&self) -> Vec<ParameterDefinition> {
        vec![
            ParameterDefinition::float("exposure", -4.0, 4.0, self.exposure),
            ParameterDefinition::float("contrast", 0.0, 4.0, self.contrast),
            ParameterDefinition::float("saturation", 0.0, 4.0, self.saturation),
            ParameterDefinition::float("brightness", -1.0, 1.0, self.brightness),
            ParameterDefinition::float("temperature", -1.0, 1.0, self.temperature),
            ParameterDefinition::float("vibrance", -1.0, 1.0, self.vibrance),
        ]
    }

    /// Apply the chain to an image, keeping alpha.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let mut out = image.to_rgba8();
        if self.is_neutral() {
            return DynamicImage::ImageRgba8(out);
        }
        let gain = 2f32.powf(self.exposure);
        let adj = *self;
        out.par_chunks_mut(4).for_each(|px| {
            let mut rgb = [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ];
            for c in rgb.iter_mut() {
                *c = (*c * gain + adj.brightness - 0.5) * adj.contrast + 0.5;
            }
            rgb[0] += adj.temperature * 0.1;
            rgb[2] -= adj.temperature * 0.1;

            let luma = 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2];
            let max = rgb.iter().cloned().fold(f32::MIN, f32::max);
            let min = rgb.iter().cloned().fold(f32::MAX, f32::min);
            let chroma = (max - min).clamp(0.0, 1.0);
            let factor = adj.saturation * (1.0 + adj.vibrance * (1.0 - chroma));
            for (i, c) in rgb.iter().enumerate() {
                let v = luma + (c - luma) * factor;
                px[i] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });
        DynamicImage::ImageRgba8(out)
    }
}

/// One preset record as found in external data.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetRecord {
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub slow: bool,
    #[serde(default)]
    pub settings: BTreeMap<String, f32>,
}

impl PresetRecord {
    /// Manufacture a descriptor for this record.
    pub fn to_descriptor(&self) -> Descriptor {
        let adjustments = PresetAdjustments::from_settings(&self.key, &self.settings);
        let title = self.title.clone().unwrap_or_else(|| self.key.clone());
        let mut builder = Descriptor::builder(
            self.key.clone(),
            title,
            FilterOperation::Preset(Arc::new(adjustments)),
        )
        .description(self.description.clone().unwrap_or_default())
        .hidden(self.hide)
        .slow(self.slow)
        .rating(self.rating.unwrap_or(0))
        .tag("preset");
        for param in adjustments.parameters() {
            builder = builder.parameter(param);
        }
        builder.build()
    }
}

/// Parsed preset data, ready to be turned into descriptors.
#[derive(Debug, Clone, Default)]
pub struct PresetSource {
    records: Vec<PresetRecord>,
    rejected: Vec<PresetError>,
}

impl PresetSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of records.
    ///
    /// Fails only when the document is not a JSON array; individual bad
    /// records are collected in [`rejected`](Self::rejected).
    pub fn from_json_str(json: &str) -> Result<Self, PresetError> {
        let value: JsonValue =
            serde_json::from_str(json).map_err(|e| PresetError::NotAList(e.to_string()))?;
        Self::from_json_value(value)
    }

    /// Parse an already-decoded JSON value.
    pub fn from_json_value(value: JsonValue) -> Result<Self, PresetError> {
        let items = match value {
            JsonValue::Array(items) => items,
            other => return Err(PresetError::NotAList(format!("found {}", json_kind(&other)))),
        };
        let mut source = Self::new();
        for (index, item) in items.into_iter().enumerate() {
            source.push_value(index, item);
        }
        Ok(source)
    }

    /// Load every `*.json` file under `dir`, in path order.
    ///
    /// Files that cannot be read or are not record lists are logged and
    /// skipped.
    pub fn from_dir(dir: &Path) -> Self {
        let mut source = Self::new();
        let mut paths: Vec<_> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping preset file {}: {}", path.display(), e);
                    continue;
                }
            };
            match Self::from_json_str(&text) {
                Ok(parsed) => {
                    debug!("Loaded {} presets from {}", parsed.len(), path.display());
                    source.merge(parsed);
                }
                Err(e) => warn!("Skipping preset file {}: {}", path.display(), e),
            }
        }
        source
    }

    fn push_value(&mut self, index: usize, item: JsonValue) {
        let record = match serde_json::from_value::<PresetRecord>(item) {
            Ok(record) => record,
            Err(e) => {
                self.reject(PresetError::InvalidRecord {
                    index,
                    reason: e.to_string(),
                });
                return;
            }
        };
        if record.key.trim().is_empty() {
            self.reject(PresetError::InvalidRecord {
                index,
                reason: "empty key".to_string(),
            });
            return;
        }
        self.records.push(record);
    }

    fn reject(&mut self, error: PresetError) {
        warn!("{}", error);
        self.rejected.push(error);
    }

    /// Append another source's records.
    pub fn merge(&mut self, other: PresetSource) {
        self.records.extend(other.records);
        self.rejected.extend(other.rejected);
    }

    /// Accepted records.
    pub fn records(&self) -> &[PresetRecord] {
        &self.records
    }

    /// Records that were skipped, with the reason.
    pub fn rejected(&self) -> &[PresetError] {
        &self.rejected
    }

    /// Number of accepted records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was accepted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Descriptors for every accepted record.
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.records.iter().map(PresetRecord::to_descriptor).collect()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FilterKind;
    use image::{Rgba, RgbaImage};

    const PRESETS: &str = r#"[
        {"key": "warm_glow", "title": "Warm Glow", "rating": 2,
         "settings": {"temperature": 0.6, "exposure": 0.3}},
        {"title": "No key"},
        {"key": "faded", "hide": true, "settings": {"contrast": 0.7, "sparkle": 3}},
        42
    ]"#;

    #[test]
    fn test_bad_records_are_skipped() {
        let source = PresetSource::from_json_str(PRESETS).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.rejected().len(), 2);
        assert!(matches!(
            source.rejected()[0],
            PresetError::InvalidRecord { index: 1, .. }
        ));
    }

    #[test]
    fn test_not_a_list() {
        assert!(matches!(
            PresetSource::from_json_str(r#"{"key": "x"}"#),
            Err(PresetError::NotAList(_))
        ));
        assert!(PresetSource::from_json_str("not json").is_err());
    }

    #[test]
    fn test_descriptor_from_record() {
        let source = PresetSource::from_json_str(PRESETS).unwrap();
        let descriptors = source.descriptors();
        let warm = &descriptors[0];
        assert_eq!(warm.key(), "warm_glow");
        assert_eq!(warm.title(), "Warm Glow");
        assert_eq!(warm.kind(), FilterKind::Preset);
        assert_eq!(warm.default_rating(), 2);
        assert!(!warm.requires_secondary());

        let faded = &descriptors[1];
        assert_eq!(faded.title(), "faded");
        assert!(faded.hidden_by_default());
        assert_eq!(faded.defaults().float_or("contrast", 1.0), 0.7);
    }

    #[test]
    fn test_neutral_adjustments_keep_pixels() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([40, 120, 200, 255])));
        let out = PresetAdjustments::default().apply(&img);
        assert_eq!(out.to_rgba8(), img.to_rgba8());
    }

    #[test]
    fn test_warm_shift() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([128, 128, 128, 255])));
        let adj = PresetAdjustments {
            temperature: 1.0,
            ..Default::default()
        };
        let px = *adj.apply(&img).to_rgba8().get_pixel(0, 0);
        assert!(px[0] > 128);
        assert!(px[2] < 128);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), PRESETS).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = PresetSource::from_dir(dir.path());
        assert_eq!(source.len(), 2);
    }
}
