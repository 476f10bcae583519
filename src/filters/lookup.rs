//! Per-channel tone lookup tables.
//!
//! A lookup filter maps every 8-bit channel value through a 256-entry table.
//! Tables come either from curve control points or from a strip image whose
//! first row holds the mapping (pixel `x` gives the output for input `x`).

use crate::core::error::PresetError;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Control points of one channel curve, `(input, output)` in `0..=255`.
pub type CurvePoints = Vec<(u8, u8)>;

/// Curve definitions as they appear in catalog files.
///
/// `all` applies to every channel; a per-channel entry overrides it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CurveSpec {
    #[serde(default)]
    pub all: Option<CurvePoints>,
    #[serde(default)]
    pub r: Option<CurvePoints>,
    #[serde(default)]
    pub g: Option<CurvePoints>,
    #[serde(default)]
    pub b: Option<CurvePoints>,
}

/// Three 256-entry channel tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneLookup {
    tables: [[u8; 256]; 3],
}

impl ToneLookup {
    /// The identity mapping.
    pub fn identity() -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        Self {
            tables: [table; 3],
        }
    }

    /// Build from curve control points.
    pub fn from_curves(key: &str, curves: &CurveSpec) -> Result<Self, PresetError> {
        let shared = curves.all.as_ref();
        let mut tables = Self::identity().tables;
        for (channel, points) in [&curves.r, &curves.g, &curves.b].into_iter().enumerate() {
            if let Some(points) = points.as_ref().or(shared) {
                tables[channel] = interpolate(key, points)?;
            }
        }
        Ok(Self { tables })
    }

    /// Build from a lookup strip image at least 256 pixels wide.
    pub fn from_image(key: &str, image: &DynamicImage) -> Result<Self, PresetError> {
        if image.width() < 256 || image.height() == 0 {
            return Err(PresetError::InvalidLookup {
                key: key.to_string(),
                reason: format!(
                    "strip must be at least 256x1, got {}x{}",
                    image.width(),
                    image.height()
                ),
            });
        }
        let mut tables = [[0u8; 256]; 3];
        for x in 0..256u32 {
            let px = image.get_pixel(x, 0);
            for (channel, table) in tables.iter_mut().enumerate() {
                table[x as usize] = px[channel];
            }
        }
        Ok(Self { tables })
    }

    /// Load a strip image from disk.
    pub fn from_path(key: &str, path: &Path) -> Result<Self, PresetError> {
        let image = image::open(path).map_err(|e| PresetError::InvalidLookup {
            key: key.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_image(key, &image)
    }

    /// Map one channel value.
    pub fn map(&self, channel: usize, value: u8) -> u8 {
        self.tables[channel][value as usize]
    }

    /// Apply the tables to every pixel, keeping alpha.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let mut out = image.to_rgba8();
        for p in out.pixels_mut() {
            for channel in 0..3 {
                p[channel] = self.tables[channel][p[channel] as usize];
            }
        }
        DynamicImage::ImageRgba8(out)
    }
}

/// Linear interpolation through sorted control points, extended flat at both
/// ends.
fn interpolate(key: &str, points: &[(u8, u8)]) -> Result<[u8; 256], PresetError> {
    if points.is_empty() {
        return Err(PresetError::InvalidLookup {
            key: key.to_string(),
            reason: "curve has no control points".to_string(),
        });
    }
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|(x, _)| *x);
    sorted.dedup_by_key(|(x, _)| *x);

    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let x = i as f32;
        let upper = sorted.iter().position(|(px, _)| *px as f32 >= x);
        *slot = match upper {
            None => sorted[sorted.len() - 1].1,
            Some(0) => sorted[0].1,
            Some(j) => {
                let (x0, y0) = (sorted[j - 1].0 as f32, sorted[j - 1].1 as f32);
                let (x1, y1) = (sorted[j].0 as f32, sorted[j].1 as f32);
                let t = (x - x0) / (x1 - x0);
                (y0 + t * (y1 - y0)).round().clamp(0.0, 255.0) as u8
            }
        };
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_identity_curve() {
        let curves = CurveSpec {
            all: Some(vec![(0, 0), (255, 255)]),
            ..Default::default()
        };
        let lut = ToneLookup::from_curves("id", &curves).unwrap();
        assert_eq!(lut, ToneLookup::identity());
    }

    #[test]
    fn test_channel_override() {
        let curves = CurveSpec {
            all: Some(vec![(0, 0), (255, 255)]),
            r: Some(vec![(0, 255), (255, 0)]),
            ..Default::default()
        };
        let lut = ToneLookup::from_curves("invert_red", &curves).unwrap();
        assert_eq!(lut.map(0, 0), 255);
        assert_eq!(lut.map(0, 255), 0);
        assert_eq!(lut.map(1, 200), 200);
    }

    #[test]
    fn test_interpolation_midpoint() {
        let curves = CurveSpec {
            all: Some(vec![(0, 0), (128, 200), (255, 255)]),
            ..Default::default()
        };
        let lut = ToneLookup::from_curves("lift", &curves).unwrap();
        assert_eq!(lut.map(2, 128), 200);
        assert_eq!(lut.map(2, 64), 100);
    }

    #[test]
    fn test_empty_curve_is_rejected() {
        let curves = CurveSpec {
            g: Some(vec![]),
            ..Default::default()
        };
        assert!(ToneLookup::from_curves("bad", &curves).is_err());
    }

    #[test]
    fn test_from_strip_image() {
        let strip = RgbaImage::from_fn(256, 1, |x, _| Rgba([255 - x as u8, x as u8, 7, 255]));
        let lut = ToneLookup::from_image("strip", &DynamicImage::ImageRgba8(strip)).unwrap();
        assert_eq!(lut.map(0, 10), 245);
        assert_eq!(lut.map(1, 10), 10);
        assert_eq!(lut.map(2, 10), 7);

        let narrow = DynamicImage::ImageRgba8(RgbaImage::new(16, 1));
        assert!(ToneLookup::from_image("narrow", &narrow).is_err());
    }

    #[test]
    fn test_apply_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 40])));
        let out = ToneLookup::identity().apply(&img).to_rgba8();
        assert_eq!(out.get_pixel(0, 0), &Rgba([10, 20, 30, 40]));
    }
}
