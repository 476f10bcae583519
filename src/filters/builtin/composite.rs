//! Blend filters: combine the input with the secondary blend image.

use crate::core::descriptor::{Descriptor, FilterOperation};
use crate::core::parameter::{ParameterDefinition, ParameterSet};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlendMode {
    Multiply,
    Screen,
    Overlay,
}

pub(super) fn descriptors() -> Vec<Descriptor> {
    vec![
        blend("multiply_blend", "Multiply", BlendMode::Multiply, "Darken by multiplying with the blend image"),
        blend("screen_blend", "Screen", BlendMode::Screen, "Lighten by screening with the blend image"),
        blend("overlay_blend", "Overlay", BlendMode::Overlay, "Multiply shadows and screen highlights"),
    ]
}

fn blend(key: &str, title: &str, mode: BlendMode, description: &str) -> Descriptor {
    Descriptor::builder(
        key,
        title,
        FilterOperation::blend(move |base, layer, params| Some(composite(base, layer, params, mode))),
    )
    .description(description)
    .parameter(ParameterDefinition::float("opacity", 0.0, 1.0, 1.0))
    .tag("blend")
    .build()
}

fn composite(base: &DynamicImage, layer: &DynamicImage, params: &ParameterSet, mode: BlendMode) -> DynamicImage {
    let opacity = params.float_or("opacity", 1.0).clamp(0.0, 1.0);
    let mut result = base.to_rgba8();
    let (w, h) = result.dimensions();
    let layer = if layer.width() == w && layer.height() == h {
        layer.to_rgba8()
    } else {
        layer.resize_exact(w, h, FilterType::Triangle).to_rgba8()
    };

    for (x, y, px) in result.enumerate_pixels_mut() {
        *px = blend_pixels(px, layer.get_pixel(x, y), mode, opacity);
    }
    DynamicImage::ImageRgba8(result)
}

/// Blend two pixels together.
fn blend_pixels(base: &Rgba<u8>, layer: &Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    let b = base.0.map(|c| c as f32 / 255.0);
    let l = layer.0.map(|c| c as f32 / 255.0);

    let mut blended = [0.0f32; 3];
    for i in 0..3 {
        blended[i] = match mode {
            BlendMode::Multiply => b[i] * l[i],
            BlendMode::Screen => 1.0 - (1.0 - b[i]) * (1.0 - l[i]),
            BlendMode::Overlay => overlay_channel(b[i], l[i]),
        };
    }

    let layer_alpha = l[3] * opacity;
    let mut out = [0u8; 4];
    for i in 0..3 {
        let v = b[i] * (1.0 - layer_alpha) + blended[i] * layer_alpha;
        out[i] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    out[3] = base[3];
    Rgba(out)
}

fn overlay_channel(base: f32, blend: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * blend
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - blend)
    }
}
