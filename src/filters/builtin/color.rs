//! Color adjustment filters.

use crate::core::descriptor::{Descriptor, FilterOperation};
use crate::core::parameter::{ParameterDefinition, ParameterSet};
use image::{DynamicImage, Pixel};

pub(super) fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor::builder("brightness", "Brightness", FilterOperation::single(brightness))
            .description("Adjust the brightness of an image")
            .parameter(ParameterDefinition::float("amount", -1.0, 1.0, 0.15))
            .tag("adjust")
            .build(),
        Descriptor::builder("contrast", "Contrast", FilterOperation::single(contrast))
            .description("Adjust the contrast of an image")
            .parameter(ParameterDefinition::float("amount", -100.0, 100.0, 25.0))
            .tag("adjust")
            .build(),
        Descriptor::builder("saturation", "Saturation", FilterOperation::single(saturation))
            .description("Scale color saturation")
            .parameter(ParameterDefinition::float("factor", 0.0, 3.0, 1.6))
            .tag("adjust")
            .build(),
        Descriptor::builder("grayscale", "Grayscale", FilterOperation::single(grayscale))
            .description("Convert to shades of grey")
            .tag("mono")
            .build(),
        Descriptor::builder("invert", "Invert", FilterOperation::single(invert))
            .description("Invert every color channel")
            .build(),
        Descriptor::builder("sepia", "Sepia", FilterOperation::single(sepia))
            .description("Warm brown antique tone")
            .parameter(ParameterDefinition::float("intensity", 0.0, 1.0, 1.0))
            .tag("vintage")
            .build(),
        Descriptor::builder("vignette", "Vignette", FilterOperation::single(vignette))
            .description("Darken the corners")
            .parameter(ParameterDefinition::float("strength", 0.0, 1.0, 0.6))
            .tag("vintage")
            .build(),
        Descriptor::builder("posterize", "Posterize", FilterOperation::style(|img| Some(posterize(img, 4))))
            .description("Reduce each channel to a few flat levels")
            .tag("style")
            .build(),
    ]
}

fn brightness(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    let amount = params.float_or("amount", 0.0);
    Some(image.brighten((amount * 255.0) as i32))
}

fn contrast(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    Some(image.adjust_contrast(params.float_or("amount", 0.0)))
}

fn saturation(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    let factor = params.float_or("factor", 1.0);
    let mut result = image.to_rgba8();
    for pixel in result.pixels_mut() {
        let c = pixel.channels_mut();
        let luma = 0.299 * c[0] as f32 + 0.587 * c[1] as f32 + 0.114 * c[2] as f32;
        for v in c.iter_mut().take(3) {
            *v = (luma + (*v as f32 - luma) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    Some(DynamicImage::ImageRgba8(result))
}

fn grayscale(image: &DynamicImage, _params: &ParameterSet) -> Option<DynamicImage> {
    Some(DynamicImage::ImageRgba8(image.grayscale().to_rgba8()))
}

fn invert(image: &DynamicImage, _params: &ParameterSet) -> Option<DynamicImage> {
    let mut result = image.clone();
    result.invert();
    Some(result)
}

fn sepia(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    let intensity = params.float_or("intensity", 1.0).clamp(0.0, 1.0);
    let mut result = image.to_rgba8();
    for pixel in result.pixels_mut() {
        let c = pixel.channels_mut();
        let (r, g, b) = (c[0] as f32, c[1] as f32, c[2] as f32);
        let toned = [
            0.393 * r + 0.769 * g + 0.189 * b,
            0.349 * r + 0.686 * g + 0.168 * b,
            0.272 * r + 0.534 * g + 0.131 * b,
        ];
        for (v, t) in c.iter_mut().zip(toned) {
            *v = (*v as f32 * (1.0 - intensity) + t * intensity).round().clamp(0.0, 255.0) as u8;
        }
    }
    Some(DynamicImage::ImageRgba8(result))
}

fn vignette(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    let strength = params.float_or("strength", 0.6).clamp(0.0, 1.0);
    let mut result = image.to_rgba8();
    let (w, h) = result.dimensions();
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);
    for (x, y, pixel) in result.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let d = (dx * dx + dy * dy).sqrt() / max_dist;
        let gain = 1.0 - strength * d * d;
        for v in pixel.channels_mut().iter_mut().take(3) {
            *v = (*v as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    Some(DynamicImage::ImageRgba8(result))
}

fn posterize(image: &DynamicImage, levels: u8) -> DynamicImage {
    let step = 255.0 / (levels.max(2) - 1) as f32;
    let mut result = image.to_rgba8();
    for pixel in result.pixels_mut() {
        for v in pixel.channels_mut().iter_mut().take(3) {
            *v = ((*v as f32 / step).round() * step).round() as u8;
        }
    }
    DynamicImage::ImageRgba8(result)
}
