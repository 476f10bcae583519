//! Blur and sharpen filters.

use crate::core::descriptor::{Descriptor, FilterOperation};
use crate::core::parameter::{ParameterDefinition, ParameterSet};
use image::DynamicImage;

pub(super) fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor::builder("gaussian_blur", "Gaussian Blur", FilterOperation::single(gaussian_blur))
            .description("Apply a Gaussian blur effect to an image")
            .parameter(ParameterDefinition::float("sigma", 0.1, 50.0, 2.0))
            .slow(true)
            .build(),
        Descriptor::builder("sharpen", "Sharpen", FilterOperation::single(sharpen))
            .description("Unsharp mask")
            .parameter(ParameterDefinition::float("sigma", 0.1, 10.0, 1.5))
            .parameter(ParameterDefinition::float("threshold", 0.0, 64.0, 2.0))
            .build(),
    ]
}

fn gaussian_blur(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    let sigma = params.float_or("sigma", 2.0);
    if sigma <= 0.0 {
        return None;
    }
    let rgba = image.to_rgba8();
    let blurred = imageproc::filter::gaussian_blur_f32(&rgba, sigma);
    Some(DynamicImage::ImageRgba8(blurred))
}

fn sharpen(image: &DynamicImage, params: &ParameterSet) -> Option<DynamicImage> {
    let sigma = params.float_or("sigma", 1.5);
    let threshold = params.float_or("threshold", 2.0) as i32;
    Some(image.unsharpen(sigma, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_blur_spreads_a_dot() {
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let d = &descriptors()[0];
        assert!(d.is_slow());
        let out = d.apply(&DynamicImage::ImageRgba8(img), None).unwrap().to_rgba8();
        assert!(out.get_pixel(4, 4)[0] < 255);
        assert!(out.get_pixel(5, 4)[0] > 0);
    }

    #[test]
    fn test_sharpen_keeps_size() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 4, Rgba([90, 90, 90, 255])));
        let out = descriptors()[1].apply(&img, None).unwrap();
        assert_eq!((out.width(), out.height()), (5, 4));
    }
}
