//! Input preparation: pre-downsampling and the low-resolution conditioning tensor.

use crate::config::Interpolation;
use crate::constants::ldsr::NATIVE_SCALE;
use crate::error::{Error, Result};
use image::DynamicImage;
use ndarray::Array4;
use tracing::info;

/// Shrink the image so the model's fixed 4x upscale lands on `target_scale`.
///
/// The rate is `target_scale / 4`; nothing happens when it is exactly 1.
pub fn downsample(
    image: &DynamicImage,
    target_scale: f32,
    method: Interpolation,
) -> Result<DynamicImage> {
    let rate = target_scale / NATIVE_SCALE;
    let (width, height) = (image.width(), image.height());

    if (rate - 1.0).abs() < f32::EPSILON {
        info!("Down sample rate is 1 from {target_scale} / 4 (not downsampling)");
        return Ok(image.clone());
    }

    let new_width = (width as f32 * rate) as u32;
    let new_height = (height as f32 * rate) as u32;
    if new_width == 0 || new_height == 0 {
        return Err(Error::InvalidImageSize {
            width,
            height,
            reason: format!("too small for target scale {target_scale}"),
        });
    }

    info!("Downsampling from [{width}, {height}] to [{new_width}, {new_height}] ({method})");
    Ok(image.resize_exact(new_width, new_height, method.filter()))
}

/// RGB image as `[1, 3, H, W]` in `[-1, 1]`.
pub fn conditioning(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        let value = f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0;
        2.0f32.mul_add(value, -1.0)
    })
}

/// `[1, 3, H, W]` samples in `[-1, 1]` to an RGB image.
///
/// Values are clamped, mapped to `[0, 255]` and truncated.
pub fn to_image(sample: &Array4<f32>) -> Result<DynamicImage> {
    let (batch, channels, height, width) = sample.dim();
    if batch != 1 || channels != 3 {
        return Err(Error::UnexpectedShape {
            name: "first_stage_decoder".to_string(),
            shape: sample.shape().to_vec(),
        });
    }
    let image = image::RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let pixel = |c: usize| {
            let v = sample[[0, c, y as usize, x as usize]].clamp(-1.0, 1.0);
            ((v + 1.0) / 2.0 * 255.0) as u8
        };
        image::Rgb([pixel(0), pixel(1), pixel(2)])
    });
    Ok(DynamicImage::ImageRgb8(image))
}
