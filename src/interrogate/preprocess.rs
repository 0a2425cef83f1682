//! Image preprocessing for the BLIP and CLIP vision encoders.

use crate::constants::interrogate::{BLIP_IMAGE_SIZE, CLIP_IMAGE_SIZE};
use crate::constants::normalize::{MEAN, STD};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

/// BLIP input: bicubic resize to 384x384 (aspect ratio not kept), normalized NCHW.
pub fn blip_input(image: &DynamicImage) -> Array4<f32> {
    let resized = image.resize_exact(BLIP_IMAGE_SIZE, BLIP_IMAGE_SIZE, FilterType::CatmullRom);
    normalized_nchw(&resized.to_rgb8())
}

/// CLIP input: shortest side to 224 (bicubic), centre crop 224x224, normalized NCHW.
pub fn clip_input(image: &DynamicImage) -> Array4<f32> {
    let (w, h) = shortest_side_size(image.width(), image.height(), CLIP_IMAGE_SIZE);
    let resized = image.resize_exact(w, h, FilterType::CatmullRom);
    let left = centre_offset(w, CLIP_IMAGE_SIZE);
    let top = centre_offset(h, CLIP_IMAGE_SIZE);
    let cropped = resized.crop_imm(left, top, CLIP_IMAGE_SIZE, CLIP_IMAGE_SIZE);
    normalized_nchw(&cropped.to_rgb8())
}

/// Size with the shortest side scaled to `target`, the long side truncated.
fn shortest_side_size(width: u32, height: u32, target: u32) -> (u32, u32) {
    let (w, h) = (width.max(1), height.max(1));
    if w <= h {
        let long = (u64::from(target) * u64::from(h) / u64::from(w)) as u32;
        (target, long.max(target))
    } else {
        let long = (u64::from(target) * u64::from(w) / u64::from(h)) as u32;
        (long.max(target), target)
    }
}

fn centre_offset(size: u32, crop: u32) -> u32 {
    (f64::from(size.saturating_sub(crop)) / 2.0).round() as u32
}

/// `(pixel / 255 - mean) / std` in `[1, 3, H, W]` layout.
fn normalized_nchw(rgb: &RgbImage) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        let value = f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0;
        (value - MEAN[c]) / STD[c]
    })
}
