//! Bridges between the core pixel buffers and `image` buffers.

use idcapture_core::{GrayImage, GrayImageView};
use image::imageops::{self, FilterType};

/// Copy a core view into an `image::GrayImage`.
pub fn to_luma_image(view: &GrayImageView<'_>) -> Option<image::GrayImage> {
    image::GrayImage::from_raw(view.width as u32, view.height as u32, view.data.to_vec())
}

/// Convert an `image::GrayImage` into the owned core buffer.
pub fn from_luma_image(img: image::GrayImage) -> GrayImage {
    let width = img.width() as usize;
    let height = img.height() as usize;
    GrayImage {
        width,
        height,
        data: img.into_raw(),
    }
}

/// Downscaled working copy plus the factor that maps working coordinates
/// back to frame coordinates (`frame = working / scale`).
pub(crate) fn working_copy(view: &GrayImageView<'_>, max_side: u32) -> Option<(image::GrayImage, f32)> {
    let img = to_luma_image(view)?;
    let longest = img.width().max(img.height());
    if max_side == 0 || longest <= max_side {
        return Some((img, 1.0));
    }
    let scale = max_side as f32 / longest as f32;
    let w = ((img.width() as f32 * scale).round() as u32).max(1);
    let h = ((img.height() as f32 * scale).round() as u32).max(1);
    let small = imageops::resize(&img, w, h, FilterType::Triangle);
    Some((small, scale))
}
