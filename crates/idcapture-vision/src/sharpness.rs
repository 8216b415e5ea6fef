//! Focus measure: variance of the Laplacian response.

use imageproc::filter::laplacian_filter;

/// Variance of the 3x3 Laplacian over the whole image.
///
/// Flat or defocused frames score near zero; crisp printed text on a card
/// scores in the hundreds at the default working resolution.
pub fn laplacian_variance(img: &image::GrayImage) -> f32 {
    let n = (img.width() as u64 * img.height() as u64) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let lap = laplacian_filter(img);
    let (mut sum, mut sum_sq) = (0.0_f64, 0.0_f64);
    for px in lap.pixels() {
        let v = px.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / n;
    ((sum_sq / n) - mean * mean).max(0.0) as f32
}
