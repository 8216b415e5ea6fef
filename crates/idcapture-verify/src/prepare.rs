//! Binarization of card images ahead of OCR.
//!
//! Card photos are lit unevenly, so a single global threshold loses text on
//! one half of the card. Each pixel is instead compared with the mean of its
//! own neighbourhood after a light blur removes sensor noise.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Tuning for [`binarize_for_ocr`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OcrPrepParams {
    /// Sigma of the denoising blur; roughly a 3x3 kernel.
    pub blur_sigma: f32,
    /// Half-size of the square neighbourhood; 5 gives an 11x11 block.
    pub block_radius: u32,
    /// A pixel is ink when it is darker than the local mean minus this.
    pub offset: i32,
}

impl Default for OcrPrepParams {
    fn default() -> Self {
        Self {
            blur_sigma: 0.8,
            block_radius: 5,
            offset: 2,
        }
    }
}

/// Black text on white, same size as `gray`.
pub fn binarize_for_ocr(gray: &GrayImage, params: &OcrPrepParams) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let smoothed = if params.blur_sigma > 0.0 {
        gaussian_blur_f32(gray, params.blur_sigma)
    } else {
        gray.clone()
    };
    let table = SummedArea::new(&smoothed);

    GrayImage::from_fn(w, h, |x, y| {
        let mean = table.mean_around(x, y, params.block_radius);
        let threshold = mean - params.offset as f64;
        let value = f64::from(smoothed.get_pixel(x, y).0[0]);
        Luma([if value < threshold { 0 } else { 255 }])
    })
}

/// Summed-area table with a zero row and column in front.
struct SummedArea {
    width: u32,
    height: u32,
    sums: Vec<u64>,
}

impl SummedArea {
    fn new(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        let stride = width as usize + 1;
        let mut sums = vec![0u64; stride * (height as usize + 1)];
        for y in 0..height as usize {
            let mut row = 0u64;
            for x in 0..width as usize {
                row += u64::from(img.get_pixel(x as u32, y as u32).0[0]);
                sums[(y + 1) * stride + x + 1] = row + sums[y * stride + x + 1];
            }
        }
        Self { width, height, sums }
    }

    fn mean_around(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let stride = self.width as usize + 1;
        let x0 = cx.saturating_sub(radius) as usize;
        let y0 = cy.saturating_sub(radius) as usize;
        let x1 = (cx.saturating_add(radius) as usize + 1).min(self.width as usize);
        let y1 = (cy.saturating_add(radius) as usize + 1).min(self.height as usize);
        let area = ((x1 - x0) * (y1 - y0)) as f64;
        let sum = self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0];
        sum as f64 / area
    }
}
