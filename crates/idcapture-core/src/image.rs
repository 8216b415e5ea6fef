/// Errors produced when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageBufferError {
    #[error("invalid pixel buffer length (expected {expected} bytes, got {got})")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned 8-bit luma frame. This is the unit a camera tick hands to analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Wrap an existing row-major luma buffer.
    pub fn from_luma8(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageBufferError> {
        check_dimensions(width, height)?;
        let expected = width * height;
        if data.len() != expected {
            return Err(ImageBufferError::InvalidLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert a packed RGB8 buffer (BT.601 weights).
    pub fn from_rgb8(width: usize, height: usize, data: &[u8]) -> Result<Self, ImageBufferError> {
        Self::from_interleaved(width, height, data, 3)
    }

    /// Convert a packed RGBA8 buffer; alpha is ignored.
    pub fn from_rgba8(width: usize, height: usize, data: &[u8]) -> Result<Self, ImageBufferError> {
        Self::from_interleaved(width, height, data, 4)
    }

    fn from_interleaved(
        width: usize,
        height: usize,
        data: &[u8],
        channels: usize,
    ) -> Result<Self, ImageBufferError> {
        check_dimensions(width, height)?;
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(ImageBufferError::InvalidLength {
                expected,
                got: data.len(),
            });
        }
        let gray = data
            .chunks_exact(channels)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect();
        Ok(Self {
            width,
            height,
            data: gray,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

#[inline]
fn check_dimensions(width: usize, height: usize) -> Result<(), ImageBufferError> {
    if width == 0 || height == 0 {
        return Err(ImageBufferError::InvalidDimensions { width, height });
    }
    Ok(())
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    // fixed-point 0.299 / 0.587 / 0.114
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29 + 128) >> 8) as u8
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_conversion_uses_luma_weights() {
        let rgb = [255u8, 255, 255, 0, 0, 0, 255, 0, 0];
        let img = GrayImage::from_rgb8(3, 1, &rgb).expect("valid buffer");
        assert_eq!(img.data[0], 255);
        assert_eq!(img.data[1], 0);
        assert_eq!(img.data[2], 77);
    }

    #[test]
    fn rgba_length_is_checked() {
        let err = GrayImage::from_rgba8(2, 2, &[0u8; 12]).unwrap_err();
        assert_eq!(
            err,
            ImageBufferError::InvalidLength {
                expected: 16,
                got: 12
            }
        );
    }

    #[test]
    fn zero_sized_frames_are_rejected() {
        assert!(matches!(
            GrayImage::from_luma8(0, 10, Vec::new()),
            Err(ImageBufferError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn bilinear_interpolates_between_neighbours() {
        let img = GrayImage::from_luma8(2, 1, vec![0, 100]).expect("valid buffer");
        let v = sample_bilinear(&img.view(), 0.25, 0.0);
        assert!((v - 25.0).abs() < 1e-4);
        assert_eq!(sample_bilinear_u8(&img.view(), -5.0, -5.0), 0);
    }
}
