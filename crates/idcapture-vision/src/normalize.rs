//! Perspective crop into the canonical card image.

use crate::convert::from_luma_image;
use crate::{FrameAnalyzer, NormalizerParams};
use idcapture_core::{
    homography_from_4pt, warp_perspective_gray, GrayImage, GrayImageView, ImageEncoding,
    NormalizedImage, Quadrilateral,
};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by [`DocumentNormalizer`].
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("degenerate quadrilateral (corner triangle ratio {ratio:.5})")]
    Degenerate { ratio: f32 },
    #[error("target size must be non-zero (got {width}x{height})")]
    EmptyTarget { width: u32, height: u32 },
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode normalized image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Crops and rectifies card regions.
///
/// Output is deterministic: the same frame, quad and target size always
/// produce byte-identical PNG data.
#[derive(Clone, Debug, Default)]
pub struct DocumentNormalizer {
    params: NormalizerParams,
}

impl DocumentNormalizer {
    pub fn new(params: NormalizerParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &NormalizerParams {
        &self.params
    }

    /// Crop to the configured canonical size.
    pub fn crop(
        &self,
        frame: &GrayImageView<'_>,
        quad: &Quadrilateral,
    ) -> Result<NormalizedImage, NormalizeError> {
        self.crop_to(frame, quad, self.params.target_width, self.params.target_height)
    }

    /// Map the four detected corners onto a `target_width x target_height`
    /// rectangle and encode the result as PNG.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, quad), fields(width = frame.width, height = frame.height))
    )]
    pub fn crop_to(
        &self,
        frame: &GrayImageView<'_>,
        quad: &Quadrilateral,
        target_width: u32,
        target_height: u32,
    ) -> Result<NormalizedImage, NormalizeError> {
        if target_width == 0 || target_height == 0 {
            return Err(NormalizeError::EmptyTarget {
                width: target_width,
                height: target_height,
            });
        }

        let ratio = quad.min_triangle_ratio();
        if !ratio.is_finite() || ratio < self.params.min_triangle_ratio {
            return Err(NormalizeError::Degenerate { ratio });
        }
        let mut ordered = quad.ordered();
        if !ordered.is_convex() {
            return Err(NormalizeError::Degenerate { ratio });
        }
        if self.params.landscape {
            let (across, down) = ordered.edge_lengths();
            if (down > across) != (target_height > target_width) {
                // card is held rotated relative to the target: start at the
                // top-right corner so the long edge maps onto the target width
                ordered.points.rotate_left(1);
            }
        }

        let (tw, th) = (target_width as f32, target_height as f32);
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(tw, 0.0),
            Point2::new(tw, th),
            Point2::new(0.0, th),
        ];
        let h_img_from_rect =
            homography_from_4pt(&rect, &ordered.points).ok_or(NormalizeError::Degenerate { ratio })?;

        let rectified = warp_perspective_gray(
            frame,
            h_img_from_rect,
            target_width as usize,
            target_height as usize,
        );
        let bytes = encode_png(&rectified)?;
        log::debug!(
            "normalized card to {}x{} ({} bytes)",
            target_width,
            target_height,
            bytes.len()
        );

        Ok(NormalizedImage {
            width: target_width,
            height: target_height,
            encoding: ImageEncoding::Png,
            rectified: true,
            bytes,
        })
    }

    /// Best-effort normalization of a caller-supplied image.
    ///
    /// The card is re-detected with `analyzer`; when no usable quadrilateral
    /// is found the original bytes are forwarded unchanged.
    pub fn normalize_upload(
        &self,
        bytes: &[u8],
        analyzer: &FrameAnalyzer,
    ) -> Result<NormalizedImage, NormalizeError> {
        let frame = decode_gray(bytes)?;
        let view = frame.view();
        if let Some(quad) = analyzer.locate(&view) {
            match self.crop(&view, &quad) {
                Ok(img) => return Ok(img),
                Err(NormalizeError::Degenerate { ratio }) => {
                    log::info!("re-detected upload quad is degenerate ({ratio:.5}); using raw image");
                }
                Err(err) => return Err(err),
            }
        } else {
            log::info!("no card outline in uploaded image; using raw image");
        }

        Ok(NormalizedImage {
            width: frame.width as u32,
            height: frame.height as u32,
            encoding: ImageEncoding::Passthrough,
            rectified: false,
            bytes: bytes.to_vec(),
        })
    }
}

/// Decode any supported image format into a luma frame.
pub fn decode_gray(bytes: &[u8]) -> Result<GrayImage, NormalizeError> {
    let img = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
    Ok(from_luma_image(img.to_luma8()))
}

/// Encode a luma buffer as PNG.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, NormalizeError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(
            &img.data,
            img.width as u32,
            img.height as u32,
            ExtendedColorType::L8,
        )
        .map_err(NormalizeError::Encode)?;
    Ok(bytes)
}
