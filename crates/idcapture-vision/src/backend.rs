use crate::contour::find_card_quad;
use crate::convert::working_copy;
use crate::sharpness::laplacian_variance;
use crate::AnalyzerParams;
use idcapture_core::{GrayImageView, Quadrilateral};

/// Vision capabilities the capture pipeline needs from a frame.
///
/// Both calls are pure functions of the frame and must not retain it.
pub trait VisionBackend: Send + Sync {
    /// Candidate card boundary in frame coordinates, or `None` when the frame
    /// holds no 4-point candidate.
    fn locate_quadrilateral(&self, frame: &GrayImageView<'_>) -> Option<Quadrilateral>;

    /// Non-negative focus score; higher is sharper.
    fn score_sharpness(&self, frame: &GrayImageView<'_>) -> f32;
}

/// Default backend: Canny edges + contour polygon approximation for the
/// quadrilateral, Laplacian variance for sharpness.
#[derive(Clone, Debug, Default)]
pub struct ContourBackend {
    params: AnalyzerParams,
}

impl ContourBackend {
    pub fn new(params: AnalyzerParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &AnalyzerParams {
        &self.params
    }
}

impl VisionBackend for ContourBackend {
    fn locate_quadrilateral(&self, frame: &GrayImageView<'_>) -> Option<Quadrilateral> {
        let (work, scale) = working_copy(frame, self.params.working_max_side)?;
        let quad = find_card_quad(&work, &self.params)?;
        Some(if scale == 1.0 { quad } else { quad.scaled(1.0 / scale) })
    }

    fn score_sharpness(&self, frame: &GrayImageView<'_>) -> f32 {
        working_copy(frame, self.params.working_max_side)
            .map(|(work, _)| laplacian_variance(&work))
            .unwrap_or(0.0)
    }
}
