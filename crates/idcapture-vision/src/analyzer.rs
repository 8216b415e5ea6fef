use crate::{AnalyzerParams, ContourBackend, VisibilityGate, VisionBackend};
use idcapture_core::{DetectionSample, GrayImageView, Quadrilateral};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Turns one frame into one [`DetectionSample`].
pub struct FrameAnalyzer {
    backend: Box<dyn VisionBackend>,
    gate: VisibilityGate,
}

impl Default for FrameAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerParams::default())
    }
}

impl FrameAnalyzer {
    /// Analyzer over the default contour backend.
    pub fn new(params: AnalyzerParams) -> Self {
        let gate = VisibilityGate::new(params.visibility_margin_frac);
        Self {
            backend: Box::new(ContourBackend::new(params)),
            gate,
        }
    }

    /// Analyzer over a caller-provided backend.
    pub fn with_backend(backend: impl VisionBackend + 'static, gate: VisibilityGate) -> Self {
        Self {
            backend: Box::new(backend),
            gate,
        }
    }

    #[inline]
    pub fn gate(&self) -> &VisibilityGate {
        &self.gate
    }

    /// Locate a card boundary without scoring the frame.
    pub fn locate(&self, frame: &GrayImageView<'_>) -> Option<Quadrilateral> {
        self.backend.locate_quadrilateral(frame)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn analyze(&self, frame: &GrayImageView<'_>) -> DetectionSample {
        let sharpness = self.backend.score_sharpness(frame).max(0.0);
        let Some(quad) = self.backend.locate_quadrilateral(frame) else {
            return DetectionSample::empty(sharpness);
        };
        let fully_visible = self.gate.is_fully_visible(&quad, frame.width, frame.height);
        if !fully_visible {
            log::trace!("card partially visible: {:?}", quad.bounds());
        }
        DetectionSample {
            quadrilateral: Some(quad),
            sharpness,
            fully_visible,
        }
    }
}
