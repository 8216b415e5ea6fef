//! Per-frame vision for identity-card capture.
//!
//! - [`FrameAnalyzer`] turns a frame into a [`DetectionSample`](idcapture_core::DetectionSample):
//!   card quadrilateral (if any), sharpness score, and the [`VisibilityGate`] verdict.
//! - [`DocumentNormalizer`] perspective-crops a detected card into the
//!   canonical image handed to verification.
//! - [`VisionBackend`] is the seam for swapping the detection algorithm; the
//!   default [`ContourBackend`] uses `imageproc` edges and contours.

mod analyzer;
mod backend;
mod contour;
mod convert;
mod normalize;
mod params;
mod sharpness;
mod visibility;

pub use analyzer::FrameAnalyzer;
pub use backend::{ContourBackend, VisionBackend};
pub use contour::find_card_quad;
pub use convert::{from_luma_image, to_luma_image};
pub use normalize::{decode_gray, encode_png, DocumentNormalizer, NormalizeError};
pub use params::{AnalyzerParams, NormalizerParams};
pub use sharpness::laplacian_variance;
pub use visibility::VisibilityGate;
