//! One-shot helpers for still images: analyze, normalize and verify a single
//! file without running a capture session.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::capture::CaptureConfig;
use crate::core::{DetectionSample, GrayImage, NormalizedImage, Side};
use crate::verify::{VerificationClient, VerificationOutcome, VerifyError};
use crate::vision::{from_luma_image, DocumentNormalizer, FrameAnalyzer, NormalizeError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no fully visible card found in {0}")]
    NoCard(PathBuf),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// Per-image detection summary, as printed by `idcapture analyze`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReport {
    pub width: usize,
    pub height: usize,
    pub sample: DetectionSample,
    /// Whether a camera session for the given side would start its dwell timer.
    pub qualifies_front: bool,
    pub qualifies_back: bool,
}

/// Load any supported image file as a luma frame.
pub fn load_frame(path: impl AsRef<Path>) -> Result<GrayImage, PipelineError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(source) => PipelineError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => PipelineError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Ok(from_luma_image(img.to_luma8()))
}

/// Run the per-frame analysis on a single image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(frame, config), fields(width = frame.width, height = frame.height))
)]
pub fn analyze_frame(frame: &GrayImage, config: &CaptureConfig) -> AnalyzeReport {
    let analyzer = FrameAnalyzer::new(config.analyzer.clone());
    let sample = analyzer.analyze(&frame.view());
    AnalyzeReport {
        width: frame.width,
        height: frame.height,
        qualifies_front: sample.qualifies(config.floor(Side::Front)),
        qualifies_back: sample.qualifies(config.floor(Side::Back)),
        sample,
    }
}

pub fn analyze_image(path: impl AsRef<Path>, config: &CaptureConfig) -> Result<AnalyzeReport, PipelineError> {
    let frame = load_frame(path)?;
    Ok(analyze_frame(&frame, config))
}

/// Detect the card in a still photo and crop it to the canonical size.
///
/// Unlike an upload, a photo without a card that clears the visibility gate
/// (all four corners inside the frame margin) is an error here.
pub fn normalize_image(path: impl AsRef<Path>, config: &CaptureConfig) -> Result<NormalizedImage, PipelineError> {
    let path = path.as_ref();
    let frame = load_frame(path)?;
    let analyzer = FrameAnalyzer::new(config.analyzer.clone());
    let sample = analyzer.analyze(&frame.view());
    let quad = match sample.quadrilateral {
        Some(quad) if sample.fully_visible => quad,
        _ => return Err(PipelineError::NoCard(path.to_path_buf())),
    };
    let normalizer = DocumentNormalizer::new(config.normalizer.clone());
    Ok(normalizer.crop(&frame.view(), &quad)?)
}

/// Prepare an arbitrary image file the way a manual upload is prepared.
pub fn prepare_upload(path: impl AsRef<Path>, config: &CaptureConfig) -> Result<NormalizedImage, PipelineError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let analyzer = FrameAnalyzer::new(config.analyzer.clone());
    let normalizer = DocumentNormalizer::new(config.normalizer.clone());
    Ok(normalizer.normalize_upload(&bytes, &analyzer)?)
}

/// Submit one image through `client` and return the raw outcome.
///
/// The caller decides what the outcome means via
/// [`VerificationOutcome::judge`].
pub async fn verify_image(
    client: &VerificationClient,
    side: Side,
    image: &NormalizedImage,
) -> Result<VerificationOutcome, PipelineError> {
    Ok(client.submit(0, side, image).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage as LumaImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn card_photo(dir: &Path) -> PathBuf {
        let mut img = LumaImage::from_pixel(640, 480, Luma([30]));
        draw_filled_rect_mut(&mut img, Rect::at(120, 110).of_size(400, 250), Luma([220]));
        for i in 0..12 {
            let y = 140 + i * 18;
            draw_filled_rect_mut(&mut img, Rect::at(150, y).of_size(300, 6), Luma([40]));
        }
        let path = dir.join("card.png");
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn analyze_reports_a_centered_card() {
        let dir = tempfile::tempdir().unwrap();
        let report = analyze_image(card_photo(dir.path()), &CaptureConfig::default()).unwrap();
        assert_eq!((report.width, report.height), (640, 480));
        assert!(report.sample.quadrilateral.is_some());
        assert!(report.sample.fully_visible);
    }

    #[test]
    fn normalize_produces_canonical_size() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CaptureConfig::default();
        let img = normalize_image(card_photo(dir.path()), &cfg).unwrap();
        assert!(img.rectified);
        assert_eq!(
            (img.width, img.height),
            (cfg.normalizer.target_width, cfg.normalizer.target_height)
        );
    }

    #[test]
    fn blank_photo_has_no_card() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        LumaImage::from_pixel(320, 240, Luma([90])).save(&path).unwrap();
        let err = normalize_image(&path, &CaptureConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoCard(_)));
    }

    #[test]
    fn card_cut_off_by_the_frame_edge_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = LumaImage::from_pixel(640, 480, Luma([30]));
        draw_filled_rect_mut(&mut img, Rect::at(-80, 110).of_size(400, 250), Luma([220]));
        let path = dir.path().join("clipped.png");
        img.save(&path).unwrap();

        let cfg = CaptureConfig::default();
        assert!(!analyze_image(&path, &cfg).unwrap().sample.fully_visible);
        let err = normalize_image(&path, &cfg).unwrap_err();
        assert!(matches!(err, PipelineError::NoCard(_)));
        assert!(err.to_string().starts_with("no fully visible card found in"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_frame("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
