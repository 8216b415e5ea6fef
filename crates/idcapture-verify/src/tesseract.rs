use std::collections::HashMap;

use idcapture_core::NormalizedImage;
use image::DynamicImage;
use rusty_tesseract::{Args, Image};

use crate::local::{RecognizeError, TextRecognizer};
use crate::prepare::{binarize_for_ocr, OcrPrepParams};

/// Recognizer backed by the system `tesseract` binary.
///
/// Images are binarized with [`binarize_for_ocr`] before they are handed to
/// tesseract.
#[derive(Clone, Debug)]
pub struct TesseractRecognizer {
    lang: String,
    psm: Option<i32>,
    prep: OcrPrepParams,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            lang: "eng+ara".to_string(),
            psm: Some(11),
            prep: OcrPrepParams::default(),
        }
    }
}

impl TesseractRecognizer {
    pub fn with_lang(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            ..Self::default()
        }
    }

    /// Decode `bytes` and binarize them for recognition.
    fn prepare(&self, bytes: &[u8]) -> Result<DynamicImage, RecognizeError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| RecognizeError::Image(e.to_string()))?;
        let binary = binarize_for_ocr(&decoded.to_luma8(), &self.prep);
        Ok(DynamicImage::ImageLuma8(binary))
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &NormalizedImage) -> Result<String, RecognizeError> {
        let prepared = self.prepare(&image.bytes)?;
        let tess_img =
            Image::from_dynamic_image(&prepared).map_err(|e| RecognizeError::Image(e.to_string()))?;
        let args = Args {
            lang: self.lang.clone(),
            config_variables: HashMap::new(),
            dpi: Some(150),
            psm: self.psm,
            oem: Some(3),
        };
        log::debug!(
            "running tesseract ({}) on {}x{} binarized image",
            self.lang,
            prepared.width(),
            prepared.height()
        );
        rusty_tesseract::image_to_string(&tess_img, &args)
            .map_err(|e| RecognizeError::Backend(e.to_string()))
    }
}
