use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use idcapture_core::{DetectedSide, NormalizedImage, Side};
use serde::Serialize;

use crate::fields::{parse_back, parse_front, IdFields};
use crate::validation::{IdValidator, ValidationReport};
use crate::{Detail, ServiceError, ServiceResponse, VerificationRequest, VerificationService};

#[derive(thiserror::Error, Debug)]
pub enum RecognizeError {
    #[error("image could not be read by the recognizer: {0}")]
    Image(String),
    #[error("text recognition failed: {0}")]
    Backend(String),
}

/// OCR backend. Implementations may block.
pub trait TextRecognizer: Send + Sync + 'static {
    fn recognize(&self, image: &NormalizedImage) -> Result<String, RecognizeError>;
}

/// Guess which side of the card `text` was read from.
///
/// Front markers are the holder's name, birth date, nationality and gender;
/// back markers are a long card number and the machine-readable zone filler.
pub fn classify_side(text: &str, front: &IdFields, back: &IdFields) -> DetectedSide {
    let front_score = [
        front.name.is_some(),
        front.date_of_birth.is_some(),
        front.nationality.is_some(),
        front.gender.is_some(),
    ]
    .into_iter()
    .filter(|&hit| hit)
    .count();
    let back_score = [back.card_number.is_some(), text.contains("<<")]
        .into_iter()
        .filter(|&hit| hit)
        .count();

    match front_score.cmp(&back_score) {
        std::cmp::Ordering::Greater => DetectedSide::Front,
        std::cmp::Ordering::Less => DetectedSide::Back,
        std::cmp::Ordering::Equal => DetectedSide::Unknown,
    }
}

/// Everything read from one image of a card side.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub expected_side: Side,
    pub detected_side: DetectedSide,
    /// Fields parsed for the expected side.
    pub data: IdFields,
    pub raw_text: String,
    pub report: ValidationReport,
}

impl Extraction {
    /// The answer a verification service gives for this extraction.
    pub fn response(&self) -> ServiceResponse {
        let detail = if self.report.errors.is_empty() {
            Detail::Confidence(self.report.confidence)
        } else {
            Detail::Message(self.report.errors.join("; "))
        };
        ServiceResponse {
            accepted: self.report.is_valid,
            is_target_type: self.report.is_target_type,
            side: self.detected_side,
            confidence_or_message: Some(detail),
        }
    }
}

/// In-process verification: OCR, field extraction, validation.
pub struct LocalVerificationService<R> {
    recognizer: Arc<R>,
    validator: IdValidator,
}

impl<R: TextRecognizer> LocalVerificationService<R> {
    pub fn new(recognizer: R) -> Self {
        Self::with_validator(recognizer, IdValidator::default())
    }

    pub fn with_validator(recognizer: R, validator: IdValidator) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            validator,
        }
    }

    /// Parse and validate `text` read from an image submitted as
    /// `expected`.
    pub fn examine(&self, expected: Side, text: &str) -> Extraction {
        let front = parse_front(text);
        let back = parse_back(text);
        let detected_side = classify_side(text, &front, &back);
        let data = match expected {
            Side::Front => front,
            Side::Back => back,
        };
        let report = self.validator.validate(&data, expected);
        log::debug!("expected {expected}, detected {detected_side}, fields {data:?}");
        Extraction {
            expected_side: expected,
            detected_side,
            data,
            raw_text: text.to_string(),
            report,
        }
    }

    /// Build the service answer for `text` read from an image submitted as
    /// `expected`.
    pub fn assess(&self, expected: Side, text: &str) -> ServiceResponse {
        self.examine(expected, text).response()
    }

    /// Run OCR on `image` and return the extracted fields without judging
    /// the capture.
    pub async fn extract(&self, expected: Side, image: &NormalizedImage) -> Result<Extraction, RecognizeError> {
        let recognizer = Arc::clone(&self.recognizer);
        let image = image.clone();
        let text = tokio::task::spawn_blocking(move || recognizer.recognize(&image))
            .await
            .map_err(|e| RecognizeError::Backend(format!("recognizer task failed: {e}")))??;
        log::info!("recognized {} characters", text.chars().count());
        Ok(self.examine(expected, &text))
    }
}

impl<R: TextRecognizer> VerificationService for LocalVerificationService<R> {
    fn verify<'a>(
        &'a self,
        request: VerificationRequest<'a>,
    ) -> BoxFuture<'a, Result<ServiceResponse, ServiceError>> {
        let expected = request.expected_side;
        let image = request.image;
        async move {
            let extraction = self.extract(expected, image).await.map_err(|e| ServiceError::Status {
                code: 500,
                message: e.to_string(),
            })?;
            Ok(extraction.response())
        }
        .boxed()
    }
}
