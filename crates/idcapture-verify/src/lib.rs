//! Verification of normalized identity-card images.
//!
//! - [`VerificationClient`] submits an image to a [`VerificationService`] with
//!   a timeout and at most one call in flight per capture session.
//! - [`VerificationOutcome::judge`] separates a terminal [`Rejection`] from
//!   success; transport failures surface as [`VerifyError`].
//! - [`LocalVerificationService`] answers in-process from OCR text using
//!   [`parse_front`]/[`parse_back`] and [`IdValidator`];
//!   [`LocalVerificationService::extract`] returns the parsed fields as an
//!   [`Extraction`] without judging the capture. With the `tesseract`
//!   feature, [`TesseractRecognizer`] provides the OCR on images binarized by
//!   [`binarize_for_ocr`].

mod client;
mod fields;
mod local;
mod model;
mod prepare;
mod service;
#[cfg(feature = "tesseract")]
mod tesseract;
mod validation;

pub use client::{ClientParams, VerificationClient, VerifyError};
pub use fields::{find_dates, find_id_number, is_valid_id_number, parse_back, parse_front, Gender, IdFields};
pub use local::{classify_side, Extraction, LocalVerificationService, RecognizeError, TextRecognizer};
pub use model::{Detail, Rejection, ServiceResponse, VerificationOutcome, VerificationRequest};
pub use prepare::{binarize_for_ocr, OcrPrepParams};
pub use service::{ServiceError, VerificationService};
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;
pub use validation::{parse_date, IdValidator, ValidationReport, DATE_FORMATS};
