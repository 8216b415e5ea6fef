use idcapture_core::{DetectedSide, NormalizedImage, Side};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// What the service is asked to check.
#[derive(Clone, Copy, Debug)]
pub struct VerificationRequest<'a> {
    pub expected_side: Side,
    pub image: &'a NormalizedImage,
}

/// Either a numeric confidence or a human-readable message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Confidence(f32),
    Message(String),
}

/// Response body as sent by the verification service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub accepted: bool,
    pub is_target_type: bool,
    #[serde(default)]
    pub side: DetectedSide,
    #[serde(default)]
    pub confidence_or_message: Option<Detail>,
}

impl ServiceResponse {
    /// Parse a response body. A body that does not parse is a service
    /// failure, not a rejection.
    pub fn from_json(body: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(body).map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

/// Structurally valid answer from the verification service.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationOutcome {
    pub accepted: bool,
    pub is_target_document_type: bool,
    pub detected_side: DetectedSide,
    pub detail: Option<Detail>,
}

impl From<ServiceResponse> for VerificationOutcome {
    fn from(r: ServiceResponse) -> Self {
        Self {
            accepted: r.accepted,
            is_target_document_type: r.is_target_type,
            detected_side: r.side,
            detail: r.confidence_or_message,
        }
    }
}

/// Why a structurally valid outcome does not count as a capture.
///
/// Rejections are terminal for the attempt and never retried automatically.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Rejection {
    #[error("document is not an accepted identity card")]
    WrongDocumentType,
    #[error("wrong side, expected {expected}")]
    WrongSide { expected: Side, detected: Side },
    #[error("document rejected: {0}")]
    NotAccepted(String),
}

impl VerificationOutcome {
    /// Decide whether this outcome resolves a capture of `expected`.
    ///
    /// Document type is checked first, then side, then acceptance. An
    /// `Unknown` detected side does not contradict the expectation.
    pub fn judge(&self, expected: Side) -> Result<(), Rejection> {
        if !self.is_target_document_type {
            return Err(Rejection::WrongDocumentType);
        }
        if let Some(detected) = self.detected_side.side() {
            if detected != expected {
                return Err(Rejection::WrongSide { expected, detected });
            }
        }
        if !self.accepted {
            let message = match &self.detail {
                Some(Detail::Message(m)) => m.clone(),
                Some(Detail::Confidence(c)) => format!("confidence {c:.2}"),
                None => "no reason given".to_string(),
            };
            return Err(Rejection::NotAccepted(message));
        }
        Ok(())
    }

    pub fn confidence(&self) -> Option<f32> {
        match self.detail {
            Some(Detail::Confidence(c)) => Some(c),
            _ => None,
        }
    }
}
