use futures::future::BoxFuture;

use crate::{ServiceResponse, VerificationRequest};

/// Transport-level failures. All of these are retryable by the user.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("verification service unreachable: {0}")]
    Unreachable(String),
    #[error("verification service returned status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("malformed verification response: {0}")]
    Malformed(String),
}

/// External classification/OCR service.
///
/// Implementations do the actual round-trip; timing, single-flight and
/// outcome judgement live in [`VerificationClient`](crate::VerificationClient).
pub trait VerificationService: Send + Sync {
    fn verify<'a>(
        &'a self,
        request: VerificationRequest<'a>,
    ) -> BoxFuture<'a, Result<ServiceResponse, ServiceError>>;
}
