use idcapture_core::{NormalizedImage, Side};
use idcapture_verify::{Rejection, VerifyError};
use idcapture_vision::NormalizeError;

use crate::{CaptureState, SessionId};

/// Why a capture attempt ended without an accepted image.
///
/// Every reason is terminal for the attempt: the lock is released and the
/// caller decides whether to try again.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum FailureReason {
    #[error("camera unavailable ({0}); upload a photo of the card instead")]
    CameraUnavailable(String),
    #[error("could not straighten the card image; hold the card flat and try again")]
    CropDegenerate,
    #[error("the uploaded file is not a readable image ({0})")]
    InvalidUpload(String),
    #[error("verification service unavailable ({0}); try again")]
    ServiceUnreachable(String),
    #[error("verification timed out; try again")]
    Timeout,
    #[error("this does not look like an Emirates ID card")]
    WrongDocumentType,
    #[error("wrong side, expected {expected}")]
    WrongSide { expected: Side },
    #[error("card not accepted: {0}")]
    NotAccepted(String),
}

impl FailureReason {
    /// Whether resubmitting the same image can succeed, as opposed to
    /// needing a new capture.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnreachable(_) | Self::Timeout)
    }
}

impl From<Rejection> for FailureReason {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::WrongDocumentType => Self::WrongDocumentType,
            Rejection::WrongSide { expected, .. } => Self::WrongSide { expected },
            Rejection::NotAccepted(message) => Self::NotAccepted(message),
        }
    }
}

impl From<VerifyError> for FailureReason {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Timeout(_) => Self::Timeout,
            VerifyError::Service(err) => Self::ServiceUnreachable(err.to_string()),
            busy @ VerifyError::Busy(_) => Self::ServiceUnreachable(busy.to_string()),
        }
    }
}

impl From<NormalizeError> for FailureReason {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::Decode(err) => Self::InvalidUpload(err.to_string()),
            NormalizeError::Degenerate { .. }
            | NormalizeError::EmptyTarget { .. }
            | NormalizeError::Encode(_) => Self::CropDegenerate,
        }
    }
}

/// Notifications for the surrounding workflow.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureEvent {
    /// A new session began detecting (or processing an upload).
    Started { session: SessionId, side: Side },
    /// Emitted on every polling tick.
    Progress {
        session: SessionId,
        side: Side,
        state: CaptureState,
        remaining_ms: Option<u64>,
    },
    /// The capture lock was taken; the frame is being normalized.
    Locked { session: SessionId, side: Side },
    /// Terminal success for `side`.
    Completed {
        session: SessionId,
        side: Side,
        image: NormalizedImage,
    },
    /// Terminal failure for the current attempt.
    Failed {
        session: SessionId,
        side: Side,
        reason: FailureReason,
    },
}

impl CaptureEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. }
            | Self::Progress { session, .. }
            | Self::Locked { session, .. }
            | Self::Completed { session, .. }
            | Self::Failed { session, .. } => *session,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Self::Started { side, .. }
            | Self::Progress { side, .. }
            | Self::Locked { side, .. }
            | Self::Completed { side, .. }
            | Self::Failed { side, .. } => *side,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
