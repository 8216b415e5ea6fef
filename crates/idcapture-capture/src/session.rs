use std::fmt;
use std::time::Instant;

use idcapture_core::{NormalizedImage, Side};
use serde::{Deserialize, Serialize};

use crate::StabilityTimer;

/// Generation number of a capture session. Strictly increasing per
/// state machine; results tagged with an older id are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Success,
    Failure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Detecting,
    Stabilizing,
    Locked,
    Submitting,
    Resolved(Resolution),
}

impl CaptureState {
    /// States in which the polling loop runs.
    #[inline]
    pub fn is_polling(self) -> bool {
        matches!(self, Self::Detecting | Self::Stabilizing)
    }
}

/// Where the image of a session comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureSource {
    Camera,
    Upload,
}

/// One capture attempt for one side.
#[derive(Debug)]
pub struct CaptureSession {
    pub(crate) id: SessionId,
    pub(crate) side: Side,
    pub(crate) source: CaptureSource,
    pub(crate) state: CaptureState,
    pub(crate) timer: StabilityTimer,
    pub(crate) capture_locked: bool,
    pub(crate) pending: Option<NormalizedImage>,
    pub(crate) last_resolution: Option<Resolution>,
}

impl CaptureSession {
    pub(crate) fn new(id: SessionId, side: Side, source: CaptureSource, timer: StabilityTimer) -> Self {
        Self {
            id,
            side,
            source,
            state: CaptureState::Idle,
            timer,
            capture_locked: false,
            pending: None,
            last_resolution: None,
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn source(&self) -> CaptureSource {
        self.source
    }

    #[inline]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.capture_locked
    }

    #[inline]
    pub fn detection_started_at(&self) -> Option<Instant> {
        self.timer.started_at()
    }

    /// Image awaiting verification, while `Submitting`.
    #[inline]
    pub fn pending_image(&self) -> Option<&NormalizedImage> {
        self.pending.as_ref()
    }

    /// How the most recent attempt of this session ended. A failed attempt
    /// leaves the session `Idle`, so this is the only record of it.
    #[inline]
    pub fn last_resolution(&self) -> Option<Resolution> {
        self.last_resolution
    }

    pub(crate) fn lock(&mut self) {
        self.capture_locked = true;
        self.state = CaptureState::Locked;
    }

    /// Terminal failure: lock released, back to `Idle` for a manual retry.
    pub(crate) fn fail(&mut self) {
        self.capture_locked = false;
        self.pending = None;
        self.timer.reset();
        self.state = CaptureState::Idle;
        self.last_resolution = Some(Resolution::Failure);
    }

    pub(crate) fn succeed(&mut self) {
        self.capture_locked = false;
        self.state = CaptureState::Resolved(Resolution::Success);
        self.last_resolution = Some(Resolution::Success);
    }
}
