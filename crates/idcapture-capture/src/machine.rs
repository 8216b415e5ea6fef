//! Synchronous transition core of the capture workflow.
//!
//! The machine never blocks and never spawns. Every asynchronous step is
//! driven from outside (see [`CaptureController`](crate::CaptureController))
//! and reported back together with the [`SessionId`] it was started for, so
//! late results of superseded sessions are rejected as stale.

use std::time::Instant;

use idcapture_core::{DetectionSample, NormalizedImage, Side};
use idcapture_verify::{VerificationOutcome, VerifyError};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    CaptureConfig, CaptureEvent, CaptureSession, CaptureSource, CaptureState, DeviceClass,
    FailureReason, Resolution, SessionId, SharpnessFloors, StabilityTimer,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("the back side can only be captured after the front side")]
    OutOfSequence,
    #[error("a {0} capture is already in progress")]
    Busy(Side),
    #[error("no active capture session")]
    NoSession,
    #[error("session {0} is no longer active")]
    Stale(SessionId),
    #[error("capture has been shut down")]
    Closed,
}

/// What a polling tick led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// Keep polling.
    Waiting {
        state: CaptureState,
        remaining_ms: Option<u64>,
    },
    /// The dwell is satisfied and the capture lock has been taken. Polling
    /// must stop and the triggering frame be normalized.
    Trigger,
    /// The session is not polling; the sample was dropped.
    Ignored,
}

/// Terminal transition of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub event: CaptureEvent,
    /// The front side just succeeded and the back side is still missing.
    pub advance_to_back: bool,
}

/// Front/back capture sequence for one document.
#[derive(Debug)]
pub struct CaptureStateMachine {
    device: DeviceClass,
    floors: SharpnessFloors,
    dwell: std::time::Duration,
    next_id: u64,
    closed: bool,
    session: Option<CaptureSession>,
    front: Option<NormalizedImage>,
    back: Option<NormalizedImage>,
}

impl CaptureStateMachine {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            device: config.device,
            floors: config.sharpness.clone(),
            dwell: config.dwell(),
            next_id: 0,
            closed: false,
            session: None,
            front: None,
            back: None,
        }
    }

    /// The active (or most recently resolved) session.
    #[inline]
    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    #[inline]
    pub fn state(&self) -> Option<CaptureState> {
        self.session.as_ref().map(CaptureSession::state)
    }

    /// Accepted image for `side`, if that side has been captured.
    pub fn captured(&self, side: Side) -> Option<&NormalizedImage> {
        match side {
            Side::Front => self.front.as_ref(),
            Side::Back => self.back.as_ref(),
        }
    }

    fn begin(&mut self, side: Side, source: CaptureSource) -> Result<&mut CaptureSession, CaptureError> {
        if self.closed {
            return Err(CaptureError::Closed);
        }
        if let Some(current) = &self.session {
            if current.capture_locked {
                return Err(CaptureError::Busy(current.side));
            }
        }
        if side == Side::Back && self.front.is_none() {
            return Err(CaptureError::OutOfSequence);
        }
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let timer = StabilityTimer::new(self.dwell, self.floors.floor(self.device, side));
        if let Some(old) = self.session.replace(CaptureSession::new(id, side, source, timer)) {
            log::debug!("session {} superseded by {id}", old.id);
        }
        log::info!("session {id}: {side} capture requested ({source:?})");
        self.session.as_mut().ok_or(CaptureError::NoSession)
    }

    /// `Idle -> Detecting` for `side`.
    ///
    /// Replaces any unlocked session. Fails while a capture is locked or
    /// when the back side is requested before the front side succeeded.
    pub fn request_scan(&mut self, side: Side) -> Result<SessionId, CaptureError> {
        let session = self.begin(side, CaptureSource::Camera)?;
        session.state = CaptureState::Detecting;
        Ok(session.id)
    }

    /// Auto-advance after the front session `front` succeeded.
    ///
    /// Only starts the back-side scan while `front` is still the current
    /// session and still resolved as a success, so an abandon or a newer
    /// session in the meantime cancels the advance.
    pub fn advance_from(&mut self, front: SessionId) -> Result<SessionId, CaptureError> {
        let session = self.current(front)?;
        if session.side != Side::Front || session.state != CaptureState::Resolved(Resolution::Success) {
            return Err(CaptureError::Stale(front));
        }
        self.request_scan(Side::Back)
    }

    /// Start a manual-upload session. It skips detection and is created
    /// already locked.
    pub fn begin_upload(&mut self, side: Side) -> Result<SessionId, CaptureError> {
        let session = self.begin(side, CaptureSource::Upload)?;
        session.lock();
        Ok(session.id)
    }

    fn current(&mut self, id: SessionId) -> Result<&mut CaptureSession, CaptureError> {
        match self.session.as_mut() {
            Some(s) if s.id == id => Ok(s),
            Some(_) => Err(CaptureError::Stale(id)),
            None => Err(CaptureError::NoSession),
        }
    }

    /// Feed one polling tick.
    ///
    /// The lock is taken inside this call when the dwell completes, so no
    /// later tick can trigger a second capture.
    pub fn observe(
        &mut self,
        id: SessionId,
        now: Instant,
        sample: &DetectionSample,
    ) -> Result<Observation, CaptureError> {
        let session = self.current(id)?;
        if !session.state.is_polling() || session.capture_locked {
            return Ok(Observation::Ignored);
        }

        let tick = session.timer.tick(now, sample);
        if tick.ready {
            session.lock();
            log::info!("session {id}: dwell complete, capture locked");
            return Ok(Observation::Trigger);
        }

        session.state = if tick.remaining_ms.is_some() {
            CaptureState::Stabilizing
        } else {
            CaptureState::Detecting
        };
        Ok(Observation::Waiting {
            state: session.state,
            remaining_ms: tick.remaining_ms,
        })
    }

    /// `Locked -> Submitting`: normalization produced `image`.
    pub fn crop_succeeded(&mut self, id: SessionId, image: NormalizedImage) -> Result<(), CaptureError> {
        let session = self.current(id)?;
        if session.state != CaptureState::Locked {
            return Err(CaptureError::Stale(id));
        }
        session.pending = Some(image);
        session.state = CaptureState::Submitting;
        Ok(())
    }

    /// Terminal failure before verification (camera, crop, upload decode).
    pub fn fail(&mut self, id: SessionId, reason: FailureReason) -> Result<CaptureEvent, CaptureError> {
        let session = self.current(id)?;
        if matches!(session.state, CaptureState::Idle | CaptureState::Resolved(_)) {
            return Err(CaptureError::Stale(id));
        }
        log::warn!("session {id}: {} capture failed: {reason}", session.side);
        session.fail();
        Ok(CaptureEvent::Failed {
            session: id,
            side: session.side,
            reason,
        })
    }

    /// `Submitting -> Resolved`: apply the verification result.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, result), fields(session = id.0))
    )]
    pub fn resolve(
        &mut self,
        id: SessionId,
        result: Result<VerificationOutcome, VerifyError>,
    ) -> Result<Resolved, CaptureError> {
        let session = self.current(id)?;
        if session.state != CaptureState::Submitting {
            return Err(CaptureError::Stale(id));
        }
        let side = session.side;
        let judged = result
            .map_err(FailureReason::from)
            .and_then(|outcome| outcome.judge(side).map_err(FailureReason::from));

        match (judged, session.pending.take()) {
            (Ok(()), Some(image)) => {
                session.succeed();
                log::info!("session {id}: {side} side accepted");
                let slot = match side {
                    Side::Front => &mut self.front,
                    Side::Back => &mut self.back,
                };
                *slot = Some(image.clone());
                Ok(Resolved {
                    event: CaptureEvent::Completed {
                        session: id,
                        side,
                        image,
                    },
                    advance_to_back: side == Side::Front && self.back.is_none(),
                })
            }
            (Ok(()), None) => Err(CaptureError::Stale(id)),
            (Err(reason), _) => {
                log::warn!("session {id}: {side} capture rejected: {reason}");
                session.fail();
                Ok(Resolved {
                    event: CaptureEvent::Failed {
                        session: id,
                        side,
                        reason,
                    },
                    advance_to_back: false,
                })
            }
        }
    }

    /// Drop the current session. Results still in flight for it become
    /// stale.
    pub fn abandon(&mut self) -> Option<SessionId> {
        let session = self.session.take()?;
        log::info!("session {}: abandoned in state {:?}", session.id, session.state);
        Some(session.id)
    }

    /// Abandon the current session and refuse new ones. Used on teardown.
    pub fn close(&mut self) -> Option<SessionId> {
        self.closed = true;
        self.abandon()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Forget everything, including captured sides.
    pub fn reset(&mut self) {
        self.abandon();
        self.front = None;
        self.back = None;
    }
}
