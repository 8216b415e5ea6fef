//! Async driver around [`CaptureStateMachine`].
//!
//! One polling task per camera session produces detection samples. When the
//! machine reports a trigger the polling task hands the frame to a separate
//! capture task and exits, so polling is stopped before any normalization or
//! verification work begins. Abandoning a session aborts polling and any
//! pending auto-advance, but lets an in-flight verification run to completion;
//! its result is then discarded as stale. Dropping the controller does the
//! same and additionally closes the machine against new sessions.
//!
//! Frame analysis, cropping and upload decoding run on the blocking pool.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use idcapture_core::{DetectionSample, GrayImage, NormalizedImage, Quadrilateral, Side};
use idcapture_verify::{VerificationClient, VerificationService};
use idcapture_vision::{DocumentNormalizer, FrameAnalyzer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    CaptureConfig, CaptureError, CaptureEvent, CaptureState, CaptureStateMachine, FailureReason,
    FrameSource, Observation, SessionId, SourceError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Tasks {
    poll: Option<JoinHandle<()>>,
    advance: Option<JoinHandle<()>>,
}

impl Tasks {
    fn stop_polling(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.abort();
        }
    }

    fn cancel_advance(&mut self) -> bool {
        match self.advance.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }
}

struct Inner {
    config: CaptureConfig,
    machine: Mutex<CaptureStateMachine>,
    analyzer: FrameAnalyzer,
    normalizer: DocumentNormalizer,
    client: VerificationClient,
    source: Mutex<Box<dyn FrameSource>>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    tasks: Mutex<Tasks>,
}

impl Inner {
    fn emit(&self, event: CaptureEvent) {
        if self.events.send(event).is_err() {
            log::trace!("capture event dropped: receiver closed");
        }
    }

    fn spawn_scan(self: &Arc<Self>, side: Side) -> Result<SessionId, CaptureError> {
        let id = lock(&self.machine).request_scan(side)?;
        self.start_polling(id, side);
        Ok(id)
    }

    fn start_polling(self: &Arc<Self>, id: SessionId, side: Side) {
        self.emit(CaptureEvent::Started { session: id, side });
        let handle = tokio::spawn(Arc::clone(self).poll(id, side));
        let mut tasks = lock(&self.tasks);
        tasks.stop_polling();
        tasks.poll = Some(handle);
    }

    /// Grab and analyze one frame off the runtime threads.
    async fn sample(self: &Arc<Self>) -> Result<(GrayImage, DetectionSample), String> {
        let inner = Arc::clone(self);
        let grabbed = tokio::task::spawn_blocking(move || {
            let frame = lock(&inner.source).next_frame()?;
            let sample = inner.analyzer.analyze(&frame.view());
            Ok::<_, SourceError>((frame, sample))
        })
        .await;
        match grabbed {
            Ok(Ok(sampled)) => Ok(sampled),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(format!("frame analysis aborted: {err}")),
        }
    }

    async fn poll(self: Arc<Self>, id: SessionId, side: Side) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let (frame, sample) = match self.sample().await {
                Ok(sampled) => sampled,
                Err(err) => {
                    let failed = lock(&self.machine).fail(id, FailureReason::CameraUnavailable(err));
                    if let Ok(event) = failed {
                        self.emit(event);
                    }
                    return;
                }
            };

            let now = tokio::time::Instant::now().into_std();
            let observed = lock(&self.machine).observe(id, now, &sample);
            match observed {
                Ok(Observation::Waiting { state, remaining_ms }) => {
                    self.emit(CaptureEvent::Progress {
                        session: id,
                        side,
                        state,
                        remaining_ms,
                    });
                }
                Ok(Observation::Trigger) => {
                    self.emit(CaptureEvent::Locked { session: id, side });
                    match sample.quadrilateral {
                        Some(quad) => {
                            tokio::spawn(Arc::clone(&self).capture(id, side, frame, quad));
                        }
                        None => {
                            // a trigger always comes from a qualifying sample
                            if let Ok(event) = lock(&self.machine).fail(id, FailureReason::CropDegenerate) {
                                self.emit(event);
                            }
                        }
                    }
                    return;
                }
                Ok(Observation::Ignored) => return,
                Err(err) => {
                    log::debug!("polling for {id} stopped: {err}");
                    return;
                }
            }
        }
    }

    async fn capture(self: Arc<Self>, id: SessionId, side: Side, frame: GrayImage, quad: Quadrilateral) {
        let inner = Arc::clone(&self);
        let cropped = tokio::task::spawn_blocking(move || inner.normalizer.crop(&frame.view(), &quad)).await;
        let reason = match cropped {
            Ok(Ok(image)) => return self.submit(id, side, image).await,
            Ok(Err(err)) => {
                log::info!("{id}: crop failed: {err}");
                FailureReason::from(err)
            }
            Err(err) => {
                log::warn!("{id}: crop task aborted: {err}");
                FailureReason::CropDegenerate
            }
        };
        if let Ok(event) = lock(&self.machine).fail(id, reason) {
            self.emit(event);
        }
    }

    async fn upload(self: Arc<Self>, id: SessionId, side: Side, bytes: Vec<u8>) {
        let inner = Arc::clone(&self);
        let normalized =
            tokio::task::spawn_blocking(move || inner.normalizer.normalize_upload(&bytes, &inner.analyzer)).await;
        let reason = match normalized {
            Ok(Ok(image)) => return self.submit(id, side, image).await,
            Ok(Err(err)) => FailureReason::from(err),
            Err(err) => FailureReason::InvalidUpload(format!("upload processing aborted: {err}")),
        };
        if let Ok(event) = lock(&self.machine).fail(id, reason) {
            self.emit(event);
        }
    }

    async fn submit(self: Arc<Self>, id: SessionId, side: Side, image: NormalizedImage) {
        let staged = lock(&self.machine).crop_succeeded(id, image.clone());
        if let Err(err) = staged {
            log::info!("not submitting for {id}: {err}");
            return;
        }
        let result = self.client.submit(id.0, side, &image).await;

        // resolve and schedule under one guard so an abandon cannot slip
        // between them
        let mut machine = lock(&self.machine);
        match machine.resolve(id, result) {
            Ok(resolved) => {
                if resolved.advance_to_back {
                    self.schedule_advance(id);
                }
                self.emit(resolved.event);
            }
            Err(err) => log::info!("discarding verification result for {id}: {err}"),
        }
    }

    /// Lock order: `machine` before `tasks`.
    fn schedule_advance(self: &Arc<Self>, front: SessionId) {
        let delay = self.config.auto_advance();
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let advanced = lock(&inner.machine).advance_from(front);
            match advanced {
                Ok(id) => {
                    log::info!("auto-advanced to back side ({id})");
                    inner.start_polling(id, Side::Back);
                }
                Err(err) => log::info!("auto-advance after {front} skipped: {err}"),
            }
        });
        let mut tasks = lock(&self.tasks);
        tasks.cancel_advance();
        tasks.advance = Some(handle);
    }
}

/// Runs capture sessions against a frame source and verification service.
///
/// Events are delivered on the receiver returned by [`CaptureController::new`].
/// All methods must be called from within a tokio runtime.
pub struct CaptureController {
    inner: Arc<Inner>,
}

impl CaptureController {
    /// Controller with the default contour-based analyzer.
    pub fn new(
        config: CaptureConfig,
        source: impl FrameSource + 'static,
        service: Arc<dyn VerificationService>,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let analyzer = FrameAnalyzer::new(config.analyzer.clone());
        Self::with_analyzer(config, analyzer, source, service)
    }

    pub fn with_analyzer(
        config: CaptureConfig,
        analyzer: FrameAnalyzer,
        source: impl FrameSource + 'static,
        service: Arc<dyn VerificationService>,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            machine: Mutex::new(CaptureStateMachine::new(&config)),
            analyzer,
            normalizer: DocumentNormalizer::new(config.normalizer.clone()),
            client: VerificationClient::new(service, config.client.clone()),
            source: Mutex::new(Box::new(source)),
            events: tx,
            tasks: Mutex::new(Tasks::default()),
            config,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    #[inline]
    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    /// Start polling for `side`. Cancels a pending auto-advance and replaces
    /// any unlocked session.
    pub fn start_scan(&self, side: Side) -> Result<SessionId, CaptureError> {
        lock(&self.inner.tasks).cancel_advance();
        self.inner.spawn_scan(side)
    }

    /// Submit a caller-supplied image for `side`, bypassing detection.
    pub fn upload(&self, side: Side, bytes: Vec<u8>) -> Result<SessionId, CaptureError> {
        let id = lock(&self.inner.machine).begin_upload(side)?;
        {
            let mut tasks = lock(&self.inner.tasks);
            tasks.cancel_advance();
            tasks.stop_polling();
        }
        self.inner.emit(CaptureEvent::Started { session: id, side });
        tokio::spawn(Arc::clone(&self.inner).upload(id, side, bytes));
        Ok(id)
    }

    /// Cancel the scheduled back-side scan after a front-side success.
    /// Returns whether one was still pending.
    pub fn cancel_auto_advance(&self) -> bool {
        lock(&self.inner.tasks).cancel_advance()
    }

    /// Tear down polling and any pending auto-advance, and drop the current
    /// session. An in-flight verification completes but its result is
    /// discarded.
    pub fn abandon(&self) -> Option<SessionId> {
        {
            let mut tasks = lock(&self.inner.tasks);
            tasks.stop_polling();
            tasks.cancel_advance();
        }
        lock(&self.inner.machine).abandon()
    }

    pub fn state(&self) -> Option<CaptureState> {
        lock(&self.inner.machine).state()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        lock(&self.inner.machine).session().map(|s| s.id())
    }

    /// Accepted image for `side`.
    pub fn captured(&self, side: Side) -> Option<NormalizedImage> {
        lock(&self.inner.machine).captured(side).cloned()
    }
}

impl Drop for CaptureController {
    /// Stops polling and any pending advance, and closes the machine so a
    /// verification still in flight is discarded and no new session starts.
    fn drop(&mut self) {
        {
            let mut tasks = lock(&self.inner.tasks);
            tasks.stop_polling();
            tasks.cancel_advance();
        }
        if let Some(id) = lock(&self.inner.machine).close() {
            log::debug!("controller dropped with session {id} active");
        }
    }
}
