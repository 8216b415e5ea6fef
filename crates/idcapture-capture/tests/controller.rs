use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use idcapture_capture::{
    CaptureConfig, CaptureController, CaptureError, CaptureEvent, CaptureState, FailureReason,
    FrameSource, Resolution, SourceError,
};
use idcapture_core::{DetectedSide, GrayImage, GrayImageView, Quadrilateral, Side};
use idcapture_verify::{ServiceError, ServiceResponse, VerificationRequest, VerificationService};
use idcapture_vision::{FrameAnalyzer, VisibilityGate, VisionBackend};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Instant};

const W: usize = 640;
const H: usize = 400;

fn card_quad() -> Quadrilateral {
    Quadrilateral::from_xy([(100.0, 80.0), (540.0, 80.0), (540.0, 330.0), (100.0, 330.0)])
}

/// Reports whatever quad and sharpness the test sets.
#[derive(Clone)]
struct Scripted(Arc<Mutex<(Option<Quadrilateral>, f32)>>);

impl Scripted {
    fn new(quad: Option<Quadrilateral>) -> Self {
        Self(Arc::new(Mutex::new((quad, 500.0))))
    }
}

impl VisionBackend for Scripted {
    fn locate_quadrilateral(&self, _: &GrayImageView<'_>) -> Option<Quadrilateral> {
        self.0.lock().unwrap().0
    }

    fn score_sharpness(&self, _: &GrayImageView<'_>) -> f32 {
        self.0.lock().unwrap().1
    }
}

struct StillCamera {
    working: bool,
}

impl FrameSource for StillCamera {
    fn next_frame(&mut self) -> Result<GrayImage, SourceError> {
        if !self.working {
            return Err(SourceError::Unavailable("permission denied".into()));
        }
        Ok(GrayImage::from_luma8(W, H, vec![128; W * H])?)
    }
}

/// Answers after `delay`; scripted replies first, then acceptance of the
/// expected side.
struct Service {
    delay: Duration,
    replies: Mutex<VecDeque<Result<ServiceResponse, ServiceError>>>,
    calls: AtomicUsize,
}

impl Service {
    fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn push(&self, reply: Result<ServiceResponse, ServiceError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VerificationService for Service {
    fn verify<'a>(
        &'a self,
        request: VerificationRequest<'a>,
    ) -> BoxFuture<'a, Result<ServiceResponse, ServiceError>> {
        async move {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.replies.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(ServiceResponse {
                    accepted: true,
                    is_target_type: true,
                    side: DetectedSide::from(request.expected_side),
                    confidence_or_message: None,
                })
            })
        }
        .boxed()
    }
}

fn controller(
    backend: Scripted,
    camera_works: bool,
    service: Arc<Service>,
) -> (CaptureController, UnboundedReceiver<CaptureEvent>) {
    let analyzer = FrameAnalyzer::with_backend(backend, VisibilityGate::default());
    CaptureController::with_analyzer(
        CaptureConfig::default(),
        analyzer,
        StillCamera {
            working: camera_works,
        },
        service,
    )
}

async fn next_matching(
    rx: &mut UnboundedReceiver<CaptureEvent>,
    mut pred: impl FnMut(&CaptureEvent) -> bool,
) -> CaptureEvent {
    timeout(Duration::from_secs(120), async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event did not arrive")
}

async fn next_terminal(rx: &mut UnboundedReceiver<CaptureEvent>) -> CaptureEvent {
    next_matching(rx, CaptureEvent::is_terminal).await
}

fn drain(rx: &mut UnboundedReceiver<CaptureEvent>) -> Vec<CaptureEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn capture_triggers_after_dwell_and_advances_to_back() {
    let service = Service::new(5_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service.clone());

    let started = Instant::now();
    let front = ctl.start_scan(Side::Front).unwrap();
    let locked = next_matching(&mut rx, |e| matches!(e, CaptureEvent::Locked { .. })).await;
    assert_eq!(locked.session(), front);
    let dwell = started.elapsed();
    assert!(dwell >= Duration::from_millis(2000), "locked after {dwell:?}");
    assert!(dwell < Duration::from_millis(2200), "locked after {dwell:?}");

    let done = next_terminal(&mut rx).await;
    let CaptureEvent::Completed { side, image, .. } = done else {
        panic!("expected front completion, got {done:?}");
    };
    assert_eq!(side, Side::Front);
    assert_eq!((image.width, image.height), (800, 500));
    assert_eq!(service.calls(), 1);

    let back_started = Instant::now();
    let back = next_matching(&mut rx, |e| matches!(e, CaptureEvent::Started { side: Side::Back, .. })).await;
    assert!(back.session() > front);
    assert_eq!(back_started.elapsed(), Duration::from_millis(1500));

    let done = next_terminal(&mut rx).await;
    assert!(matches!(done, CaptureEvent::Completed { side: Side::Back, .. }));
    assert_eq!(service.calls(), 2);
    assert!(ctl.captured(Side::Front).is_some());
    assert!(ctl.captured(Side::Back).is_some());
}

#[tokio::test(start_paused = true)]
async fn progress_reports_countdown() {
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service);
    ctl.start_scan(Side::Front).unwrap();

    let mut remaining = Vec::new();
    loop {
        match next_matching(&mut rx, |_| true).await {
            CaptureEvent::Progress { remaining_ms, state, .. } => {
                assert_eq!(state, CaptureState::Stabilizing);
                remaining.push(remaining_ms.unwrap());
            }
            CaptureEvent::Locked { .. } => break,
            _ => {}
        }
    }
    assert_eq!(remaining.first(), Some(&2000));
    assert_eq!(remaining.last(), Some(&200));
    assert!(remaining.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test(start_paused = true)]
async fn wrong_side_fails_and_does_not_advance() {
    let service = Service::new(3_000);
    service.push(Ok(ServiceResponse {
        accepted: true,
        is_target_type: true,
        side: DetectedSide::Back,
        confidence_or_message: None,
    }));
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service);
    ctl.start_scan(Side::Front).unwrap();

    let done = next_terminal(&mut rx).await;
    let CaptureEvent::Failed { reason, .. } = done else {
        panic!("expected failure, got {done:?}");
    };
    assert_eq!(reason, FailureReason::WrongSide { expected: Side::Front });
    assert_eq!(reason.to_string(), "wrong side, expected front");
    assert_eq!(ctl.state(), Some(CaptureState::Idle));
    assert!(ctl.captured(Side::Front).is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain(&mut rx)
        .iter()
        .all(|e| !matches!(e, CaptureEvent::Started { .. })));
    assert_eq!(ctl.start_scan(Side::Back), Err(CaptureError::OutOfSequence));
}

#[tokio::test(start_paused = true)]
async fn degenerate_quad_fails_crop_and_releases_lock() {
    let degenerate = Quadrilateral::from_xy([(100.0, 100.0), (300.0, 101.0), (500.0, 102.0), (300.0, 300.0)]);
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(degenerate)), true, service.clone());
    ctl.start_scan(Side::Front).unwrap();

    let done = next_terminal(&mut rx).await;
    assert!(matches!(
        done,
        CaptureEvent::Failed {
            reason: FailureReason::CropDegenerate,
            ..
        }
    ));
    assert_eq!(ctl.state(), Some(CaptureState::Idle));
    assert_eq!(service.calls(), 0);
    assert!(ctl.start_scan(Side::Front).is_ok());
}

#[tokio::test(start_paused = true)]
async fn clipped_or_blurry_card_never_triggers() {
    let backend = Scripted::new(Some(Quadrilateral::from_xy([
        (2.0, 80.0),
        (540.0, 80.0),
        (540.0, 330.0),
        (2.0, 330.0),
    ])));
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(backend.clone(), true, service.clone());
    ctl.start_scan(Side::Front).unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    *backend.0.lock().unwrap() = (Some(card_quad()), 10.0);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| !e.is_terminal() && !matches!(e, CaptureEvent::Locked { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        CaptureEvent::Progress {
            state: CaptureState::Detecting,
            remaining_ms: None,
            ..
        }
    )));
    assert_eq!(ctl.state(), Some(CaptureState::Detecting));
    assert_eq!(service.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn abandoned_session_discards_in_flight_result() {
    let service = Service::new(10_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service.clone());
    let id = ctl.start_scan(Side::Front).unwrap();
    next_matching(&mut rx, |e| matches!(e, CaptureEvent::Locked { .. })).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ctl.state(), Some(CaptureState::Submitting));
    assert_eq!(ctl.abandon(), Some(id));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(service.calls(), 1, "in-flight verification ran to completion");
    assert!(drain(&mut rx).iter().all(|e| !e.is_terminal()));
    assert_eq!(ctl.state(), None);
    assert!(ctl.captured(Side::Front).is_none());
}

#[tokio::test(start_paused = true)]
async fn auto_advance_can_be_cancelled() {
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service);
    ctl.start_scan(Side::Front).unwrap();
    let done = next_terminal(&mut rx).await;
    assert!(matches!(done, CaptureEvent::Completed { side: Side::Front, .. }));

    assert!(ctl.cancel_auto_advance());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(ctl.state(), Some(CaptureState::Resolved(Resolution::Success)));
}

#[tokio::test(start_paused = true)]
async fn camera_failure_falls_back_to_upload() {
    let service = Service::new(2_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), false, service);
    ctl.start_scan(Side::Front).unwrap();

    let done = next_terminal(&mut rx).await;
    assert!(matches!(
        done,
        CaptureEvent::Failed {
            reason: FailureReason::CameraUnavailable(_),
            ..
        }
    ));
    assert_eq!(ctl.state(), Some(CaptureState::Idle));

    let photo = image::GrayImage::from_pixel(W as u32, H as u32, image::Luma([128]));
    let mut bytes = Vec::new();
    photo
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    ctl.upload(Side::Front, bytes).unwrap();

    let done = next_terminal(&mut rx).await;
    let CaptureEvent::Completed { image, .. } = done else {
        panic!("expected upload to complete, got {done:?}");
    };
    assert!(image.rectified);
    assert_eq!((image.width, image.height), (800, 500));
}

#[tokio::test(start_paused = true)]
async fn undecodable_upload_is_reported() {
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(Scripted::new(None), true, service.clone());
    ctl.upload(Side::Front, b"definitely not an image".to_vec()).unwrap();

    let done = next_terminal(&mut rx).await;
    assert!(matches!(
        done,
        CaptureEvent::Failed {
            reason: FailureReason::InvalidUpload(_),
            ..
        }
    ));
    assert_eq!(service.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_controller_discards_in_flight_result_and_never_advances() {
    let service = Service::new(10_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service.clone());
    ctl.start_scan(Side::Front).unwrap();
    next_matching(&mut rx, |e| matches!(e, CaptureEvent::Locked { .. })).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(ctl);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.calls(), 1, "only the front verification was sent");
    let events = drain(&mut rx);
    assert!(
        events
            .iter()
            .all(|e| !e.is_terminal() && !matches!(e, CaptureEvent::Started { .. } | CaptureEvent::Progress { .. })),
        "events after drop: {events:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_controller_cancels_pending_advance() {
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service.clone());
    ctl.start_scan(Side::Front).unwrap();
    let done = next_terminal(&mut rx).await;
    assert!(matches!(done, CaptureEvent::Completed { side: Side::Front, .. }));

    drop(ctl);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(service.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandon_after_front_success_skips_back_scan() {
    let service = Service::new(1_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service.clone());
    let front = ctl.start_scan(Side::Front).unwrap();
    next_terminal(&mut rx).await;

    assert_eq!(ctl.abandon(), Some(front));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(ctl.current_session(), None);
    assert_eq!(service.calls(), 1);
    assert!(ctl.captured(Side::Front).is_some());
}

#[tokio::test(start_paused = true)]
async fn service_timeout_fails_attempt_and_allows_retry() {
    let service = Service::new(120_000);
    let (ctl, mut rx) = controller(Scripted::new(Some(card_quad())), true, service.clone());
    let started = Instant::now();
    ctl.start_scan(Side::Front).unwrap();

    let done = next_terminal(&mut rx).await;
    assert!(
        matches!(
            done,
            CaptureEvent::Failed {
                reason: FailureReason::Timeout,
                side: Side::Front,
                ..
            }
        ),
        "got {done:?}"
    );
    assert!(started.elapsed() >= Duration::from_secs(62));
    assert_eq!(service.calls(), 0, "the timed-out call never answered");
    assert_eq!(ctl.state(), Some(CaptureState::Idle));
    assert!(ctl.captured(Side::Front).is_none());

    let retry = ctl.start_scan(Side::Front).unwrap();
    let started = next_matching(&mut rx, |e| matches!(e, CaptureEvent::Started { .. })).await;
    assert_eq!(started.session(), retry);
}

/// Records which thread each frame was grabbed on.
struct ThreadLoggingCamera {
    threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
}

impl FrameSource for ThreadLoggingCamera {
    fn next_frame(&mut self) -> Result<GrayImage, SourceError> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        Ok(GrayImage::from_luma8(W, H, vec![128; W * H])?)
    }
}

#[tokio::test(start_paused = true)]
async fn frames_are_grabbed_and_analyzed_off_the_runtime_thread() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let analyzer = FrameAnalyzer::with_backend(Scripted::new(Some(card_quad())), VisibilityGate::default());
    let (ctl, mut rx) = CaptureController::with_analyzer(
        CaptureConfig::default(),
        analyzer,
        ThreadLoggingCamera {
            threads: threads.clone(),
        },
        Service::new(1_000),
    );
    ctl.start_scan(Side::Front).unwrap();
    next_matching(&mut rx, |e| matches!(e, CaptureEvent::Locked { .. })).await;

    let runtime_thread = std::thread::current().id();
    let seen = threads.lock().unwrap().clone();
    assert!(seen.len() >= 10, "only {} frames grabbed", seen.len());
    assert!(seen.iter().all(|&t| t != runtime_thread));
}
