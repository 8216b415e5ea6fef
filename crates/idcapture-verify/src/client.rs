use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use idcapture_core::{NormalizedImage, Side};
use serde::{Deserialize, Serialize};

use crate::{ServiceError, VerificationOutcome, VerificationRequest, VerificationService};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Configuration for [`VerificationClient`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientParams {
    /// Upper bound for one service round-trip.
    pub timeout_ms: u64,
    /// Extra attempts after a transport failure. Timeouts and rejections are
    /// never retried here.
    pub transport_retries: u32,
}

impl Default for ClientParams {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            transport_retries: 0,
        }
    }
}

/// Failures of a submission that did not yield a structurally valid outcome.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("a verification is already in flight for session {0}")]
    Busy(u64),
    #[error("verification timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Submits normalized images to a [`VerificationService`].
///
/// At most one call per capture session is in flight at any time.
pub struct VerificationClient {
    service: Arc<dyn VerificationService>,
    params: ClientParams,
    in_flight: Mutex<HashSet<u64>>,
}

struct InFlight<'a> {
    sessions: &'a Mutex<HashSet<u64>>,
    session: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session);
    }
}

impl VerificationClient {
    pub fn new(service: Arc<dyn VerificationService>, params: ClientParams) -> Self {
        Self {
            service,
            params,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[inline]
    pub fn params(&self) -> &ClientParams {
        &self.params
    }

    /// Whether `session` currently has a call outstanding.
    pub fn is_in_flight(&self, session: u64) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&session)
    }

    fn claim(&self, session: u64) -> Result<InFlight<'_>, VerifyError> {
        let mut sessions = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !sessions.insert(session) {
            return Err(VerifyError::Busy(session));
        }
        Ok(InFlight {
            sessions: &self.in_flight,
            session,
        })
    }

    /// Send `image` for verification as the `side` of the card.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(bytes = image.bytes.len()))
    )]
    pub async fn submit(
        &self,
        session: u64,
        side: Side,
        image: &NormalizedImage,
    ) -> Result<VerificationOutcome, VerifyError> {
        let _claim = self.claim(session)?;
        let timeout = Duration::from_millis(self.params.timeout_ms);
        let mut attempt = 0u32;
        loop {
            let request = VerificationRequest {
                expected_side: side,
                image,
            };
            log::info!("session {session}: submitting {side} image (attempt {})", attempt + 1);
            match tokio::time::timeout(timeout, self.service.verify(request)).await {
                Ok(Ok(response)) => {
                    log::debug!("session {session}: service answered {response:?}");
                    return Ok(response.into());
                }
                Ok(Err(err)) if attempt < self.params.transport_retries => {
                    log::warn!("session {session}: {err}; retrying");
                    attempt += 1;
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    log::warn!("session {session}: no answer within {timeout:?}");
                    return Err(VerifyError::Timeout(timeout));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceResponse;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use idcapture_core::{DetectedSide, ImageEncoding};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn image() -> NormalizedImage {
        NormalizedImage {
            width: 8,
            height: 5,
            encoding: ImageEncoding::Png,
            rectified: true,
            bytes: vec![1, 2, 3],
        }
    }

    /// Fails `failures` times, then answers for the expected side.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        delay: Duration,
    }

    impl VerificationService for Flaky {
        fn verify<'a>(
            &'a self,
            request: VerificationRequest<'a>,
        ) -> BoxFuture<'a, Result<ServiceResponse, ServiceError>> {
            async move {
                tokio::time::sleep(self.delay).await;
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    return Err(ServiceError::Unreachable("connection reset".into()));
                }
                Ok(ServiceResponse {
                    accepted: true,
                    is_target_type: true,
                    side: DetectedSide::from(request.expected_side),
                    confidence_or_message: None,
                })
            }
            .boxed()
        }
    }

    fn client(failures: u32, delay_ms: u64, params: ClientParams) -> (Arc<Flaky>, VerificationClient) {
        let service = Arc::new(Flaky {
            failures,
            calls: AtomicU32::new(0),
            delay: Duration::from_millis(delay_ms),
        });
        let client = VerificationClient::new(service.clone(), params);
        (service, client)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out() {
        let params = ClientParams {
            timeout_ms: 30_000,
            ..ClientParams::default()
        };
        let (_, client) = client(0, 45_000, params);
        let err = client.submit(1, Side::Front, &image()).await.unwrap_err();
        assert_eq!(err, VerifyError::Timeout(Duration::from_secs(30)));
        assert!(!client.is_in_flight(1));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_surfaced_without_retries() {
        let (service, client) = client(1, 10, ClientParams::default());
        let err = client.submit(1, Side::Front, &image()).await.unwrap_err();
        assert!(matches!(err, VerifyError::Service(ServiceError::Unreachable(_))));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_retries_absorb_transport_failures() {
        let params = ClientParams {
            transport_retries: 2,
            ..ClientParams::default()
        };
        let (service, client) = client(2, 10, params);
        let outcome = client.submit(7, Side::Back, &image()).await.expect("outcome");
        assert_eq!(outcome.detected_side, DetectedSide::Back);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_for_same_session_is_busy() {
        let (_, client) = client(0, 20_000, ClientParams::default());
        let img = image();
        let first = client.submit(3, Side::Front, &img);
        let second = client.submit(3, Side::Front, &img);
        let other = client.submit(4, Side::Front, &img);
        let (first, second, other) = tokio::join!(first, second, other);
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), VerifyError::Busy(3));
        assert!(other.is_ok());
    }
}
