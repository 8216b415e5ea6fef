use std::time::{Duration, Instant};

use idcapture_core::DetectionSample;

/// Result of one [`StabilityTimer::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerTick {
    /// The dwell has just been satisfied. True on exactly one tick per run.
    pub ready: bool,
    /// Time left until `ready`, or `None` when no qualifying run is active.
    pub remaining_ms: Option<u64>,
}

/// Dwell-time debouncer over qualifying detection samples.
///
/// A sample qualifies when it has a fully visible quadrilateral and its
/// sharpness clears `floor`. Any non-qualifying sample clears the run; time
/// is never accumulated across runs.
#[derive(Clone, Debug)]
pub struct StabilityTimer {
    dwell: Duration,
    floor: f32,
    started_at: Option<Instant>,
    fired: bool,
}

impl StabilityTimer {
    pub fn new(dwell: Duration, floor: f32) -> Self {
        Self {
            dwell,
            floor,
            started_at: None,
            fired: false,
        }
    }

    #[inline]
    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    #[inline]
    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Start of the current qualifying run.
    #[inline]
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.fired = false;
    }

    pub fn tick(&mut self, now: Instant, sample: &DetectionSample) -> TimerTick {
        if !sample.qualifies(self.floor) {
            if self.started_at.is_some() {
                log::debug!(
                    "dwell reset (quad: {}, visible: {}, sharpness {:.1} / {:.1})",
                    sample.quadrilateral.is_some(),
                    sample.fully_visible,
                    sample.sharpness,
                    self.floor
                );
            }
            self.reset();
            return TimerTick {
                ready: false,
                remaining_ms: None,
            };
        }

        let start = *self.started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        let remaining = self.dwell.saturating_sub(elapsed);
        let ready = !self.fired && elapsed >= self.dwell;
        self.fired |= ready;
        TimerTick {
            ready,
            remaining_ms: Some(remaining.as_millis() as u64),
        }
    }
}
