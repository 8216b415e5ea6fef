//! Front/back identity-card capture.
//!
//! [`CaptureStateMachine`] is the synchronous core: sessions, the capture
//! lock, dwell gating through [`StabilityTimer`], side sequencing and
//! outcome resolution. [`CaptureController`] drives it on a tokio runtime
//! from a [`FrameSource`] and a verification service, reporting
//! [`CaptureEvent`]s on a channel.
//!
//! ```no_run
//! # async fn run(service: std::sync::Arc<dyn idcapture_verify::VerificationService>) -> Result<(), Box<dyn std::error::Error>> {
//! use idcapture_capture::{CaptureConfig, CaptureController, CaptureEvent, ImageSequenceSource};
//! use idcapture_core::Side;
//!
//! let source = ImageSequenceSource::from_dir("frames")?;
//! let (controller, mut events) = CaptureController::new(CaptureConfig::default(), source, service);
//! controller.start_scan(Side::Front)?;
//! while let Some(event) = events.recv().await {
//!     if let CaptureEvent::Completed { side: Side::Back, .. } = event {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod events;
mod machine;
mod session;
mod source;
mod stability;

pub use config::{CaptureConfig, ConfigError, DeviceClass, SharpnessFloors};
pub use controller::CaptureController;
pub use events::{CaptureEvent, FailureReason};
pub use machine::{CaptureError, CaptureStateMachine, Observation, Resolved};
pub use session::{CaptureSession, CaptureSource, CaptureState, Resolution, SessionId};
pub use source::{FrameSource, ImageSequenceSource, SourceError};
pub use stability::{StabilityTimer, TimerTick};
