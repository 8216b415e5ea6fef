//! High-level facade for identity-card capture.
//!
//! This crate is the intended entry point. It re-exports the building blocks
//! and adds one-shot helpers in [`pipeline`] for working with still images.
//!
//! - [`core`]: geometry, image buffers, detection samples, logging.
//! - [`vision`]: card location, sharpness, visibility and perspective crop.
//! - [`verify`]: verification client, field extraction and validation.
//! - [`capture`]: the capture state machine and its async controller.
//!
//! ## Quickstart
//!
//! ```no_run
//! use idcapture::capture::CaptureConfig;
//! use idcapture::pipeline::analyze_image;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = analyze_image("card.png", &CaptureConfig::default())?;
//! println!("card found: {}", report.sample.quadrilateral.is_some());
//! println!("ready for front capture: {}", report.qualifies_front);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `cli` (default): the `idcapture` binary, with local Tesseract verification.
//! - `tesseract`: [`verify::TesseractRecognizer`].
//! - `tracing`: `tracing` spans on the hot paths and [`core::init_tracing`].

pub use idcapture_capture as capture;
pub use idcapture_core as core;
pub use idcapture_verify as verify;
pub use idcapture_vision as vision;

pub use idcapture_capture::{CaptureConfig, CaptureController, CaptureEvent, FailureReason};
pub use idcapture_core::{DetectionSample, NormalizedImage, Quadrilateral, Side};
pub use idcapture_verify::{VerificationClient, VerificationOutcome, VerificationService};

pub mod pipeline;
