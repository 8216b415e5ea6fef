//! Core types and utilities for identity-document capture.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete image codec or vision backend.

mod homography;
mod image;
mod logger;
mod quad;
mod sample;

pub use homography::{homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, ImageBufferError};
pub use quad::{Quadrilateral, QuadrilateralError};
pub use sample::{DetectedSide, DetectionSample, ImageEncoding, NormalizedImage, Side};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV};
