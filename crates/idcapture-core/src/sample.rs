use crate::Quadrilateral;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card face being captured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card face as classified by the verification service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedSide {
    Front,
    Back,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DetectedSide {
    /// `None` when the service could not tell.
    pub fn side(self) -> Option<Side> {
        match self {
            DetectedSide::Front => Some(Side::Front),
            DetectedSide::Back => Some(Side::Back),
            DetectedSide::Unknown => None,
        }
    }
}

impl From<Side> for DetectedSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Front => DetectedSide::Front,
            Side::Back => DetectedSide::Back,
        }
    }
}

impl fmt::Display for DetectedSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side() {
            Some(side) => side.fmt(f),
            None => f.write_str("unknown"),
        }
    }
}

/// Result of analysing one polling tick. Not kept past the tick that consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSample {
    pub quadrilateral: Option<Quadrilateral>,
    /// Non-negative, higher is sharper.
    pub sharpness: f32,
    pub fully_visible: bool,
}

impl DetectionSample {
    /// The steady "no document yet" sample.
    pub fn empty(sharpness: f32) -> Self {
        Self {
            quadrilateral: None,
            sharpness,
            fully_visible: false,
        }
    }

    /// Fully visible and at least as sharp as `floor`.
    #[inline]
    pub fn qualifies(&self, floor: f32) -> bool {
        self.quadrilateral.is_some() && self.fully_visible && self.sharpness >= floor
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Png,
    /// Caller-supplied bytes forwarded without re-encoding.
    Passthrough,
}

/// The artifact handed to verification and back to the caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImage {
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    /// False when a manual upload could not be re-detected and went through as-is.
    pub rectified: bool,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("encoding", &self.encoding)
            .field("rectified", &self.rectified)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
