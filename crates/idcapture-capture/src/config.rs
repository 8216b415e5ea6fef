//! JSON-loadable capture configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use idcapture_core::Side;
use idcapture_verify::ClientParams;
use idcapture_vision::{AnalyzerParams, NormalizerParams};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Kind of device the camera belongs to. Phone cameras score materially
/// lower on the sharpness metric than desktop webcams at usable focus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    #[default]
    Desktop,
}

/// Minimum sharpness a sample needs to count towards the dwell, per device
/// class and card side. Back sides score lower because of reflective and
/// embossed surfaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpnessFloors {
    pub desktop_front: f32,
    pub desktop_back: f32,
    pub mobile_front: f32,
    pub mobile_back: f32,
}

impl Default for SharpnessFloors {
    fn default() -> Self {
        Self {
            desktop_front: 100.0,
            desktop_back: 60.0,
            mobile_front: 50.0,
            mobile_back: 30.0,
        }
    }
}

impl SharpnessFloors {
    pub fn floor(&self, device: DeviceClass, side: Side) -> f32 {
        match (device, side) {
            (DeviceClass::Desktop, Side::Front) => self.desktop_front,
            (DeviceClass::Desktop, Side::Back) => self.desktop_back,
            (DeviceClass::Mobile, Side::Front) => self.mobile_front,
            (DeviceClass::Mobile, Side::Back) => self.mobile_back,
        }
    }
}

/// Everything the capture controller needs to run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: DeviceClass,
    /// Frame polling period while detecting.
    pub poll_interval_ms: u64,
    /// Continuous qualifying time required before a capture triggers.
    pub dwell_ms: u64,
    /// Delay between a front-side success and the automatic back-side scan.
    pub auto_advance_ms: u64,
    pub sharpness: SharpnessFloors,
    pub analyzer: AnalyzerParams,
    pub normalizer: NormalizerParams,
    pub client: ClientParams,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: DeviceClass::default(),
            poll_interval_ms: 200,
            dwell_ms: 2000,
            auto_advance_ms: 1500,
            sharpness: SharpnessFloors::default(),
            analyzer: AnalyzerParams::default(),
            normalizer: NormalizerParams::default(),
            client: ClientParams::default(),
        }
    }
}

impl CaptureConfig {
    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Acceptance floor for `side` on the configured device.
    pub fn floor(&self, side: Side) -> f32 {
        self.sharpness.floor(self.device, side)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn auto_advance(&self) -> Duration {
        Duration::from_millis(self.auto_advance_ms)
    }
}
