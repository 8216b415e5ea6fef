use serde::{Deserialize, Serialize};

/// Configuration for per-frame analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerParams {
    /// Frames are downscaled so their longer side is at most this many
    /// pixels before edge detection and sharpness scoring. `0` disables it.
    pub working_max_side: u32,
    /// Gaussian pre-blur applied before Canny.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Edge dilation radius (L-inf) used to close small gaps in card outlines.
    pub dilate_radius: u8,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_frac: f32,
    /// Smallest accepted quadrilateral, as a fraction of the frame area.
    pub min_area_frac: f32,
    /// Safety margin on every frame edge, as a fraction of that dimension.
    pub visibility_margin_frac: f32,
}

impl Default for AnalyzerParams {
    fn default() -> Self {
        Self {
            working_max_side: 640,
            blur_sigma: 1.5,
            canny_low: 30.0,
            canny_high: 90.0,
            dilate_radius: 1,
            approx_epsilon_frac: 0.02,
            min_area_frac: 0.10,
            visibility_margin_frac: 0.05,
        }
    }
}

/// Configuration for the canonical crop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerParams {
    pub target_width: u32,
    pub target_height: u32,
    /// Quads whose smallest corner triangle is below this fraction of the
    /// squared bounding diagonal are rejected as degenerate.
    pub min_triangle_ratio: f32,
    /// Map the longer pair of card edges onto the target width.
    pub landscape: bool,
}

impl Default for NormalizerParams {
    fn default() -> Self {
        Self {
            target_width: 800,
            target_height: 500,
            min_triangle_ratio: 0.01,
            landscape: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn partial_analyzer_json_keeps_other_defaults() {
        let params: AnalyzerParams =
            serde_json::from_str(r#"{"blur_sigma": 2.25, "visibility_margin_frac": 0.08}"#).unwrap();
        assert_abs_diff_eq!(params.blur_sigma, 2.25, epsilon = 1e-6);
        assert_abs_diff_eq!(params.visibility_margin_frac, 0.08, epsilon = 1e-6);

        let defaults = AnalyzerParams::default();
        assert_eq!(params.working_max_side, defaults.working_max_side);
        assert_eq!(params.dilate_radius, defaults.dilate_radius);
        assert_abs_diff_eq!(params.canny_high, defaults.canny_high, epsilon = 1e-6);
        assert_abs_diff_eq!(params.min_area_frac, defaults.min_area_frac, epsilon = 1e-6);
    }

    #[test]
    fn normalizer_params_survive_serialization() {
        let params = NormalizerParams {
            target_width: 1011,
            target_height: 638,
            min_triangle_ratio: 0.005,
            landscape: false,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["target_width"], 1011);
        assert_eq!(json["landscape"], false);

        let back: NormalizerParams = serde_json::from_value(json).unwrap();
        assert_eq!((back.target_width, back.target_height), (1011, 638));
        assert_abs_diff_eq!(back.min_triangle_ratio, 0.005, epsilon = 1e-7);
        assert!(!back.landscape);
    }

    #[test]
    fn empty_json_is_the_default() {
        let analyzer: AnalyzerParams = serde_json::from_str("{}").unwrap();
        assert_eq!(analyzer, AnalyzerParams::default());
        let normalizer: NormalizerParams = serde_json::from_str("{}").unwrap();
        assert_eq!(normalizer, NormalizerParams::default());
    }
}
