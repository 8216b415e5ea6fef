use idcapture_core::Quadrilateral;

/// Rejects quads whose corners come too close to the frame border.
///
/// A card whose corner touches the border is most likely clipped and would
/// crop incorrectly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibilityGate {
    margin_frac: f32,
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl VisibilityGate {
    pub fn new(margin_frac: f32) -> Self {
        Self {
            margin_frac: margin_frac.clamp(0.0, 0.5),
        }
    }

    #[inline]
    pub fn margin_frac(&self) -> f32 {
        self.margin_frac
    }

    /// True when every corner lies at least `margin_frac * dimension` away
    /// from each frame edge.
    pub fn is_fully_visible(&self, quad: &Quadrilateral, frame_width: usize, frame_height: usize) -> bool {
        let w = frame_width as f32;
        let h = frame_height as f32;
        let mx = w * self.margin_frac;
        let my = h * self.margin_frac;
        quad.points.iter().all(|p| {
            p.x.is_finite()
                && p.y.is_finite()
                && p.x >= mx
                && p.x <= w - mx
                && p.y >= my
                && p.y <= h - my
        })
    }
}
