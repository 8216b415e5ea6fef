//! Projective maps between the canonical card rectangle and frame coordinates.
//!
//! Four-point maps are composed from two closed-form unit-square maps
//! (Heckbert's square-to-quad), which avoids a linear solve and makes the
//! degenerate case an explicit determinant check.

use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{Matrix3, Point2, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().and_then(scaled_to_unit).map(Self::new)
    }
}

/// Rescale so that `h33 == 1`.
fn scaled_to_unit(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    (s.is_finite() && s.abs() > 1e-12).then(|| h / s)
}

/// Map taking (0,0), (1,0), (1,1), (0,1) onto `q[0..4]`.
fn unit_square_to(q: &[Point2<f32>; 4]) -> Option<Matrix3<f64>> {
    let [p0, p1, p2, p3] = q.map(|p| (p.x as f64, p.y as f64));
    let sx = p0.0 - p1.0 + p2.0 - p3.0;
    let sy = p0.1 - p1.1 + p2.1 - p3.1;

    let (g, h) = if sx == 0.0 && sy == 0.0 {
        (0.0, 0.0)
    } else {
        let (dx1, dy1) = (p1.0 - p2.0, p1.1 - p2.1);
        let (dx2, dy2) = (p3.0 - p2.0, p3.1 - p2.1);
        let det = dx1 * dy2 - dx2 * dy1;
        let scale = (dx1.abs() + dx2.abs()) * (dy1.abs() + dy2.abs());
        if !det.is_finite() || det.abs() <= 1e-12 * scale.max(1.0) {
            return None;
        }
        ((sx * dy2 - dx2 * sy) / det, (dx1 * sy - sx * dy1) / det)
    };

    Some(Matrix3::new(
        p1.0 - p0.0 + g * p1.0, p3.0 - p0.0 + h * p3.0, p0.0, //
        p1.1 - p0.1 + g * p1.1, p3.1 - p0.1 + h * p3.1, p0.1, //
        g, h, 1.0,
    ))
}

/// Compute H such that `dst ~ H * src` from four correspondences.
/// - `src`: points in canonical (rectified) coords
/// - `dst`: points in frame coords
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the correspondence is singular, e.g. a quad collapsed onto a line.
/// Nearly flat quads can still solve, so callers screen them beforehand.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let from_src = unit_square_to(src)?;
    let from_dst = unit_square_to(dst)?;
    let h = from_dst * from_src.try_inverse()?;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    scaled_to_unit(h).map(Homography::new)
}

/// Fill an `out_w x out_h` image by pulling every output pixel center
/// through `frame_from_canonical` and sampling the frame bilinearly.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    frame_from_canonical: Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut data = vec![0u8; out_w * out_h];
    if out_w > 0 {
        for (y, row) in data.chunks_exact_mut(out_w).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                let p = frame_from_canonical.apply(Point2::new(x as f32 + 0.5, y as f32 + 0.5));
                *px = sample_bilinear_u8(src, p.x, p.y);
            }
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data,
    }
}
