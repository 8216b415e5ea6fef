//! Four-point document boundaries in frame coordinates.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuadrilateralError {
    #[error("a quadrilateral needs exactly 4 points, got {got}")]
    PointCount { got: usize },
}

/// Candidate document boundary.
///
/// Points are kept in the order the detector produced them. Consumers that
/// need a winding (cropping, drawing) call [`Quadrilateral::ordered`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub points: [Point2<f32>; 4],
}

impl Quadrilateral {
    pub fn new(points: [Point2<f32>; 4]) -> Self {
        Self { points }
    }

    pub fn from_xy(points: [(f32, f32); 4]) -> Self {
        Self::new(points.map(|(x, y)| Point2::new(x, y)))
    }

    pub fn centroid(&self) -> Point2<f32> {
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0_f32, 0.0_f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Same corners, reordered top-left, top-right, bottom-right, bottom-left
    /// (clockwise in image coordinates, y pointing down).
    pub fn ordered(&self) -> Self {
        let c = self.centroid();
        let mut pts = self.points;
        pts.sort_by(|a, b| {
            let ta = (a.y - c.y).atan2(a.x - c.x);
            let tb = (b.y - c.y).atan2(b.x - c.x);
            ta.total_cmp(&tb)
        });
        // atan2 with y down sweeps clockwise; rotate so the corner nearest the
        // origin (smallest x + y) comes first.
        let start = pts
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        pts.rotate_left(start);
        Self { points: pts }
    }

    /// Shoelace area of the polygon in the stored order.
    pub fn area(&self) -> f32 {
        polygon_area(&self.points)
    }

    /// Whether the stored winding forms a convex polygon.
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.0_f32;
        for i in 0..4 {
            let a = self.points[i];
            let b = self.points[(i + 1) % 4];
            let c = self.points[(i + 2) % 4];
            let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
            if cross.abs() <= f32::EPSILON {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Smallest triangle area spanned by any three of the four corners,
    /// relative to the squared diagonal of the bounding box.
    ///
    /// Near zero means at least three corners are (nearly) collinear.
    pub fn min_triangle_ratio(&self) -> f32 {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        let diag_sq = (max_x - min_x).powi(2) + (max_y - min_y).powi(2);
        if diag_sq <= f32::EPSILON {
            return 0.0;
        }
        const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        TRIPLES
            .iter()
            .map(|t| polygon_area(&[self.points[t[0]], self.points[t[1]], self.points[t[2]]]))
            .fold(f32::INFINITY, f32::min)
            / diag_sq
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.points.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Mean lengths of the (top/bottom, left/right) edge pairs of the ordered quad.
    pub fn edge_lengths(&self) -> (f32, f32) {
        let [tl, tr, br, bl] = self.ordered().points;
        let top = (tr - tl).norm();
        let bottom = (br - bl).norm();
        let left = (bl - tl).norm();
        let right = (br - tr).norm();
        ((top + bottom) * 0.5, (left + right) * 0.5)
    }

    pub fn scaled(&self, s: f32) -> Self {
        Self {
            points: self.points.map(|p| Point2::new(p.x * s, p.y * s)),
        }
    }
}

impl TryFrom<&[Point2<f32>]> for Quadrilateral {
    type Error = QuadrilateralError;

    fn try_from(points: &[Point2<f32>]) -> Result<Self, Self::Error> {
        let points: [Point2<f32>; 4] = points
            .try_into()
            .map_err(|_| QuadrilateralError::PointCount { got: points.len() })?;
        Ok(Self { points })
    }
}

fn polygon_area(pts: &[Point2<f32>]) -> f32 {
    let n = pts.len();
    let mut acc = 0.0_f32;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
    }
    acc.abs() * 0.5
}
