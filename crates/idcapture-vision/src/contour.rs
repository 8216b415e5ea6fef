//! Card outline search on an edge map.
//!
//! Pipeline: blur -> Canny -> dilate -> border following -> Douglas-Peucker.
//! The largest convex 4-vertex outer contour above the minimum area wins.

use crate::AnalyzerParams;
use idcapture_core::Quadrilateral;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;

/// Find the most plausible card quadrilateral in `img`, in `img` coordinates.
pub fn find_card_quad(img: &image::GrayImage, params: &AnalyzerParams) -> Option<Quadrilateral> {
    let frame_area = img.width() as f32 * img.height() as f32;
    if frame_area < 16.0 {
        return None;
    }

    let blurred = if params.blur_sigma > 0.0 {
        gaussian_blur_f32(img, params.blur_sigma)
    } else {
        img.clone()
    };
    let mut edges = canny(&blurred, params.canny_low, params.canny_high);
    if params.dilate_radius > 0 {
        edges = dilate(&edges, Norm::LInf, params.dilate_radius);
    }

    let min_area = params.min_area_frac * frame_area;
    let contours = find_contours::<i32>(&edges);
    log::trace!("{} contours on {}x{} edge map", contours.len(), img.width(), img.height());

    let mut best: Option<(f32, Quadrilateral)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
    {
        let Some(quad) = approximate_quad(&contour.points, params.approx_epsilon_frac) else {
            continue;
        };
        let area = quad.area();
        if area < min_area {
            continue;
        }
        if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
            best = Some((area, quad));
        }
    }

    best.map(|(_, q)| q)
}

fn approximate_quad(points: &[Point<i32>], epsilon_frac: f32) -> Option<Quadrilateral> {
    let perimeter = arc_length(points, true);
    let epsilon = (epsilon_frac as f64 * perimeter).max(1.0);
    let mut poly = approximate_polygon_dp(points, epsilon, true);
    poly.dedup();
    if poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() != 4 {
        return None;
    }
    let quad = Quadrilateral::from_xy([
        (poly[0].x as f32, poly[0].y as f32),
        (poly[1].x as f32, poly[1].y as f32),
        (poly[2].x as f32, poly[2].y as f32),
        (poly[3].x as f32, poly[3].y as f32),
    ]);
    quad.is_convex().then_some(quad)
}
