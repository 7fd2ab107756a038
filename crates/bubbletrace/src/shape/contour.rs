//! Contour shape measurements: area, perimeter, circularity and the
//! minimum enclosing circle.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point;

/// Shape summary of one traced border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourShape {
    /// Number of vertices after collapsing straight runs.
    pub n_points: usize,
    /// Polygon area (pixels²).
    pub area: f64,
    /// Closed polygon perimeter (pixels).
    pub perimeter: f64,
    /// Minimum enclosing circle center.
    pub enclosing_center: [f64; 2],
    /// Minimum enclosing circle radius.
    pub enclosing_radius: f64,
}

impl ContourShape {
    /// `4π·area / perimeter²`; 1.0 for a perfect disk.
    pub fn circularity(&self) -> f64 {
        if self.perimeter < 1.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area / (self.perimeter * self.perimeter)
    }

    /// Radius of the disk with the same area.
    pub fn equivalent_radius(&self) -> f64 {
        (self.area / std::f64::consts::PI).sqrt()
    }

    /// Area relative to the enclosing circle area.
    pub fn fill_ratio(&self) -> f64 {
        if self.enclosing_radius <= 0.0 {
            return 0.0;
        }
        self.area / (std::f64::consts::PI * self.enclosing_radius * self.enclosing_radius)
    }
}

/// Trace every border (outer and hole) of a binary mask and measure it.
///
/// Borders whose bounding box exceeds `max_extent` pixels on either side are
/// skipped before measurement.
pub fn trace_shapes(mask: &GrayImage, max_extent: u32) -> Vec<ContourShape> {
    let contours = find_contours::<i32>(mask);
    let mut shapes = Vec::with_capacity(contours.len());
    for contour in contours {
        let pts = &contour.points;
        if pts.is_empty() {
            continue;
        }
        let (mut x0, mut y0, mut x1, mut y1) = (pts[0].x, pts[0].y, pts[0].x, pts[0].y);
        for p in pts.iter().skip(1) {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        if (x1 - x0) as u32 > max_extent || (y1 - y0) as u32 > max_extent {
            continue;
        }
        let simplified = collapse_straight_runs(pts);
        shapes.push(measure(&simplified));
    }
    shapes
}

/// Drop vertices that continue the previous step direction, leaving only
/// the corners of each straight run.
pub(crate) fn collapse_straight_runs(pts: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = pts.len();
    if n < 3 {
        return pts.to_vec();
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = pts[(i + n - 1) % n];
        let cur = pts[i];
        let next = pts[(i + 1) % n];
        if cur - prev != next - cur {
            out.push(cur);
        }
    }
    if out.is_empty() {
        out.push(pts[0]);
    }
    out
}

fn measure(poly: &[Point<i32>]) -> ContourShape {
    let vertices: Vec<[f64; 2]> = poly.iter().map(|p| [p.x as f64, p.y as f64]).collect();
    let (enclosing_center, enclosing_radius) = min_enclosing_circle(&vertices);
    ContourShape {
        n_points: poly.len(),
        area: contour_area(poly),
        perimeter: arc_length(poly, true),
        enclosing_center,
        enclosing_radius,
    }
}

/// Smallest circle containing every point (incremental Welzl).
pub(crate) fn min_enclosing_circle(pts: &[[f64; 2]]) -> ([f64; 2], f64) {
    const EPS: f64 = 1e-7;
    let Some(&first) = pts.first() else {
        return ([0.0, 0.0], 0.0);
    };
    let inside = |c: [f64; 2], r: f64, p: [f64; 2]| dist(c, p) <= r + EPS;

    let mut c = first;
    let mut r = 0.0;
    for i in 1..pts.len() {
        if inside(c, r, pts[i]) {
            continue;
        }
        c = pts[i];
        r = 0.0;
        for j in 0..i {
            if inside(c, r, pts[j]) {
                continue;
            }
            c = midpoint(pts[i], pts[j]);
            r = 0.5 * dist(pts[i], pts[j]);
            for k in 0..j {
                if inside(c, r, pts[k]) {
                    continue;
                }
                (c, r) = circumcircle(pts[i], pts[j], pts[k]);
            }
        }
    }
    (c, r)
}

#[inline]
fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

#[inline]
fn midpoint(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])]
}

/// Circle through three points; falls back to the widest pair when collinear.
fn circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> ([f64; 2], f64) {
    let bx = b[0] - a[0];
    let by = b[1] - a[1];
    let cx = c[0] - a[0];
    let cy = c[1] - a[1];
    let d = 2.0 * (bx * cy - by * cx);
    if d.abs() < 1e-12 {
        let pairs = [(a, b), (a, c), (b, c)];
        let (p, q) = pairs
            .into_iter()
            .max_by(|x, y| dist(x.0, x.1).total_cmp(&dist(y.0, y.1)))
            .unwrap_or((a, b));
        return (midpoint(p, q), 0.5 * dist(p, q));
    }
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    let center = [a[0] + ux, a[1] + uy];
    (center, (ux * ux + uy * uy).sqrt())
}
