//! Gradient Hough transform for circles.
//!
//! Edge pixels (Canny) vote along their gradient direction, both ways, at
//! every radius in `[min_radius, max_radius]`. Accumulator cells that are
//! local maxima above `acc_threshold` become center hypotheses; each one is
//! then given the radius best supported by the surrounding edge pixels.

use image::GrayImage;

/// One parametrization of the circle transform.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HoughPass {
    /// Inverse accumulator resolution (1.0 = one cell per pixel).
    pub dp: f32,
    /// Minimum distance between accepted circle centers (pixels).
    pub min_dist: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Minimum accumulator votes for a center and edge support for a radius.
    pub acc_threshold: f32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl HoughPass {
    pub const fn new(
        dp: f32,
        min_dist: f32,
        canny_high: f32,
        acc_threshold: f32,
        min_radius: u32,
        max_radius: u32,
    ) -> Self {
        Self {
            dp,
            min_dist,
            canny_high,
            acc_threshold,
            min_radius,
            max_radius,
        }
    }
}

/// A detected circle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughCircle {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    /// Accumulator votes at the center cell.
    pub votes: u32,
}

/// Edge pixels bucketed on a coarse grid for radius estimation.
struct EdgeBuckets {
    cell: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<[f32; 2]>>,
}

impl EdgeBuckets {
    fn new(w: u32, h: u32, cell: f32) -> Self {
        let cell = cell.max(1.0);
        let cols = (w as f32 / cell).ceil() as usize + 1;
        let rows = (h as f32 / cell).ceil() as usize + 1;
        Self {
            cell,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    fn push(&mut self, p: [f32; 2]) {
        let cx = ((p[0] / self.cell) as usize).min(self.cols - 1);
        let cy = ((p[1] / self.cell) as usize).min(self.rows - 1);
        self.cells[cy * self.cols + cx].push(p);
    }

    /// Squared distances from `c` to every bucketed point within `[r_min, r_max]`.
    fn distances_within(&self, c: [f32; 2], r_min: f32, r_max: f32, out: &mut Vec<f32>) {
        out.clear();
        let r_min_sq = r_min * r_min;
        let r_max_sq = r_max * r_max;
        let x0 = ((c[0] - r_max) / self.cell).floor().max(0.0) as usize;
        let y0 = ((c[1] - r_max) / self.cell).floor().max(0.0) as usize;
        let x1 = (((c[0] + r_max) / self.cell).floor().max(0.0) as usize).min(self.cols - 1);
        let y1 = (((c[1] + r_max) / self.cell).floor().max(0.0) as usize).min(self.rows - 1);
        for by in y0..=y1 {
            for bx in x0..=x1 {
                for p in &self.cells[by * self.cols + bx] {
                    let dx = p[0] - c[0];
                    let dy = p[1] - c[1];
                    let d2 = dx * dx + dy * dy;
                    if d2 >= r_min_sq && d2 <= r_max_sq {
                        out.push(d2.sqrt());
                    }
                }
            }
        }
    }
}

/// Run one Hough circle pass over an 8-bit image.
///
/// Returns circles ordered by accumulator votes (highest first), with
/// `min_dist` already enforced between them.
pub fn hough_circles(img: &GrayImage, pass: &HoughPass) -> Vec<HoughCircle> {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 || pass.max_radius < pass.min_radius || pass.max_radius == 0 {
        return Vec::new();
    }
    let dp = pass.dp.max(1.0);
    let idp = 1.0 / dp;
    let r_min = pass.min_radius.max(1) as f32;
    let r_max = pass.max_radius as f32;

    let edges = imageproc::edges::canny(img, 0.5 * pass.canny_high, pass.canny_high);
    let gx = imageproc::gradients::horizontal_sobel(img);
    let gy = imageproc::gradients::vertical_sobel(img);

    let acols = (w as f32 * idp).ceil() as usize + 2;
    let arows = (h as f32 * idp).ceil() as usize + 2;
    let mut accum = vec![0u32; acols * arows];
    let mut buckets = EdgeBuckets::new(w, h, r_max);

    for (x, y, e) in edges.enumerate_pixels() {
        if e[0] == 0 {
            continue;
        }
        let vx = gx.get_pixel(x, y)[0] as f32;
        let vy = gy.get_pixel(x, y)[0] as f32;
        let mag = (vx * vx + vy * vy).sqrt();
        if mag < 1.0 {
            continue;
        }
        let (ux, uy) = (vx / mag, vy / mag);
        let (xf, yf) = (x as f32, y as f32);
        buckets.push([xf, yf]);

        for sign in [1.0f32, -1.0] {
            let mut last_cell = usize::MAX;
            let mut r = r_min;
            while r <= r_max {
                let px = xf + sign * ux * r;
                let py = yf + sign * uy * r;
                if px < 0.0 || py < 0.0 {
                    break;
                }
                let ax = (px * idp) as usize + 1;
                let ay = (py * idp) as usize + 1;
                if ax >= acols - 1 || ay >= arows - 1 {
                    break;
                }
                let cell = ay * acols + ax;
                if cell != last_cell {
                    accum[cell] += 1;
                    last_cell = cell;
                }
                r += 1.0;
            }
        }
    }

    let threshold = pass.acc_threshold.max(0.0);
    let mut centers: Vec<(usize, u32)> = Vec::new();
    for ay in 1..arows - 1 {
        for ax in 1..acols - 1 {
            let idx = ay * acols + ax;
            let v = accum[idx];
            if (v as f32) > threshold
                && v > accum[idx - 1]
                && v >= accum[idx + 1]
                && v > accum[idx - acols]
                && v >= accum[idx + acols]
            {
                centers.push((idx, v));
            }
        }
    }
    centers.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let min_dist_sq = pass.min_dist * pass.min_dist;
    let mut circles: Vec<HoughCircle> = Vec::new();
    let mut dists: Vec<f32> = Vec::new();
    for (idx, votes) in centers {
        let ay = idx / acols;
        let ax = idx - ay * acols;
        let cx = (ax as f32 - 1.0 + 0.5) * dp;
        let cy = (ay as f32 - 1.0 + 0.5) * dp;

        let crowded = circles.iter().any(|c| {
            let dx = c.x - cx;
            let dy = c.y - cy;
            dx * dx + dy * dy < min_dist_sq
        });
        if crowded {
            continue;
        }

        buckets.distances_within([cx, cy], r_min, r_max, &mut dists);
        let Some((r_best, support)) = best_supported_radius(&mut dists, dp) else {
            continue;
        };
        if (support as f32) > threshold {
            circles.push(HoughCircle {
                x: cx,
                y: cy,
                r: r_best,
                votes,
            });
        }
    }
    circles
}

/// Pick the radius shell (width `dr`) with the highest edge density
/// (`count / r`). Returns `(radius, count)`.
fn best_supported_radius(dists: &mut [f32], dr: f32) -> Option<(f32, usize)> {
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(|a, b| a.total_cmp(b));
    let n = dists.len();
    let mut best_r = 0.0f32;
    let mut best_count = 0usize;
    let mut start = 0usize;
    for j in 1..=n {
        if j < n && dists[j] - dists[start] <= dr {
            continue;
        }
        let count = j - start;
        let r_cur = dists[(start + j - 1) / 2].max(1e-3);
        let better = best_count == 0 || (count as f32) * best_r > (best_count as f32) * r_cur;
        if better {
            best_r = r_cur;
            best_count = count;
        }
        start = j;
    }
    (best_count > 0).then_some((best_r, best_count))
}
