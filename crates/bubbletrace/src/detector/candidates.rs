//! Bubble candidate generation.
//!
//! Four pass families feed one arena of candidates:
//!
//! 1. circle transform over the blurred, closed hue mask (`ColorHough`);
//! 2. contours of the dilated hue mask (`ColorContour`);
//! 3. circle transform over the blurred grayscale page (`GrayHough`);
//! 4. contours of adaptive-threshold binarizations (`GrayContour`).
//!
//! The generator favors recall. Every new candidate is rejected when it lies
//! too close to one already in the arena; the verifier prunes the rest.

use image::GrayImage;

use crate::geometry::distance_i;
use crate::mask::{adaptive_threshold_gaussian, close_2x2, dilate_2x2, gaussian_blur};
use crate::page::PageLayers;
use crate::shape::{hough_circles, trace_shapes, HoughPass};

/// Which pass family produced a candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    ColorHough,
    ColorContour,
    GrayHough,
    GrayContour,
}

/// A proposed bubble location. Coordinates are truncated to whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn center(&self) -> [i32; 2] {
        [self.x, self.y]
    }
}

/// Handle into a [`CandidateArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(pub usize);

/// Append-only store of the candidates of one page.
#[derive(Debug, Clone, Default)]
pub struct CandidateArena {
    items: Vec<Candidate>,
}

impl CandidateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.items.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, &Candidate)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, c)| (CandidateId(i), c))
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.items
    }

    /// Insert unless an existing candidate lies closer than `min_dist`.
    pub fn insert_if_clear(&mut self, c: Candidate, min_dist: f64) -> Option<CandidateId> {
        let crowded = self
            .items
            .iter()
            .any(|e| distance_i(e.center(), c.center()) < min_dist);
        self.push_unless(crowded, c)
    }

    /// Insert unless an existing candidate lies closer than
    /// `factor * max(existing.radius, c.radius)`.
    pub fn insert_if_clear_scaled(&mut self, c: Candidate, factor: f64) -> Option<CandidateId> {
        let crowded = self.items.iter().any(|e| {
            distance_i(e.center(), c.center()) < e.radius.max(c.radius) as f64 * factor
        });
        self.push_unless(crowded, c)
    }

    fn push_unless(&mut self, crowded: bool, c: Candidate) -> Option<CandidateId> {
        if crowded {
            return None;
        }
        self.items.push(c);
        Some(CandidateId(self.items.len() - 1))
    }
}

/// Blur level used by a grayscale circle pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurLevel {
    Fine,
    Coarse,
}

/// Grayscale circle pass: blur level plus transform parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GrayHoughPass {
    pub blur: BlurLevel,
    #[serde(flatten)]
    pub pass: HoughPass,
}

/// Acceptance gate for contours of the dilated hue mask.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColorContourGate {
    /// Minimum vertex count after straight-run compression.
    pub min_points: usize,
    /// Minimum `4π·area / perimeter²`.
    pub min_circularity: f64,
    /// Enclosing-circle radius bounds (pixels).
    pub min_radius: f64,
    pub max_radius: f64,
}

impl Default for ColorContourGate {
    fn default() -> Self {
        Self {
            min_points: 6,
            min_circularity: 0.25,
            min_radius: 8.0,
            max_radius: 35.0,
        }
    }
}

/// Adaptive-threshold contour backup over the grayscale page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GrayContourConfig {
    /// Adaptive threshold neighborhood sizes (odd).
    pub block_sizes: Vec<u32>,
    /// Constant subtracted from the local Gaussian mean.
    pub offset: f32,
    pub min_points: usize,
    pub min_circularity: f64,
    /// Bounds on the equal-area radius `sqrt(area / π)`.
    pub min_radius: f64,
    pub max_radius: f64,
    /// Minimum area relative to the enclosing circle.
    pub min_fill_ratio: f64,
    /// Dedup distance as a fraction of the larger of the two radii.
    pub dedup_radius_factor: f64,
}

impl Default for GrayContourConfig {
    fn default() -> Self {
        Self {
            block_sizes: vec![31, 51, 71],
            offset: 10.0,
            min_points: 8,
            min_circularity: 0.65,
            min_radius: 8.0,
            max_radius: 50.0,
            min_fill_ratio: 0.6,
            dedup_radius_factor: 0.6,
        }
    }
}

/// Configuration of every candidate pass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Gaussian sigma applied to the closed hue mask before the color passes.
    pub color_blur_sigma: f32,
    /// Circle passes over the color mask, run in order.
    pub color_passes: Vec<HoughPass>,
    pub color_contour: ColorContourGate,
    pub fine_blur_sigma: f32,
    pub coarse_blur_sigma: f32,
    /// Circle passes over the grayscale page, run in order.
    pub gray_passes: Vec<GrayHoughPass>,
    pub gray_contour: GrayContourConfig,
    /// Fixed proximity dedup for circle and color-contour candidates (pixels).
    pub dedup_distance_px: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        let gray = |blur, pass| GrayHoughPass { blur, pass };
        Self {
            color_blur_sigma: 1.0,
            color_passes: vec![
                HoughPass::new(1.0, 18.0, 60.0, 12.0, 10, 28),
                HoughPass::new(1.2, 20.0, 80.0, 15.0, 10, 28),
                HoughPass::new(1.5, 18.0, 50.0, 10.0, 8, 30),
                HoughPass::new(1.0, 15.0, 40.0, 8.0, 8, 25),
            ],
            color_contour: ColorContourGate::default(),
            fine_blur_sigma: 1.0,
            coarse_blur_sigma: 2.0,
            gray_passes: vec![
                gray(
                    BlurLevel::Coarse,
                    HoughPass::new(1.2, 22.0, 120.0, 23.0, 12, 50),
                ),
                gray(BlurLevel::Fine, HoughPass::new(1.0, 18.0, 100.0, 20.0, 8, 25)),
                gray(
                    BlurLevel::Coarse,
                    HoughPass::new(1.5, 22.0, 80.0, 18.0, 10, 45),
                ),
                gray(BlurLevel::Fine, HoughPass::new(1.0, 15.0, 80.0, 15.0, 10, 22)),
            ],
            gray_contour: GrayContourConfig::default(),
            dedup_distance_px: 15.0,
        }
    }
}

impl CandidateConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        let all_passes = self
            .color_passes
            .iter()
            .chain(self.gray_passes.iter().map(|g| &g.pass));
        for p in all_passes {
            if p.min_radius > p.max_radius {
                return Err(format!(
                    "circle pass radius bounds are not ordered: {}..{}",
                    p.min_radius, p.max_radius
                ));
            }
            if !(p.dp >= 1.0) {
                return Err(format!("circle pass dp must be >= 1, got {}", p.dp));
            }
        }
        if self.color_contour.min_radius > self.color_contour.max_radius {
            return Err("color contour radius bounds are not ordered".to_string());
        }
        if self.gray_contour.min_radius > self.gray_contour.max_radius {
            return Err("gray contour radius bounds are not ordered".to_string());
        }
        if let Some(b) = self.gray_contour.block_sizes.iter().find(|&&b| b < 3 || b % 2 == 0) {
            return Err(format!("adaptive threshold block size {} must be odd and >= 3", b));
        }
        Ok(())
    }
}

/// Run every pass and return the deduplicated candidate set.
pub fn generate_candidates(layers: &PageLayers, cfg: &CandidateConfig) -> CandidateArena {
    let mut arena = CandidateArena::new();

    let color_blur = gaussian_blur(&layers.hue_closed, cfg.color_blur_sigma);
    for pass in &cfg.color_passes {
        run_circle_pass(&mut arena, &color_blur, pass, CandidateSource::ColorHough, cfg);
    }

    let dilated = dilate_2x2(&layers.hue_closed);
    add_color_contours(&mut arena, &dilated, cfg);
    let color_total = arena.len();

    let fine = gaussian_blur(&layers.gray, cfg.fine_blur_sigma);
    let coarse = gaussian_blur(&layers.gray, cfg.coarse_blur_sigma);
    for gp in &cfg.gray_passes {
        let img = match gp.blur {
            BlurLevel::Fine => &fine,
            BlurLevel::Coarse => &coarse,
        };
        run_circle_pass(&mut arena, img, &gp.pass, CandidateSource::GrayHough, cfg);
    }

    add_gray_contours(&mut arena, &layers.gray, &cfg.gray_contour);

    tracing::debug!(
        "{} candidates ({} from the color mask)",
        arena.len(),
        color_total
    );
    arena
}

fn run_circle_pass(
    arena: &mut CandidateArena,
    img: &GrayImage,
    pass: &HoughPass,
    source: CandidateSource,
    cfg: &CandidateConfig,
) {
    let circles = hough_circles(img, pass);
    let before = arena.len();
    for c in &circles {
        let cand = Candidate {
            x: c.x as i32,
            y: c.y as i32,
            radius: c.r as i32,
            source,
        };
        arena.insert_if_clear(cand, cfg.dedup_distance_px);
    }
    tracing::debug!(
        "{:?} pass (dp={}, acc={}): {} raw, {} new",
        source,
        pass.dp,
        pass.acc_threshold,
        circles.len(),
        arena.len() - before
    );
}

fn add_color_contours(arena: &mut CandidateArena, mask: &GrayImage, cfg: &CandidateConfig) {
    let gate = &cfg.color_contour;
    let max_extent = (2.0 * gate.max_radius).ceil() as u32 + 2;
    let before = arena.len();
    for s in trace_shapes(mask, max_extent) {
        if s.n_points < gate.min_points || s.perimeter < 1.0 {
            continue;
        }
        if s.circularity() < gate.min_circularity {
            continue;
        }
        if s.enclosing_radius < gate.min_radius || s.enclosing_radius > gate.max_radius {
            continue;
        }
        let cand = Candidate {
            x: s.enclosing_center[0] as i32,
            y: s.enclosing_center[1] as i32,
            radius: s.enclosing_radius as i32,
            source: CandidateSource::ColorContour,
        };
        arena.insert_if_clear(cand, cfg.dedup_distance_px);
    }
    tracing::debug!("color contours: {} new", arena.len() - before);
}

fn add_gray_contours(arena: &mut CandidateArena, gray: &GrayImage, cfg: &GrayContourConfig) {
    let fill_floor = cfg.min_fill_ratio.max(0.1);
    let max_extent = (2.0 * cfg.max_radius / fill_floor.sqrt()).ceil() as u32 + 2;
    let before = arena.len();
    for &block in &cfg.block_sizes {
        let binary = adaptive_threshold_gaussian(gray, block, cfg.offset, true);
        let cleaned = close_2x2(&binary);
        for s in trace_shapes(&cleaned, max_extent) {
            if s.n_points < cfg.min_points || s.perimeter < 1.0 {
                continue;
            }
            if s.circularity() < cfg.min_circularity {
                continue;
            }
            let r_est = s.equivalent_radius();
            if r_est < cfg.min_radius || r_est > cfg.max_radius {
                continue;
            }
            if s.fill_ratio() < cfg.min_fill_ratio {
                continue;
            }
            let cand = Candidate {
                x: s.enclosing_center[0] as i32,
                y: s.enclosing_center[1] as i32,
                radius: s.enclosing_radius as i32,
                source: CandidateSource::GrayContour,
            };
            arena.insert_if_clear_scaled(cand, cfg.dedup_radius_factor);
        }
    }
    tracing::debug!("gray contours: {} new", arena.len() - before);
}
