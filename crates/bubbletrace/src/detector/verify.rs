//! Bubble verification gates and scoring.
//!
//! Each candidate is evaluated inside a padded region of interest. Gates run
//! in order and the first failure rejects the candidate:
//!
//! 1. ring color ratio (also picks the verified radius),
//! 2. interior brightness,
//! 3. interior dark-ink density,
//! 4. pointer shape: a near-complete colored arc plus a cluster of colored
//!    pixels just outside the ring.

use std::collections::BTreeMap;

use image::GrayImage;

use super::candidates::{Candidate, CandidateArena, CandidateId};
use crate::page::PageLayers;

/// Composite score weights.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub color_ratio: f64,
    /// Applied to `arc_degrees / 360`.
    pub arc: f64,
    pub dark_ratio: f64,
    pub brightness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            color_ratio: 100.0,
            arc: 50.0,
            dark_ratio: 20.0,
            brightness: 0.1,
        }
    }
}

/// Verification gate thresholds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Extra margin around the ROI radius (pixels).
    pub roi_margin_px: i32,
    /// Lower bound on the ROI radius (pixels).
    pub roi_min_radius_px: i32,
    /// Skip candidates whose clamped ROI is narrower than this on either side.
    pub min_roi_side_px: i32,
    /// Ring-radius scan range; the upper end also stops `scan_edge_margin`
    /// pixels short of the ROI border.
    pub scan_min_radius: i32,
    pub scan_max_radius: i32,
    pub scan_edge_margin: i32,
    /// Half-width of the scan ring (pixels).
    pub ring_half_width: f64,
    pub min_color_ratio: f64,
    /// Accepted verified-radius range (pixels, inclusive).
    pub min_radius: i32,
    pub max_radius: i32,
    /// Interior disk radius as a fraction of the verified radius.
    pub inner_radius_frac: f64,
    pub min_inner_radius: i32,
    /// Minimum mean gray level inside the interior disk.
    pub min_brightness: f64,
    /// Gray levels at or below this count as ink.
    pub dark_level: u8,
    pub min_dark_ratio: f64,
    pub max_dark_ratio: f64,
    /// Angular bins around the ring.
    pub arc_bins: usize,
    /// Radius slack (± pixels) when probing ring color at each angle.
    pub arc_radius_slack: i32,
    pub min_arc_deg: f64,
    /// Radial probe range outside the ring for the pointer test.
    pub pointer_min_offset: i32,
    pub pointer_max_offset: i32,
    pub pointer_sectors: usize,
    /// Number of consecutive sectors summed by the pointer test.
    pub pointer_window: usize,
    pub min_pointer_hits: u32,
    pub score: ScoreWeights,
    /// Minimum distance between retained bubbles (pixels).
    pub min_separation_px: f64,
    /// Row band height for reading order (pixels).
    pub row_band_px: i32,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            roi_margin_px: 20,
            roi_min_radius_px: 20,
            min_roi_side_px: 20,
            scan_min_radius: 8,
            scan_max_radius: 26,
            scan_edge_margin: 2,
            ring_half_width: 1.5,
            min_color_ratio: 0.15,
            min_radius: 10,
            max_radius: 22,
            inner_radius_frac: 0.6,
            min_inner_radius: 3,
            min_brightness: 120.0,
            dark_level: 128,
            min_dark_ratio: 0.03,
            max_dark_ratio: 0.60,
            arc_bins: 72,
            arc_radius_slack: 1,
            min_arc_deg: 180.0,
            pointer_min_offset: 2,
            pointer_max_offset: 10,
            pointer_sectors: 12,
            pointer_window: 3,
            min_pointer_hits: 8,
            score: ScoreWeights::default(),
            min_separation_px: 25.0,
            row_band_px: 60,
        }
    }
}

impl VerifyConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.min_radius > self.max_radius || self.scan_min_radius > self.scan_max_radius {
            return Err("verifier radius bounds are not ordered".to_string());
        }
        if self.min_dark_ratio > self.max_dark_ratio {
            return Err("dark ratio bounds are not ordered".to_string());
        }
        if self.arc_bins == 0 || self.pointer_sectors == 0 || self.arc_bins % self.pointer_sectors != 0
        {
            return Err(format!(
                "arc bins ({}) must be a positive multiple of pointer sectors ({})",
                self.arc_bins, self.pointer_sectors
            ));
        }
        if self.pointer_window == 0 || self.pointer_window > self.pointer_sectors {
            return Err("pointer window must be within 1..=pointer_sectors".to_string());
        }
        if self.row_band_px <= 0 {
            return Err("row band height must be positive".to_string());
        }
        Ok(())
    }
}

/// Why a candidate was dropped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GateRejection {
    /// ROI clamped to the page is too small to evaluate.
    RoiTooSmall,
    ColorRatio,
    RadiusRange,
    Brightness,
    DarkRatio,
    ArcContinuity,
    PointerShape,
}

/// A candidate that passed every gate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VerifiedBubble {
    pub center: [i32; 2],
    /// Ring radius maximizing the color ratio.
    pub radius: i32,
    pub score: f64,
}

/// Gate measurements of a verified candidate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GateMetrics {
    pub color_ratio: f64,
    pub brightness: f64,
    pub dark_ratio: f64,
    pub arc_deg: f64,
    pub pointer_hits: u32,
}

/// Clamped ROI with the candidate center in page coordinates.
struct Roi {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    cx: i32,
    cy: i32,
}

impl Roi {
    #[inline]
    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Largest scan radius that keeps the ring `margin` pixels from the ROI border.
    fn inner_reach(&self, margin: i32) -> i32 {
        let left = self.cx - self.x1;
        let top = self.cy - self.y1;
        let right = self.x2 - self.cx;
        let bottom = self.y2 - self.cy;
        left.min(top).min(right).min(bottom) - margin
    }
}

#[inline]
fn is_set(mask: &GrayImage, x: i32, y: i32) -> bool {
    mask.get_pixel(x as u32, y as u32)[0] != 0
}

/// Run all gates on one candidate.
pub fn verify_candidate(
    c: &Candidate,
    layers: &PageLayers,
    cfg: &VerifyConfig,
) -> Result<(VerifiedBubble, GateMetrics), GateRejection> {
    let [w, h] = layers.size();
    let roi_r = c.radius.max(cfg.roi_min_radius_px);
    let reach = roi_r + cfg.roi_margin_px;
    let roi = Roi {
        x1: (c.x - reach).max(0),
        y1: (c.y - reach).max(0),
        x2: (c.x + reach).min(w as i32),
        y2: (c.y + reach).min(h as i32),
        cx: c.x,
        cy: c.y,
    };
    if roi.x2 - roi.x1 < cfg.min_roi_side_px || roi.y2 - roi.y1 < cfg.min_roi_side_px {
        return Err(GateRejection::RoiTooSmall);
    }

    let mask = &layers.hue_mask;
    let (color_ratio, radius) = best_ring_radius(&roi, mask, cfg);
    if color_ratio < cfg.min_color_ratio {
        return Err(GateRejection::ColorRatio);
    }
    if radius < cfg.min_radius || radius > cfg.max_radius {
        return Err(GateRejection::RadiusRange);
    }

    let (brightness, dark_ratio) = interior_stats(&roi, &layers.gray, radius, cfg);
    if brightness < cfg.min_brightness {
        return Err(GateRejection::Brightness);
    }
    if dark_ratio < cfg.min_dark_ratio || dark_ratio > cfg.max_dark_ratio {
        return Err(GateRejection::DarkRatio);
    }

    let arc_deg = longest_arc_deg(&roi, mask, radius, cfg);
    if arc_deg < cfg.min_arc_deg {
        return Err(GateRejection::ArcContinuity);
    }
    let pointer_hits = pointer_window_hits(&roi, mask, radius, cfg);
    if pointer_hits < cfg.min_pointer_hits {
        return Err(GateRejection::PointerShape);
    }

    let sw = &cfg.score;
    let score = sw.color_ratio * color_ratio
        + sw.arc * (arc_deg / 360.0)
        + sw.dark_ratio * dark_ratio
        + sw.brightness * brightness;
    Ok((
        VerifiedBubble {
            center: c.center(),
            radius,
            score,
        },
        GateMetrics {
            color_ratio,
            brightness,
            dark_ratio,
            arc_deg,
            pointer_hits,
        },
    ))
}

/// Scan ring radii and return `(best_ratio, best_radius)`; the smallest
/// radius wins ties. Ratio is 0 when no radius can be scanned.
fn best_ring_radius(roi: &Roi, mask: &GrayImage, cfg: &VerifyConfig) -> (f64, i32) {
    let r_lo = cfg.scan_min_radius.max(0);
    let r_hi = roi.inner_reach(cfg.scan_edge_margin).min(cfg.scan_max_radius);
    if r_hi < r_lo {
        return (0.0, r_lo);
    }
    let n = (r_hi - r_lo + 1) as usize;
    let mut total = vec![0u32; n];
    let mut colored = vec![0u32; n];
    let hw = cfg.ring_half_width;
    let outer = r_hi + hw.ceil() as i32;

    for y in (roi.cy - outer).max(roi.y1)..(roi.cy + outer + 1).min(roi.y2) {
        for x in (roi.cx - outer).max(roi.x1)..(roi.cx + outer + 1).min(roi.x2) {
            let dx = (x - roi.cx) as f64;
            let dy = (y - roi.cy) as f64;
            let d = (dx * dx + dy * dy).sqrt();
            let lo = ((d - hw).ceil() as i32).max(r_lo);
            let hi = ((d + hw).floor() as i32).min(r_hi);
            if lo > hi {
                continue;
            }
            let hit = is_set(mask, x, y);
            for r in lo..=hi {
                let k = (r - r_lo) as usize;
                total[k] += 1;
                if hit {
                    colored[k] += 1;
                }
            }
        }
    }

    let mut best = (0.0f64, r_lo);
    for k in 0..n {
        if total[k] == 0 {
            continue;
        }
        let ratio = colored[k] as f64 / total[k] as f64;
        if ratio > best.0 {
            best = (ratio, r_lo + k as i32);
        }
    }
    best
}

/// Mean gray level and ink fraction inside the interior disk.
fn interior_stats(roi: &Roi, gray: &GrayImage, radius: i32, cfg: &VerifyConfig) -> (f64, f64) {
    let inner_r = cfg
        .min_inner_radius
        .max((radius as f64 * cfg.inner_radius_frac) as i32);
    let r2 = (inner_r * inner_r) as i64;
    let mut sum = 0u64;
    let mut count = 0u64;
    let mut dark = 0u64;
    for y in (roi.cy - inner_r).max(roi.y1)..(roi.cy + inner_r + 1).min(roi.y2) {
        for x in (roi.cx - inner_r).max(roi.x1)..(roi.cx + inner_r + 1).min(roi.x2) {
            let dx = (x - roi.cx) as i64;
            let dy = (y - roi.cy) as i64;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = gray.get_pixel(x as u32, y as u32)[0];
            sum += v as u64;
            count += 1;
            if v <= cfg.dark_level {
                dark += 1;
            }
        }
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    (sum as f64 / count as f64, dark as f64 / count as f64)
}

/// Point on a ray from the ROI center, truncated toward zero like the
/// integer pixel lattice.
#[inline]
fn ray_pixel(roi: &Roi, angle_rad: f64, dist: i32) -> (i32, i32) {
    let d = dist as f64;
    (
        roi.cx + (d * angle_rad.cos()) as i32,
        roi.cy + (d * angle_rad.sin()) as i32,
    )
}

/// Longest run of colored angular bins, in degrees. Two passes over the bins
/// let a run wrap past 0°; the run is capped at a full turn.
fn longest_arc_deg(roi: &Roi, mask: &GrayImage, radius: i32, cfg: &VerifyConfig) -> f64 {
    let bins = cfg.arc_bins;
    if bins == 0 {
        return 0.0;
    }
    let step_deg = 360.0 / bins as f64;
    let present: Vec<bool> = (0..bins)
        .map(|a| {
            let angle = (a as f64 * step_deg).to_radians();
            (-cfg.arc_radius_slack..=cfg.arc_radius_slack).any(|dr| {
                let (px, py) = ray_pixel(roi, angle, radius + dr);
                roi.contains(px, py) && is_set(mask, px, py)
            })
        })
        .collect();

    let mut longest = 0usize;
    let mut current = 0usize;
    for _ in 0..2 {
        for &p in &present {
            if p {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
    }
    longest.min(bins) as f64 * step_deg
}

/// Best sum of colored samples over `pointer_window` consecutive sectors
/// just outside the ring.
fn pointer_window_hits(roi: &Roi, mask: &GrayImage, radius: i32, cfg: &VerifyConfig) -> u32 {
    let bins = cfg.arc_bins;
    let n = cfg.pointer_sectors;
    if n == 0 || bins < n {
        return 0;
    }
    let per_sector = bins / n;
    let step_deg = 360.0 / bins as f64;
    let mut sectors = vec![0u32; n];
    for a in 0..bins {
        let angle = (a as f64 * step_deg).to_radians();
        let sector = (a / per_sector).min(n - 1);
        for off in cfg.pointer_min_offset..=cfg.pointer_max_offset {
            let (px, py) = ray_pixel(roi, angle, radius + off);
            if roi.contains(px, py) && is_set(mask, px, py) {
                sectors[sector] += 1;
            }
        }
    }
    (0..n)
        .map(|s| (0..cfg.pointer_window).map(|k| sectors[(s + k) % n]).sum::<u32>())
        .max()
        .unwrap_or(0)
}

/// Gate outcome of every candidate in an arena.
#[derive(Debug, Clone, Default)]
pub struct Verification {
    pub passed: Vec<(CandidateId, VerifiedBubble, GateMetrics)>,
    pub rejections: BTreeMap<GateRejection, usize>,
}

/// Verify every candidate, counting rejections by gate.
pub fn verify_candidates(
    arena: &CandidateArena,
    layers: &PageLayers,
    cfg: &VerifyConfig,
) -> Verification {
    let mut out = Verification::default();
    for (id, c) in arena.iter() {
        match verify_candidate(c, layers, cfg) {
            Ok((bubble, metrics)) => out.passed.push((id, bubble, metrics)),
            Err(reason) => *out.rejections.entry(reason).or_insert(0) += 1,
        }
    }
    tracing::debug!(
        "{} of {} candidates passed verification, rejections {:?}",
        out.passed.len(),
        arena.len(),
        out.rejections
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::candidates::CandidateSource;
    use crate::mask::HueBand;
    use crate::page::RasterPage;
    use crate::test_utils::{draw_bubble_page, SyntheticBubble, PAPER};
    use image::Rgb;

    fn layers_for(bubbles: &[SyntheticBubble], w: u32, h: u32) -> PageLayers {
        let page = RasterPage::new(draw_bubble_page(w, h, bubbles));
        PageLayers::build(&page, &HueBand::default())
    }

    fn cand_at(center: [i32; 2], radius: i32) -> Candidate {
        Candidate {
            x: center[0],
            y: center[1],
            radius,
            source: CandidateSource::ColorHough,
        }
    }

    #[test]
    fn well_formed_bubble_passes_every_gate() {
        let b = SyntheticBubble::new([100, 100], 16, 30.0);
        let layers = layers_for(&[b], 200, 200);
        let (bubble, m) =
            verify_candidate(&cand_at(b.center, 14), &layers, &VerifyConfig::default()).unwrap();
        assert_eq!(bubble.center, [100, 100]);
        assert!((bubble.radius - 16).abs() <= 1, "radius {}", bubble.radius);
        assert!(m.color_ratio > 0.55);
        assert!(m.arc_deg >= 350.0);
        assert!(m.pointer_hits >= 8);
        assert!(m.brightness > 150.0);
        assert!(m.dark_ratio > 0.1 && m.dark_ratio < 0.4);
        let expected = 100.0 * m.color_ratio
            + 50.0 * m.arc_deg / 360.0
            + 20.0 * m.dark_ratio
            + 0.1 * m.brightness;
        assert!((bubble.score - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_ring_fails_dark_ratio() {
        let mut b = SyntheticBubble::new([100, 100], 16, 0.0);
        b.with_digit = false;
        let layers = layers_for(&[b], 200, 200);
        let res = verify_candidate(&cand_at(b.center, 16), &layers, &VerifyConfig::default());
        assert_eq!(res.unwrap_err(), GateRejection::DarkRatio);
    }

    #[test]
    fn dark_interior_fails_brightness() {
        let b = SyntheticBubble::new([100, 100], 16, 0.0);
        let mut img = draw_bubble_page(200, 200, &[b]);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let (dx, dy) = (x as i32 - 100, y as i32 - 100);
            if dx * dx + dy * dy <= 13 * 13 {
                *p = Rgb([60, 60, 60]);
            }
        }
        let layers = PageLayers::build(&RasterPage::new(img), &HueBand::default());
        let res = verify_candidate(&cand_at(b.center, 16), &layers, &VerifyConfig::default());
        assert_eq!(res.unwrap_err(), GateRejection::Brightness);
    }

    #[test]
    fn fragmented_ring_fails_arc_continuity() {
        let b = SyntheticBubble::new([100, 100], 16, 0.0);
        let mut img = draw_bubble_page(200, 200, &[b]);
        // Erase the stroke in every other 30° sector; pointer pixels beyond
        // the stroke are left alone.
        for (x, y, p) in img.enumerate_pixels_mut() {
            let (dx, dy) = (x as f64 - 100.0, y as f64 - 100.0);
            let d = (dx * dx + dy * dy).sqrt();
            if (d - 16.0).abs() > 1.5 {
                continue;
            }
            let deg = dy.atan2(dx).to_degrees().rem_euclid(360.0);
            if (deg / 30.0) as u32 % 2 == 1 {
                *p = PAPER;
            }
        }
        let layers = PageLayers::build(&RasterPage::new(img), &HueBand::default());
        let res = verify_candidate(&cand_at(b.center, 16), &layers, &VerifyConfig::default());
        assert_eq!(res.unwrap_err(), GateRejection::ArcContinuity);
    }

    #[test]
    fn ring_without_pointer_fails_pointer_gate() {
        let mut b = SyntheticBubble::new([100, 100], 16, 0.0);
        b.pointer_deg = None;
        let layers = layers_for(&[b], 200, 200);
        let res = verify_candidate(&cand_at(b.center, 16), &layers, &VerifyConfig::default());
        assert_eq!(res.unwrap_err(), GateRejection::PointerShape);
    }

    #[test]
    fn oversized_ring_fails_radius_range() {
        let b = SyntheticBubble::new([100, 100], 25, 0.0);
        let layers = layers_for(&[b], 200, 200);
        let res = verify_candidate(&cand_at(b.center, 25), &layers, &VerifyConfig::default());
        assert_eq!(res.unwrap_err(), GateRejection::RadiusRange);
    }

    #[test]
    fn blank_area_fails_color_ratio_and_corner_roi_is_skipped() {
        let layers = layers_for(&[], 200, 200);
        let cfg = VerifyConfig::default();
        let res = verify_candidate(&cand_at([100, 100], 15), &layers, &cfg);
        assert_eq!(res.unwrap_err(), GateRejection::ColorRatio);
        let res = verify_candidate(&cand_at([-45, -45], 15), &layers, &cfg);
        assert_eq!(res.unwrap_err(), GateRejection::RoiTooSmall);
    }

    #[test]
    fn rejection_counts_are_tallied_per_gate() {
        let good = SyntheticBubble::new([60, 60], 16, 0.0);
        let layers = layers_for(&[good], 240, 120);
        let mut arena = CandidateArena::new();
        arena.insert_if_clear(cand_at(good.center, 16), 15.0);
        arena.insert_if_clear(cand_at([180, 60], 16), 15.0);
        let v = verify_candidates(&arena, &layers, &VerifyConfig::default());
        assert_eq!(v.passed.len(), 1);
        assert_eq!(v.passed[0].0, CandidateId(0));
        assert_eq!(v.rejections.get(&GateRejection::ColorRatio), Some(&1));
    }
}
