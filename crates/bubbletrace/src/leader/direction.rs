//! Pointer direction from the isolated tip pixels.

use image::GrayImage;
use nalgebra::Vector2;

use super::TraceConfig;
use crate::shape::{harris_response, max_response};

/// Result of the weighted corner vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CornerVote {
    /// Weighted sum of center-to-corner vectors (not normalized).
    Vector(Vector2<f64>),
    /// No positive corner response anywhere.
    NoResponse,
    /// Corners exist but none carried usable weight inside the distance band.
    TooWeak,
}

/// Weight favoring corners near the expected tip distance.
#[inline]
pub(crate) fn proximity_weight(dist: f64, radius: f64, cfg: &TraceConfig) -> f64 {
    let span = radius * cfg.proximity_span_frac;
    if span <= 0.0 {
        return cfg.min_proximity_weight;
    }
    (1.0 - (dist - radius).abs() / span).max(cfg.min_proximity_weight)
}

/// Vote over strong Harris corners of `tip`.
///
/// Pixels whose response exceeds `corner_threshold_frac` of the maximum are
/// kept if their distance from `center` lies in
/// `[min_corner_dist_frac·r, max_corner_dist_frac·r]`. Each contributes its
/// offset from the center weighted by `response · proximity_weight`.
pub fn corner_vote(tip: &GrayImage, center: [i32; 2], radius: i32, cfg: &TraceConfig) -> CornerVote {
    let response = harris_response(tip, cfg.harris_block_size, cfg.harris_k);
    let peak = max_response(&response);
    if peak <= 0.0 {
        return CornerVote::NoResponse;
    }
    let threshold = cfg.corner_threshold_frac * peak;
    let r = radius as f64;
    let d_min = r * cfg.min_corner_dist_frac;
    let d_max = r * cfg.max_corner_dist_frac;

    let mut sum = Vector2::<f64>::zeros();
    let mut total_weight = 0.0f64;
    for (x, y, v) in response.enumerate_pixels() {
        let resp = v[0];
        if resp <= threshold {
            continue;
        }
        let offset = Vector2::new(x as f64 - center[0] as f64, y as f64 - center[1] as f64);
        let dist = offset.norm();
        if dist < d_min || dist > d_max {
            continue;
        }
        let weight = resp as f64 * proximity_weight(dist, r, cfg);
        sum += offset * weight;
        total_weight += weight;
    }

    if total_weight < cfg.min_total_weight {
        return CornerVote::TooWeak;
    }
    CornerVote::Vector(sum)
}

/// Offset from `center` to the centroid of the set pixels, if any.
pub fn centroid_offset(tip: &GrayImage, center: [i32; 2]) -> Option<Vector2<f64>> {
    let mut sum = Vector2::<f64>::zeros();
    let mut n = 0usize;
    for (x, y, p) in tip.enumerate_pixels() {
        if p[0] != 0 {
            sum += Vector2::new(x as f64, y as f64);
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    Some(sum / n as f64 - Vector2::new(center[0] as f64, center[1] as f64))
}
