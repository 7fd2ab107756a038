//! Capture box placement along a leader direction.
//!
//! Every box of the progressive sequence is centered on the same anchor,
//! `radius + steps[0].width / 2 + anchor_margin_px` pixels from the bubble
//! center along the direction. A box whose footprint would reach behind the
//! bubble center is pushed further along the ray, just far enough that every
//! corner projects forward. The result is clamped to the page.

use nalgebra::Vector2;

use crate::geometry::{BoundingBox, DirectionVector};

/// Nominal capture box size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CaptureStep {
    pub width: u32,
    pub height: u32,
}

impl CaptureStep {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `"WxH"` label.
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Capture placement parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Progressive sizes, smallest first.
    pub steps: [CaptureStep; 4],
    /// Extra gap between the smallest box and the bubble edge (pixels).
    pub anchor_margin_px: f64,
    /// Clearance added when a box has to be pushed forward (pixels).
    pub push_epsilon_px: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            steps: [
                CaptureStep::new(128, 128),
                CaptureStep::new(256, 128),
                CaptureStep::new(512, 256),
                CaptureStep::new(1024, 512),
            ],
            anchor_margin_px: 4.0,
            push_epsilon_px: 1.0,
        }
    }
}

impl CaptureConfig {
    /// Distance from the bubble center to the shared anchor.
    pub fn anchor_distance(&self, radius: i32) -> f64 {
        radius as f64 + (self.steps[0].width / 2) as f64 + self.anchor_margin_px
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.steps.iter().any(|s| s.width == 0 || s.height == 0) {
            return Err("capture steps must have a non-zero size".to_string());
        }
        for pair in self.steps.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let grows = b.width >= a.width
                && b.height >= a.height
                && (b.width as u64 * b.height as u64) > (a.width as u64 * a.height as u64);
            if !grows {
                return Err(format!(
                    "capture steps must grow strictly: {} then {}",
                    a.label(),
                    b.label()
                ));
            }
        }
        Ok(())
    }
}

/// One placed capture box.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureBox {
    pub step: CaptureStep,
    /// Shared anchor point (page coordinates).
    pub anchor: [f64; 2],
    /// Box center after the push-out rule.
    pub center: [f64; 2],
    /// Distance pushed along the direction (0 when not needed).
    pub push: f64,
    /// Page-clamped rectangle.
    pub rect: BoundingBox,
}

/// Place one box of size `step` for a bubble at `center` with `radius`.
pub fn place_capture_box(
    center: [i32; 2],
    radius: i32,
    direction: &DirectionVector,
    step: CaptureStep,
    page_size: [u32; 2],
    cfg: &CaptureConfig,
) -> CaptureBox {
    let c = Vector2::new(center[0] as f64, center[1] as f64);
    let d = direction.as_vector();
    let half = Vector2::new((step.width / 2) as f64, (step.height / 2) as f64);

    let anchor = c + d * cfg.anchor_distance(radius);
    let min_dot = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
        .iter()
        .map(|&(sx, sy)| {
            let corner = anchor + Vector2::new(sx * half.x, sy * half.y);
            (corner - c).dot(&d)
        })
        .fold(f64::INFINITY, f64::min);
    let push = if min_dot < 0.0 {
        -min_dot + cfg.push_epsilon_px
    } else {
        0.0
    };
    let box_center = anchor + d * push;

    let rect = BoundingBox::from_corners_clamped(
        (box_center.x - half.x) as i64,
        (box_center.y - half.y) as i64,
        (box_center.x + half.x) as i64,
        (box_center.y + half.y) as i64,
        page_size,
    );
    CaptureBox {
        step,
        anchor: [anchor.x, anchor.y],
        center: [box_center.x, box_center.y],
        push,
        rect,
    }
}

/// All configured steps, smallest first.
pub fn capture_sequence(
    center: [i32; 2],
    radius: i32,
    direction: &DirectionVector,
    page_size: [u32; 2],
    cfg: &CaptureConfig,
) -> [CaptureBox; 4] {
    cfg.steps
        .map(|step| place_capture_box(center, radius, direction, step, page_size, cfg))
}
