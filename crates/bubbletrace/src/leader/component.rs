//! Isolation of the colored component attached to one bubble.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use imageproc::region_labelling::{connected_components, Connectivity};

use super::TraceConfig;
use crate::detector::VerifiedBubble;

/// Square search window around one bubble, with every other bubble's disk
/// already erased from the mask.
#[derive(Debug, Clone)]
pub struct TraceWindow {
    /// Hue mask restricted to the window.
    pub mask: GrayImage,
    /// Window origin in page coordinates.
    pub origin: [i32; 2],
    /// Bubble center in window coordinates.
    pub center: [i32; 2],
    pub radius: i32,
}

impl TraceWindow {
    /// Cut the window for `bubbles[index]`. Returns `None` when the clamped
    /// window is narrower than `min_roi_side_px` on either side.
    pub fn cut(
        mask: &GrayImage,
        bubbles: &[VerifiedBubble],
        index: usize,
        cfg: &TraceConfig,
    ) -> Option<Self> {
        let target = bubbles.get(index)?;
        let (w, h) = mask.dimensions();
        let [cx, cy] = target.center;
        let reach = target.radius * cfg.search_radius_factor;
        let x1 = (cx - reach).max(0);
        let y1 = (cy - reach).max(0);
        let x2 = (cx + reach).min(w as i32);
        let y2 = (cy + reach).min(h as i32);
        if x2 - x1 < cfg.min_roi_side_px || y2 - y1 < cfg.min_roi_side_px {
            return None;
        }

        let mut roi =
            image::imageops::crop_imm(mask, x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32)
                .to_image();
        let (rw, rh) = (roi.width() as i32, roi.height() as i32);
        for (j, other) in bubbles.iter().enumerate() {
            if j == index {
                continue;
            }
            let ox = other.center[0] - x1;
            let oy = other.center[1] - y1;
            let near = other.radius * cfg.neighbor_reach_factor;
            if -near < ox && ox < rw + near && -near < oy && oy < rh + near {
                draw_filled_circle_mut(
                    &mut roi,
                    (ox, oy),
                    other.radius + cfg.neighbor_inflate_px,
                    Luma([0]),
                );
            }
        }

        Some(Self {
            mask: roi,
            origin: [x1, y1],
            center: [cx - x1, cy - y1],
            radius: target.radius,
        })
    }

    #[inline]
    fn is_set(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as u32) < self.mask.width()
            && (y as u32) < self.mask.height()
            && self.mask.get_pixel(x as u32, y as u32)[0] == 255
    }

    /// First set pixel on the nominal ring, scanning angles in steps of
    /// `seed_angle_step_deg`; then the same scan at each radius offset.
    pub fn find_seed(&self, cfg: &TraceConfig) -> Option<(u32, u32)> {
        let step = cfg.seed_angle_step_deg.clamp(1, 360) as usize;
        let offsets = std::iter::once(0).chain(cfg.seed_radius_offsets.iter().copied());
        for off in offsets {
            let r = (self.radius + off) as f64;
            for deg in (0..360).step_by(step) {
                let a = (deg as f64).to_radians();
                let px = (self.center[0] as f64 + r * a.cos()) as i32;
                let py = (self.center[1] as f64 + r * a.sin()) as i32;
                if self.is_set(px, py) {
                    return Some((px as u32, py as u32));
                }
            }
        }
        None
    }

    /// 4-connected component of set pixels containing `seed` (255 inside).
    pub fn component_at(&self, seed: (u32, u32)) -> GrayImage {
        let (w, h) = self.mask.dimensions();
        let mut out = GrayImage::new(w, h);
        if seed.0 >= w || seed.1 >= h || self.mask.get_pixel(seed.0, seed.1)[0] != 255 {
            return out;
        }
        let labels = connected_components(&self.mask, Connectivity::Four, Luma([0u8]));
        let target = labels.get_pixel(seed.0, seed.1)[0];
        for (x, y, l) in labels.enumerate_pixels() {
            if l[0] == target {
                out.put_pixel(x, y, Luma([255]));
            }
        }
        out
    }

    /// Remove the bubble body (disk of radius `radius + body_erase_margin_px`)
    /// from a component, leaving the protruding pointer.
    pub fn erase_body(&self, component: &mut GrayImage, cfg: &TraceConfig) {
        draw_filled_circle_mut(
            component,
            (self.center[0], self.center[1]),
            self.radius + cfg.body_erase_margin_px,
            Luma([0]),
        );
    }
}
