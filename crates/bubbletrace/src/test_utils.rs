//! Shared test utilities: synthetic rings and rendered bubble pages.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Ring color used on the synthetic pages (inside the default hue band).
pub(crate) const RING_BLUE: Rgb<u8> = Rgb([40, 90, 220]);
/// Digit ink.
pub(crate) const INK: Rgb<u8> = Rgb([30, 30, 30]);
pub(crate) const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

/// Render a synthetic annular ring image.
///
/// Pixels at distance `d` from `center` satisfy:
/// - `ring_pix`  if `inner_radius <= d <= outer_radius`
/// - `bg_pix`    otherwise
pub(crate) fn draw_ring_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    outer_radius: f32,
    inner_radius: f32,
    ring_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            let d = (dx * dx + dy * dy).sqrt();
            let pix = if d >= inner_radius && d <= outer_radius {
                ring_pix
            } else {
                bg_pix
            };
            img.put_pixel(x, y, Luma([pix]));
        }
    }
    img
}

/// One bubble to render.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyntheticBubble {
    pub center: [i32; 2],
    pub radius: i32,
    /// Pointer direction in degrees (image space, 0 = +x, 90 = +y).
    pub pointer_deg: Option<f64>,
    /// Print a digit-like ink block inside the ring.
    pub with_digit: bool,
}

impl SyntheticBubble {
    pub fn new(center: [i32; 2], radius: i32, pointer_deg: f64) -> Self {
        Self {
            center,
            radius,
            pointer_deg: Some(pointer_deg),
            with_digit: true,
        }
    }

    /// Unit vector of the pointer, if any.
    pub fn pointer_unit(&self) -> Option<[f64; 2]> {
        self.pointer_deg.map(|deg| {
            let a = deg.to_radians();
            [a.cos(), a.sin()]
        })
    }
}

/// Draw a ring of stroke half-width 1 px, a filled triangular pointer
/// (base at ±25° on the ring, apex 14 px beyond it) and a 6x10 ink block.
pub(crate) fn draw_bubble(img: &mut RgbImage, b: &SyntheticBubble) {
    let (w, h) = img.dimensions();
    let [cx, cy] = b.center;
    let r = b.radius as f64;
    let reach = b.radius + 3;
    for y in (cy - reach).max(0)..(cy + reach + 1).min(h as i32) {
        for x in (cx - reach).max(0)..(cx + reach + 1).min(w as i32) {
            let d = (((x - cx) * (x - cx) + (y - cy) * (y - cy)) as f64).sqrt();
            if (d - r).abs() <= 1.0 {
                img.put_pixel(x as u32, y as u32, RING_BLUE);
            }
        }
    }

    if let Some(deg) = b.pointer_deg {
        let at = |angle_deg: f64, dist: f64| {
            let a = angle_deg.to_radians();
            Point::new(
                (cx as f64 + dist * a.cos()).round() as i32,
                (cy as f64 + dist * a.sin()).round() as i32,
            )
        };
        let tri = [at(deg - 25.0, r), at(deg, r + 14.0), at(deg + 25.0, r)];
        draw_polygon_mut(img, &tri, RING_BLUE);
    }

    if b.with_digit {
        for y in (cy - 5)..(cy + 5) {
            for x in (cx - 3)..(cx + 3) {
                if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                    img.put_pixel(x as u32, y as u32, INK);
                }
            }
        }
    }
}

/// White page with the given bubbles drawn on it.
pub(crate) fn draw_bubble_page(w: u32, h: u32, bubbles: &[SyntheticBubble]) -> RgbImage {
    let mut img = RgbImage::from_pixel(w, h, PAPER);
    for b in bubbles {
        draw_bubble(&mut img, b);
    }
    img
}

/// Hue mask of a page drawn with [`draw_bubble_page`].
pub(crate) fn ring_mask(img: &RgbImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut m = GrayImage::new(w, h);
    for (x, y, p) in img.enumerate_pixels() {
        if *p == RING_BLUE {
            m.put_pixel(x, y, Luma([255]));
        }
    }
    m
}

/// Angle in degrees between two unit vectors.
pub(crate) fn angle_between_deg(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] * b[0] + a[1] * b[1]).clamp(-1.0, 1.0).acos().to_degrees()
}
