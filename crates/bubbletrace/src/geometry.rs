//! Integer page rectangles and unit direction vectors.

use nalgebra::Vector2;

/// Axis-aligned integer rectangle in page pixel coordinates.
///
/// Boxes produced by this crate are always clamped to the page, so
/// `x >= 0`, `y >= 0`, `x + width <= page_width` and `y + height <= page_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from corner coordinates `[x1, x2) x [y1, y2)`, clamped to the page.
    pub fn from_corners_clamped(x1: i64, y1: i64, x2: i64, y2: i64, page_size: [u32; 2]) -> Self {
        let w = page_size[0] as i64;
        let h = page_size[1] as i64;
        let x1 = x1.clamp(0, w);
        let y1 = y1.clamp(0, h);
        let x2 = x2.clamp(x1, w);
        let y2 = y2.clamp(y1, h);
        Self {
            x: x1 as i32,
            y: y1 as i32,
            width: (x2 - x1) as i32,
            height: (y2 - y1) as i32,
        }
    }

    /// Square box of side `2 * radius` around a circle, clamped to the page.
    pub fn around_circle(center: [i32; 2], radius: i32, page_size: [u32; 2]) -> Self {
        Self::around_circle_padded(center, radius, 0, page_size)
    }

    /// Like [`BoundingBox::around_circle`] with an extra margin on every side.
    pub fn around_circle_padded(
        center: [i32; 2],
        radius: i32,
        pad: i32,
        page_size: [u32; 2],
    ) -> Self {
        let reach = (radius + pad) as i64;
        Self::from_corners_clamped(
            center[0] as i64 - reach,
            center[1] as i64 - reach,
            center[0] as i64 + reach,
            center[1] as i64 + reach,
            page_size,
        )
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Center in floating-point pixel coordinates.
    pub fn center(&self) -> [f64; 2] {
        [
            self.x as f64 + 0.5 * self.width as f64,
            self.y as f64 + 0.5 * self.height as f64,
        ]
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// True when the box lies inside `[0, w) x [0, h)`.
    pub fn lies_within(&self, page_size: [u32; 2]) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && self.right() as i64 <= page_size[0] as i64
            && self.bottom() as i64 <= page_size[1] as i64
    }
}

/// Unit vector in image space (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DirectionVector {
    pub dx: f64,
    pub dy: f64,
}

impl DirectionVector {
    /// Normalize `v`; returns `None` when its length is below `min_length`.
    pub fn normalized(v: Vector2<f64>, min_length: f64) -> Option<Self> {
        let len = v.norm();
        if !len.is_finite() || len < min_length || len <= 0.0 {
            return None;
        }
        let u = v / len;
        Some(Self { dx: u.x, dy: u.y })
    }

    pub fn as_vector(&self) -> Vector2<f64> {
        Vector2::new(self.dx, self.dy)
    }

    /// Angle in degrees between this direction and `(ex, ey)` (normalized internally).
    pub fn angle_to_deg(&self, ex: f64, ey: f64) -> f64 {
        let e = Vector2::new(ex, ey);
        let n = e.norm();
        if n <= 0.0 {
            return 180.0;
        }
        let dot = (self.as_vector().dot(&e) / n).clamp(-1.0, 1.0);
        dot.acos().to_degrees()
    }
}

/// Euclidean distance between two integer points.
#[inline]
pub fn distance_i(a: [i32; 2], b: [i32; 2]) -> f64 {
    let dx = (a[0] - b[0]) as f64;
    let dy = (a[1] - b[1]) as f64;
    (dx * dx + dy * dy).sqrt()
}
