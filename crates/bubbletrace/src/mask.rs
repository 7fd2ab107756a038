//! Color-band masks and the small morphological / thresholding operators
//! shared by candidate generation, verification and leader tracing.

use std::sync::OnceLock;

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Inclusive HSV band identifying the bubble ring color.
///
/// Hue uses the 8-bit half-degree convention (`0..180`); saturation and
/// value are `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HueBand {
    pub h_min: u8,
    pub h_max: u8,
    pub s_min: u8,
    pub s_max: u8,
    pub v_min: u8,
    pub v_max: u8,
}

impl Default for HueBand {
    fn default() -> Self {
        Self {
            h_min: 85,
            h_max: 125,
            s_min: 25,
            s_max: 255,
            v_min: 50,
            v_max: 255,
        }
    }
}

impl HueBand {
    /// True when an RGB pixel falls inside the band.
    #[inline]
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        let [h, s, v] = rgb_to_hsv8(rgb);
        (self.h_min..=self.h_max).contains(&h)
            && (self.s_min..=self.s_max).contains(&s)
            && (self.v_min..=self.v_max).contains(&v)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.h_min > self.h_max || self.s_min > self.s_max || self.v_min > self.v_max {
            return Err(format!("hue band bounds are not ordered: {:?}", self));
        }
        if self.h_max >= 180 {
            return Err(format!("hue upper bound {} exceeds 179", self.h_max));
        }
        Ok(())
    }
}

/// RGB -> HSV with 8-bit channels (H halved into `0..180`).
pub(crate) fn rgb_to_hsv8(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff <= 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let h8 = (h * 0.5).round() as u32 % 180;
    [h8 as u8, s.round() as u8, v as u8]
}

/// Binary mask (0/255) of pixels inside `band`.
pub fn hue_band_mask(img: &RgbImage, band: &HueBand) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, p) in img.enumerate_pixels() {
        if band.contains(p.0) {
            out.put_pixel(x, y, Luma([255]));
        }
    }
    out
}

/// Morphological closing with the 3x3 cross element; removes pinholes and
/// one-pixel breaks in the ring stroke.
pub fn close_speckle(mask: &GrayImage) -> GrayImage {
    imageproc::morphology::close(mask, Norm::L1, 1)
}

/// Dilation with the 3x3 cross element.
pub fn dilate_cross(mask: &GrayImage) -> GrayImage {
    imageproc::morphology::dilate(mask, Norm::L1, 1)
}

/// 2x2 square structuring element with its anchor at `(ax, ay)`.
fn square_2x2(ax: u8, ay: u8) -> Mask {
    Mask::from_image(&GrayImage::from_pixel(2, 2, Luma([255])), ax, ay)
}

/// Offsets `{-1, 0}²`: each pixel takes the max of itself and its
/// top/left neighbors.
fn trailing_2x2() -> &'static Mask {
    static MASK: OnceLock<Mask> = OnceLock::new();
    MASK.get_or_init(|| square_2x2(1, 1))
}

/// Offsets `{0, 1}²`, the reflection of [`trailing_2x2`].
fn leading_2x2() -> &'static Mask {
    static MASK: OnceLock<Mask> = OnceLock::new();
    MASK.get_or_init(|| square_2x2(0, 0))
}

/// Dilation with a 2x2 square anchored at its bottom-right cell.
pub fn dilate_2x2(mask: &GrayImage) -> GrayImage {
    grayscale_dilate(mask, trailing_2x2())
}

/// Closing with a 2x2 square. Erosion uses the reflected element so the
/// result is not shifted.
pub fn close_2x2(mask: &GrayImage) -> GrayImage {
    grayscale_erode(&dilate_2x2(mask), leading_2x2())
}

/// Gaussian smoothing of an 8-bit image.
pub fn gaussian_blur(gray: &GrayImage, sigma: f32) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(gray, sigma)
}

/// Gaussian sigma matching a square kernel of side `block_size`.
#[inline]
pub(crate) fn sigma_for_block(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian-weighted adaptive threshold.
///
/// A pixel is "dark" when `src <= local_mean - offset`. With `invert = true`
/// dark pixels become 255 (foreground), otherwise they become 0.
pub fn adaptive_threshold_gaussian(
    gray: &GrayImage,
    block_size: u32,
    offset: f32,
    invert: bool,
) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut f = ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
    for (x, y, p) in gray.enumerate_pixels() {
        f.put_pixel(x, y, Luma([p[0] as f32]));
    }
    let mean = imageproc::filter::gaussian_blur_f32(&f, sigma_for_block(block_size).max(0.1));
    let (dark_val, light_val) = if invert { (255u8, 0u8) } else { (0u8, 255u8) };
    let mut out = GrayImage::new(w, h);
    for (x, y, p) in gray.enumerate_pixels() {
        let t = mean.get_pixel(x, y)[0] - offset;
        let v = if (p[0] as f32) > t { light_val } else { dark_val };
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

/// Number of non-zero pixels.
pub fn count_nonzero(mask: &GrayImage) -> usize {
    mask.as_raw().iter().filter(|&&v| v != 0).count()
}
