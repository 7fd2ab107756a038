//! Bubble crops and their preparation for a text recognizer.

use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::detector::VerifiedBubble;
use crate::geometry::BoundingBox;
use crate::mask::{adaptive_threshold_gaussian, dilate_cross, hue_band_mask, HueBand};
use crate::page::bt601_luma;

/// Bubble-number OCR preparation parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OcrPrepConfig {
    /// Padding around the bubble circle box (pixels).
    pub crop_pad_px: i32,
    /// Integer upscale factor (cubic).
    pub upscale: u32,
    /// Adaptive threshold block size on the upscaled crop.
    pub block_size: u32,
    pub offset: f32,
    /// White border added around the binarized crop (pixels).
    pub border_px: u32,
    /// Accepted bubble number range (inclusive).
    pub min_number: u32,
    pub max_number: u32,
}

impl Default for OcrPrepConfig {
    fn default() -> Self {
        Self {
            crop_pad_px: 2,
            upscale: 6,
            block_size: 31,
            offset: 10.0,
            border_px: 20,
            min_number: 1,
            max_number: 99,
        }
    }
}

impl OcrPrepConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.upscale == 0 {
            return Err("ocr upscale factor must be positive".to_string());
        }
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(format!(
                "ocr threshold block size {} must be odd and >= 3",
                self.block_size
            ));
        }
        if self.min_number > self.max_number {
            return Err("bubble number range is not ordered".to_string());
        }
        Ok(())
    }
}

/// Box around the bubble circle plus `crop_pad_px`, clamped to the page.
pub fn bubble_crop_box(
    bubble: &VerifiedBubble,
    page_size: [u32; 2],
    cfg: &OcrPrepConfig,
) -> BoundingBox {
    BoundingBox::around_circle_padded(bubble.center, bubble.radius, cfg.crop_pad_px, page_size)
}

/// Binarized, upscaled, white-bordered image of the digits inside a bubble
/// crop. The ring color (slightly dilated) is painted white first so only
/// ink remains.
pub fn prepare_for_ocr(crop: &RgbImage, band: &HueBand, cfg: &OcrPrepConfig) -> GrayImage {
    let (w, h) = crop.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::from_pixel(2 * cfg.border_px, 2 * cfg.border_px, Luma([255]));
    }
    let ring = dilate_cross(&hue_band_mask(crop, band));
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in crop.enumerate_pixels() {
        let rgb = if ring.get_pixel(x, y)[0] != 0 {
            Rgb([255, 255, 255])
        } else {
            *p
        };
        gray.put_pixel(x, y, Luma([bt601_luma(rgb.0)]));
    }

    let up = image::imageops::resize(
        &gray,
        w * cfg.upscale,
        h * cfg.upscale,
        FilterType::CatmullRom,
    );
    let binary = adaptive_threshold_gaussian(&up, cfg.block_size, cfg.offset, false);

    let b = cfg.border_px;
    let mut padded =
        GrayImage::from_pixel(binary.width() + 2 * b, binary.height() + 2 * b, Luma([255]));
    image::imageops::replace(&mut padded, &binary, b as i64, b as i64);
    padded
}

/// Bubble number from raw recognizer text.
///
/// Drops `#` and spaces, maps look-alike letters (`O o → 0`, `l I → 1`,
/// `S → 5`, `B → 8`), keeps the digits and accepts the number when it lies
/// in `[min_number, max_number]`.
pub fn parse_bubble_number(text: &str, cfg: &OcrPrepConfig) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != '#' && *c != ' ')
        .map(|c| match c {
            'O' | 'o' => '0',
            'l' | 'I' => '1',
            'S' => '5',
            'B' => '8',
            other => other,
        })
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return None;
    }
    let n: u32 = digits.parse().ok()?;
    (cfg.min_number..=cfg.max_number).contains(&n).then_some(n)
}
