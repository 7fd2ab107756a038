//! Page raster and the per-page derived layers shared by every stage.

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::geometry::BoundingBox;
use crate::mask::{close_speckle, hue_band_mask, HueBand};

/// One rendered drawing page (3-channel color).
///
/// The page is never mutated by the pipeline; all stages read from it or
/// from the [`PageLayers`] derived from it.
#[derive(Debug, Clone)]
pub struct RasterPage {
    image: RgbImage,
}

impl RasterPage {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> [u32; 2] {
        [self.image.width(), self.image.height()]
    }

    /// Luma with BT.601 weights, the convention the gate thresholds were tuned against.
    pub fn to_gray(&self) -> GrayImage {
        let (w, h) = self.image.dimensions();
        let mut out = GrayImage::new(w, h);
        for (x, y, p) in self.image.enumerate_pixels() {
            out.put_pixel(x, y, Luma([bt601_luma(p.0)]));
        }
        out
    }

    /// Copy out the pixels under `bbox` (already clamped to the page).
    pub fn crop(&self, bbox: &BoundingBox) -> RgbImage {
        if bbox.is_empty() {
            return RgbImage::new(0, 0);
        }
        image::imageops::crop_imm(
            &self.image,
            bbox.x as u32,
            bbox.y as u32,
            bbox.width as u32,
            bbox.height as u32,
        )
        .to_image()
    }
}

/// Fixed-point BT.601 luma, rounded.
#[inline]
pub(crate) fn bt601_luma(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((r * 4899 + g * 9617 + b * 1868 + 8192) >> 14) as u8
}

/// Page-local intermediate images computed once per page.
#[derive(Debug, Clone)]
pub struct PageLayers {
    /// Grayscale page.
    pub gray: GrayImage,
    /// Binary hue-band mask (255 = ring color).
    pub hue_mask: GrayImage,
    /// Hue-band mask after 3x3 morphological closing.
    pub hue_closed: GrayImage,
}

impl PageLayers {
    pub fn build(page: &RasterPage, band: &HueBand) -> Self {
        let gray = page.to_gray();
        let hue_mask = hue_band_mask(page.image(), band);
        let hue_closed = close_speckle(&hue_mask);
        Self {
            gray,
            hue_mask,
            hue_closed,
        }
    }

    pub fn size(&self) -> [u32; 2] {
        [self.gray.width(), self.gray.height()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn luma_matches_bt601_on_primaries() {
        assert_eq!(bt601_luma([255, 255, 255]), 255);
        assert_eq!(bt601_luma([0, 0, 0]), 0);
        assert_eq!(bt601_luma([255, 0, 0]), 76);
        assert_eq!(bt601_luma([0, 255, 0]), 150);
        assert_eq!(bt601_luma([0, 0, 255]), 29);
    }

    #[test]
    fn crop_of_clamped_box_has_box_dimensions() {
        let page = RasterPage::new(RgbImage::from_pixel(50, 40, Rgb([9, 9, 9])));
        let bbox = BoundingBox::around_circle([48, 20], 6, page.size());
        let crop = page.crop(&bbox);
        assert_eq!(crop.dimensions(), (bbox.width as u32, bbox.height as u32));
        assert_eq!(page.crop(&BoundingBox::new(50, 0, 0, 10)).dimensions(), (0, 0));
    }
}
