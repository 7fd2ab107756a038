//! Bubble-number reading and dimension validation against capture boxes.
//!
//! Text recognition and visual validation are external services. They are
//! reached through the [`TextRecognizer`] and [`DimensionValidator`] traits;
//! this module decides what pixels to hand them and how to fold their
//! answers into per-bubble records.

pub mod matcher;
pub mod merge;
pub mod ocr_prep;

pub use matcher::{are_similar, confidence_score, SIMILARITY_THRESHOLD};
pub use merge::{
    merge_dimension, DimensionMatch, DimensionSource, MatchStatus, OverlayMarker, PageSummary,
    StepValidation,
};
pub use ocr_prep::{bubble_crop_box, parse_bubble_number, prepare_for_ocr, OcrPrepConfig};

use image::{GrayImage, RgbImage};

use crate::capture::{place_capture_box, CaptureConfig};
use crate::detector::VerifiedBubble;
use crate::geometry::DirectionVector;
use crate::mask::HueBand;
use crate::page::RasterPage;

/// Prefix added to notes of a discovery-mode validation.
pub const DISCOVERY_NOTE_PREFIX: &str = "[Table OCR miss] ";

/// Capture boxes with either side below this are skipped.
const MIN_CAPTURE_SIDE_PX: i32 = 4;

/// Answer of a dimension validator for one capture crop.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Validation {
    /// Dimension text the validator read in the crop.
    pub observed: Option<String>,
    pub matches: bool,
    pub confidence: f64,
    pub notes: String,
}

/// Reads raw text from a prepared bubble crop.
pub trait TextRecognizer {
    type Error;

    fn recognize(&mut self, image: &GrayImage) -> Result<String, Self::Error>;
}

/// Compares capture crops against expected dimension text.
pub trait DimensionValidator {
    type Error;

    /// Check whether `crop` shows `expected` for bubble `number`.
    fn validate(
        &mut self,
        crop: &RgbImage,
        number: u32,
        expected: &str,
    ) -> Result<Validation, Self::Error>;

    /// Report whatever dimension `crop` shows for bubble `number`.
    fn discover(&mut self, crop: &RgbImage, number: u32) -> Result<Validation, Self::Error>;
}

/// Read the printed number of `bubble`.
///
/// Returns `Ok(None)` when the recognizer text holds no number in range.
pub fn read_bubble_number<R: TextRecognizer>(
    page: &RasterPage,
    bubble: &VerifiedBubble,
    band: &HueBand,
    cfg: &OcrPrepConfig,
    recognizer: &mut R,
) -> Result<Option<u32>, R::Error> {
    let bbox = bubble_crop_box(bubble, page.size(), cfg);
    if bbox.is_empty() {
        return Ok(None);
    }
    let prepared = prepare_for_ocr(&page.crop(&bbox), band, cfg);
    let text = recognizer.recognize(&prepared)?;
    Ok(parse_bubble_number(&text, cfg))
}

/// Validate one bubble's dimension through growing capture boxes.
///
/// With an expected table value the steps are tried smallest first and the
/// loop stops at the first confirmed match; the last answer is returned.
/// Without one, a single discovery call is made on the smallest step.
/// `Ok(None)` means every box was too small to crop.
pub fn validate_progressively<V: DimensionValidator>(
    page: &RasterPage,
    bubble: &VerifiedBubble,
    number: u32,
    direction: &DirectionVector,
    expected: Option<&str>,
    cfg: &CaptureConfig,
    validator: &mut V,
) -> Result<Option<StepValidation>, V::Error> {
    let crop_for = |step_idx: usize| {
        let b = place_capture_box(
            bubble.center,
            bubble.radius,
            direction,
            cfg.steps[step_idx],
            page.size(),
            cfg,
        );
        (b.rect.width >= MIN_CAPTURE_SIDE_PX && b.rect.height >= MIN_CAPTURE_SIDE_PX)
            .then(|| page.crop(&b.rect))
    };

    let Some(expected) = expected.filter(|e| !e.is_empty()) else {
        let Some(crop) = crop_for(0) else {
            return Ok(None);
        };
        let mut validation = validator.discover(&crop, number)?;
        validation.notes = format!("{DISCOVERY_NOTE_PREFIX}{}", validation.notes);
        tracing::debug!(number, observed = ?validation.observed, "discovery capture");
        return Ok(Some(StepValidation {
            validation,
            capture_size: cfg.steps[0].label(),
        }));
    };

    let mut last = None;
    for (idx, step) in cfg.steps.iter().enumerate() {
        let Some(crop) = crop_for(idx) else {
            continue;
        };
        let validation = validator.validate(&crop, number, expected)?;
        let matched = validation.matches;
        tracing::debug!(
            number,
            step = %step.label(),
            matched,
            observed = ?validation.observed,
            "capture validation"
        );
        last = Some(StepValidation {
            validation,
            capture_size: step.label(),
        });
        if matched {
            break;
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_bubble_page, SyntheticBubble};
    use nalgebra::Vector2;

    /// Matches once the crop is at least `match_width` wide.
    struct WidthValidator {
        match_width: u32,
        seen: Vec<(u32, u32)>,
    }

    impl DimensionValidator for WidthValidator {
        type Error = String;

        fn validate(
            &mut self,
            crop: &RgbImage,
            _number: u32,
            expected: &str,
        ) -> Result<Validation, String> {
            self.seen.push(crop.dimensions());
            let matches = crop.width() >= self.match_width;
            Ok(Validation {
                observed: Some(if matches { expected.to_string() } else { "?".to_string() }),
                matches,
                confidence: if matches { 0.9 } else { 0.2 },
                notes: String::new(),
            })
        }

        fn discover(&mut self, crop: &RgbImage, _number: u32) -> Result<Validation, String> {
            self.seen.push(crop.dimensions());
            Ok(Validation {
                observed: Some("R3".to_string()),
                matches: false,
                confidence: 0.5,
                notes: "found".to_string(),
            })
        }
    }

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        type Error = std::convert::Infallible;

        fn recognize(&mut self, image: &GrayImage) -> Result<String, Self::Error> {
            assert!(image.width() > 40);
            Ok(self.0.to_string())
        }
    }

    fn right() -> DirectionVector {
        DirectionVector::normalized(Vector2::new(1.0, 0.0), 0.0).unwrap()
    }

    fn page() -> RasterPage {
        RasterPage::new(RgbImage::new(2000, 1200))
    }

    fn bubble() -> VerifiedBubble {
        VerifiedBubble {
            center: [300, 600],
            radius: 16,
            score: 0.0,
        }
    }

    #[test]
    fn stops_at_first_match() {
        let mut v = WidthValidator {
            match_width: 500,
            seen: Vec::new(),
        };
        let cfg = CaptureConfig::default();
        let out = validate_progressively(&page(), &bubble(), 4, &right(), Some("10"), &cfg, &mut v)
            .unwrap()
            .unwrap();
        assert_eq!(v.seen, vec![(128, 128), (256, 128), (512, 256)]);
        assert!(out.validation.matches);
        assert_eq!(out.capture_size, "512x256");
    }

    #[test]
    fn keeps_last_answer_without_match() {
        let mut v = WidthValidator {
            match_width: 5000,
            seen: Vec::new(),
        };
        let cfg = CaptureConfig::default();
        let out = validate_progressively(&page(), &bubble(), 4, &right(), Some("10"), &cfg, &mut v)
            .unwrap()
            .unwrap();
        assert_eq!(v.seen.len(), 4);
        assert!(!out.validation.matches);
        assert_eq!(out.capture_size, "1024x512");
    }

    #[test]
    fn discovery_uses_smallest_step_and_prefixes_notes() {
        let mut v = WidthValidator {
            match_width: 0,
            seen: Vec::new(),
        };
        let cfg = CaptureConfig::default();
        let out = validate_progressively(&page(), &bubble(), 4, &right(), None, &cfg, &mut v)
            .unwrap()
            .unwrap();
        assert_eq!(v.seen, vec![(128, 128)]);
        assert_eq!(out.validation.notes, "[Table OCR miss] found");
        assert_eq!(out.capture_size, "128x128");
    }

    #[test]
    fn clipped_first_box_falls_through_to_pushed_step() {
        let mut v = WidthValidator {
            match_width: 0,
            seen: Vec::new(),
        };
        let cfg = CaptureConfig::default();
        let edge = VerifiedBubble {
            center: [1990, 600],
            radius: 16,
            score: 0.0,
        };
        // 128x128 lies past the right edge; 256x128 is pushed to start at
        // x = 1991 and keeps a 9 px sliver.
        let out = validate_progressively(&page(), &edge, 1, &right(), Some("10"), &cfg, &mut v)
            .unwrap()
            .unwrap();
        assert_eq!(v.seen, vec![(9, 128)]);
        assert_eq!(out.capture_size, "256x128");
    }

    #[test]
    fn boxes_off_the_page_are_skipped() {
        let mut v = WidthValidator {
            match_width: 0,
            seen: Vec::new(),
        };
        let cfg = CaptureConfig::default();
        let edge = VerifiedBubble {
            center: [300, 1197],
            radius: 16,
            score: 0.0,
        };
        let down = DirectionVector::normalized(Vector2::new(0.0, 1.0), 0.0).unwrap();
        // Pushed boxes start at y = 1198, leaving 2 px of page.
        for step in cfg.steps {
            let b = place_capture_box(edge.center, edge.radius, &down, step, [2000, 1200], &cfg);
            assert!(b.rect.height < MIN_CAPTURE_SIDE_PX, "{:?}", b.rect);
        }
        let out =
            validate_progressively(&page(), &edge, 1, &down, Some("10"), &cfg, &mut v).unwrap();
        assert!(out.is_none());
        let out = validate_progressively(&page(), &edge, 1, &down, None, &cfg, &mut v).unwrap();
        assert!(out.is_none());
        assert!(v.seen.is_empty());
    }

    #[test]
    fn bubble_number_is_read_through_recognizer() {
        let img = draw_bubble_page(80, 80, &[SyntheticBubble::new([40, 40], 16, 0.0)]);
        let page = RasterPage::new(img);
        let b = VerifiedBubble {
            center: [40, 40],
            radius: 16,
            score: 0.0,
        };
        let cfg = OcrPrepConfig::default();
        let band = HueBand::default();
        let n = read_bubble_number(&page, &b, &band, &cfg, &mut FixedText("#4O")).unwrap();
        assert_eq!(n, Some(40));
        let n = read_bubble_number(&page, &b, &band, &cfg, &mut FixedText("--")).unwrap();
        assert_eq!(n, None);
    }
}
