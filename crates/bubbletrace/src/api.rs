//! High-level API.
//!
//! [`BubbleTracer`] wraps a [`BubbleTraceConfig`]; create it once and run it
//! on many pages.

use std::path::Path;

use crate::capture::{capture_sequence, CaptureBox};
use crate::debug_dump::DebugDump;
use crate::detector::{BubbleTraceConfig, VerifiedBubble};
use crate::page::RasterPage;
use crate::pipeline::{self, PageResult};

/// Primary detection interface.
///
/// # Examples
///
/// ```no_run
/// use bubbletrace::{BubbleTracer, RasterPage};
///
/// let image = image::open("drawing.png").unwrap();
/// let page = RasterPage::from_dynamic(image);
/// let result = BubbleTracer::new().process(&page);
/// for b in &result.bubbles {
///     println!("#{} at {:?} -> {:?}", b.bubble_number, b.bubble.center, b.direction);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BubbleTracer {
    config: BubbleTraceConfig,
}

impl BubbleTracer {
    /// Tracer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracer with a caller-supplied configuration, validated first.
    pub fn with_config(config: BubbleTraceConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load a JSON config file and build a tracer from it.
    pub fn from_config_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = BubbleTraceConfig::from_json_file(path)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BubbleTraceConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    ///
    /// Edits are not re-checked; call [`BubbleTraceConfig::validate`] after
    /// changing gate or capture parameters.
    pub fn config_mut(&mut self) -> &mut BubbleTraceConfig {
        &mut self.config
    }

    /// Verified bubbles in reading order, without tracing.
    pub fn detect(&self, page: &RasterPage) -> Vec<VerifiedBubble> {
        pipeline::detect_bubbles(page, &self.config)
    }

    /// Detection, leader tracing and the smallest capture box per bubble.
    pub fn process(&self, page: &RasterPage) -> PageResult {
        pipeline::process_page(page, &self.config)
    }

    /// [`BubbleTracer::process`] plus a candidate/gate dump.
    pub fn process_with_debug(&self, page: &RasterPage) -> (PageResult, DebugDump) {
        pipeline::process_page_with_debug(page, &self.config)
    }

    /// All capture steps of bubble `number` in `result`, smallest first.
    ///
    /// `None` when the bubble does not exist or has no direction.
    pub fn capture_boxes(&self, result: &PageResult, number: u32) -> Option<[CaptureBox; 4]> {
        let b = result.bubble(number)?;
        let dir = b.direction?;
        Some(capture_sequence(
            b.bubble.center,
            b.bubble.radius,
            &dir,
            result.image_size,
            &self.config.capture,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_bubble_page, SyntheticBubble};

    #[test]
    fn blank_page_detects_nothing() {
        let tracer = BubbleTracer::new();
        let page = RasterPage::new(draw_bubble_page(200, 200, &[]));
        assert!(tracer.detect(&page).is_empty());
        assert!(tracer.capture_boxes(&tracer.process(&page), 1).is_none());
    }

    #[test]
    fn with_config_rejects_invalid_sections() {
        let mut cfg = BubbleTraceConfig::default();
        assert!(BubbleTracer::with_config(cfg.clone()).is_ok());
        cfg.verify.pointer_sectors = 0;
        let err = BubbleTracer::with_config(cfg).unwrap_err();
        assert!(err.contains("pointer sectors"), "{err}");
    }

    #[test]
    fn zero_pointer_sectors_after_construction_does_not_panic() {
        let mut tracer = BubbleTracer::new();
        tracer.config_mut().verify.pointer_sectors = 0;
        assert!(tracer.config().validate().is_err());
        let page = RasterPage::new(draw_bubble_page(
            200,
            200,
            &[SyntheticBubble::new([100, 100], 16, 0.0)],
        ));
        assert!(tracer.detect(&page).is_empty());
    }

    #[test]
    fn config_mut_changes_behavior() {
        let mut tracer = BubbleTracer::new();
        tracer.config_mut().verify.min_separation_px = 40.0;
        assert_eq!(tracer.config().verify.min_separation_px, 40.0);
    }

    #[test]
    fn capture_boxes_share_anchor() {
        let tracer = BubbleTracer::new();
        let page = RasterPage::new(draw_bubble_page(
            1600,
            900,
            &[SyntheticBubble::new([300, 450], 16, 0.0)],
        ));
        let result = tracer.process(&page);
        let boxes = tracer.capture_boxes(&result, 1).unwrap();
        assert_eq!(boxes[0], result.bubbles[0].capture_box.unwrap());
        for b in &boxes {
            assert!(b.rect.lies_within(result.image_size));
            assert!((b.anchor[0] - boxes[0].anchor[0]).abs() <= 1.0);
            assert!((b.anchor[1] - boxes[0].anchor[1]).abs() <= 1.0);
        }
        assert!(tracer.capture_boxes(&result, 2).is_none());
    }
}
