use super::result::{ExpandedBubble, PageResult};
use crate::capture::place_capture_box;
use crate::debug_dump::DebugDump;
use crate::detector::{
    dedup_by_score, generate_candidates, sort_reading_order, verify_candidates, BubbleTraceConfig,
    CandidateArena, VerifiedBubble, Verification,
};
use crate::geometry::BoundingBox;
use crate::leader::trace_all;
use crate::page::{PageLayers, RasterPage};

/// Intermediate products of the detection half of the pipeline.
pub(crate) struct DetectionStages {
    pub(crate) candidates: CandidateArena,
    pub(crate) verification: Verification,
    /// Deduplicated survivors in reading order.
    pub(crate) bubbles: Vec<VerifiedBubble>,
}

fn run_detection(layers: &PageLayers, config: &BubbleTraceConfig) -> DetectionStages {
    let candidates = generate_candidates(layers, &config.candidates);
    let verification = verify_candidates(&candidates, layers, &config.verify);
    let passed = verification.passed.iter().map(|(_, b, _)| *b).collect();
    let mut bubbles = dedup_by_score(passed, config.verify.min_separation_px);
    sort_reading_order(&mut bubbles, config.verify.row_band_px);
    DetectionStages {
        candidates,
        verification,
        bubbles,
    }
}

fn expand(
    layers: &PageLayers,
    bubbles: &[VerifiedBubble],
    config: &BubbleTraceConfig,
) -> Vec<ExpandedBubble> {
    let page_size = layers.size();
    let outcomes = trace_all(&layers.hue_mask, bubbles, &config.trace);
    let first_step = config.capture.steps[0];
    bubbles
        .iter()
        .zip(outcomes)
        .enumerate()
        .map(|(i, (bubble, outcome))| {
            let bubble_box = BoundingBox::around_circle(bubble.center, bubble.radius, page_size);
            let capture_box = outcome.direction().map(|dir| {
                place_capture_box(
                    bubble.center,
                    bubble.radius,
                    &dir,
                    first_step,
                    page_size,
                    &config.capture,
                )
            });
            ExpandedBubble::new(i as u32 + 1, *bubble, bubble_box, outcome, capture_box)
        })
        .collect()
}

fn run(page: &RasterPage, config: &BubbleTraceConfig) -> (PageResult, DetectionStages) {
    let layers = PageLayers::build(page, &config.hue);
    let stages = run_detection(&layers, config);
    let bubbles = expand(&layers, &stages.bubbles, config);

    let with_direction = bubbles.iter().filter(|b| b.direction.is_some()).count();
    tracing::info!(
        candidates = stages.candidates.len(),
        verified = bubbles.len(),
        with_direction,
        without_direction = bubbles.len() - with_direction,
        "page processed"
    );

    let result = PageResult {
        image_size: page.size(),
        candidate_count: stages.candidates.len(),
        bubbles,
    };
    (result, stages)
}

/// Verified bubbles in reading order, without leader tracing.
pub fn detect_bubbles(page: &RasterPage, config: &BubbleTraceConfig) -> Vec<VerifiedBubble> {
    let layers = PageLayers::build(page, &config.hue);
    run_detection(&layers, config).bubbles
}

/// Full page run: detection, tracing and smallest capture box per bubble.
pub fn process_page(page: &RasterPage, config: &BubbleTraceConfig) -> PageResult {
    run(page, config).0
}

/// [`process_page`] plus a dump of every candidate and gate decision.
pub fn process_page_with_debug(
    page: &RasterPage,
    config: &BubbleTraceConfig,
) -> (PageResult, DebugDump) {
    let (result, stages) = run(page, config);
    let dump = DebugDump::new(page.size(), config, &stages);
    (result, dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::distance_i;
    use crate::test_utils::{angle_between_deg, draw_bubble_page, SyntheticBubble};

    fn sample_bubbles() -> Vec<SyntheticBubble> {
        vec![
            SyntheticBubble::new([300, 100], 16, 0.0),
            SyntheticBubble::new([120, 90], 16, 180.0),
            SyntheticBubble::new([520, 110], 17, 90.0),
            SyntheticBubble::new([150, 330], 15, 270.0),
            SyntheticBubble::new([420, 320], 16, 135.0),
        ]
    }

    fn sample_page() -> RasterPage {
        RasterPage::new(draw_bubble_page(700, 480, &sample_bubbles()))
    }

    #[test]
    fn blank_page_gives_empty_result() {
        let page = RasterPage::new(draw_bubble_page(300, 200, &[]));
        let result = process_page(&page, &BubbleTraceConfig::default());
        assert!(result.bubbles.is_empty());
        assert_eq!(result.image_size, [300, 200]);
    }

    #[test]
    fn finds_every_bubble_in_reading_order() {
        let result = process_page(&sample_page(), &BubbleTraceConfig::default());
        let centers: Vec<[i32; 2]> = result.bubbles.iter().map(|b| b.bubble.center).collect();
        assert_eq!(result.bubbles.len(), 5, "{:?}", centers);

        // Row bands of 60 px: the first three share band 1, the last two band 5.
        let expected = [[120, 90], [300, 100], [520, 110], [150, 330], [420, 320]];
        for (b, want) in result.bubbles.iter().zip(expected) {
            assert!(distance_i(b.bubble.center, want) <= 4.0, "{:?} vs {:?}", b.bubble.center, want);
        }
        for (i, b) in result.bubbles.iter().enumerate() {
            assert_eq!(b.bubble_number, i as u32 + 1);
        }
    }

    #[test]
    fn directions_follow_pointers() {
        let result = process_page(&sample_page(), &BubbleTraceConfig::default());
        for sb in sample_bubbles() {
            let found = result
                .bubbles
                .iter()
                .find(|b| distance_i(b.bubble.center, sb.center) <= 4.0)
                .unwrap();
            let d = found.direction.unwrap();
            let [ux, uy] = sb.pointer_unit().unwrap();
            assert!(angle_between_deg([d.dx, d.dy], [ux, uy]) < 20.0);
            assert!((d.dx * d.dx + d.dy * d.dy - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn page_invariants_hold() {
        let page = sample_page();
        let cfg = BubbleTraceConfig::default();
        let result = process_page(&page, &cfg);
        let n = result.bubbles.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance_i(result.bubbles[i].bubble.center, result.bubbles[j].bubble.center);
                assert!(d >= cfg.verify.min_separation_px);
            }
        }
        let band = cfg.verify.row_band_px;
        let keys: Vec<_> = result
            .bubbles
            .iter()
            .map(|b| (b.bubble.center[1].div_euclid(band), b.bubble.center[0]))
            .collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        for b in &result.bubbles {
            assert!(b.bounding_box.lies_within(page.size()));
            if let Some(c) = &b.capture_box {
                assert!(c.rect.lies_within(page.size()));
                assert_eq!(c.step, cfg.capture.steps[0]);
            }
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let page = sample_page();
        let cfg = BubbleTraceConfig::default();
        let a = process_page(&page, &cfg);
        let b = process_page(&page, &cfg);
        assert_eq!(a.bubbles, b.bubbles);
        assert_eq!(a.candidate_count, b.candidate_count);
    }

    #[test]
    fn debug_dump_accounts_for_every_candidate() {
        let (result, dump) = process_page_with_debug(&sample_page(), &BubbleTraceConfig::default());
        let rejected: usize = dump.rejections.values().sum();
        assert_eq!(dump.candidates.len(), result.candidate_count);
        assert_eq!(dump.passed.len() + rejected, dump.candidates.len());
        assert_eq!(dump.bubbles.len(), result.bubbles.len());
    }

    #[test]
    fn detect_only_matches_full_run() {
        let page = sample_page();
        let cfg = BubbleTraceConfig::default();
        let verified = detect_bubbles(&page, &cfg);
        let full = process_page(&page, &cfg);
        let centers: Vec<_> = full.bubbles.iter().map(|b| b.bubble).collect();
        assert_eq!(verified, centers);
    }
}
