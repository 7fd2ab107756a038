//! bubbletrace: bubble callout detection and leader-direction tracing for
//! scanned engineering drawings.
//!
//! The page pipeline stages are:
//!
//! 1. **Layers** – hue-band ring mask, closed mask and grayscale.
//! 2. **Candidates** – Hough and contour passes over the color mask and the
//!    blurred / thresholded grayscale, merged with proximity dedup.
//! 3. **Verification** – perimeter color, interior brightness, ink density,
//!    arc continuity and pointer gates, scored and deduplicated, then
//!    numbered in row-banded reading order.
//! 4. **Leader tracing** – per-bubble flood fill with neighbors erased,
//!    body removal and weighted Harris corner vote.
//! 5. **Capture** – progressively larger boxes on a fixed anchor along the
//!    leader direction.
//!
//! The [`validation`] module hands bubble crops and capture crops to
//! external text recognizers and dimension validators and merges their
//! answers.

mod api;
mod capture;
pub mod debug_dump;
mod detector;
mod geometry;
mod leader;
mod mask;
mod page;
mod pipeline;
mod shape;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::BubbleTracer;
pub use capture::{capture_sequence, place_capture_box, CaptureBox, CaptureConfig, CaptureStep};
pub use debug_dump::DebugDump;
pub use detector::{
    BubbleTraceConfig, Candidate, CandidateConfig, CandidateSource, GateMetrics, GateRejection,
    ScoreWeights, VerifiedBubble, VerifyConfig,
};
pub use geometry::{BoundingBox, DirectionVector};
pub use leader::{trace_bubble, DirectionSource, NoDirectionReason, TraceConfig, TraceOutcome};
pub use mask::{hue_band_mask, HueBand};
pub use page::{PageLayers, RasterPage};
pub use pipeline::{ExpandedBubble, PageResult};
