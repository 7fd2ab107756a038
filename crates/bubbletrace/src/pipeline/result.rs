use crate::capture::CaptureBox;
use crate::detector::VerifiedBubble;
use crate::geometry::{BoundingBox, DirectionVector};
use crate::leader::{DirectionSource, NoDirectionReason, TraceOutcome};

/// A verified bubble with its reading-order number, boxes and direction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExpandedBubble {
    /// 1-based reading-order number.
    pub bubble_number: u32,
    pub bubble: VerifiedBubble,
    /// Square box around the bubble circle.
    pub bubble_box: BoundingBox,
    /// Union of `bubble_box` and the smallest capture box.
    pub bounding_box: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<DirectionVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_source: Option<DirectionSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_direction: Option<NoDirectionReason>,
    /// Smallest capture box along the direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_box: Option<CaptureBox>,
}

impl ExpandedBubble {
    pub(crate) fn new(
        bubble_number: u32,
        bubble: VerifiedBubble,
        bubble_box: BoundingBox,
        outcome: TraceOutcome,
        capture_box: Option<CaptureBox>,
    ) -> Self {
        let bounding_box = match &capture_box {
            Some(c) if !c.rect.is_empty() => bubble_box.union(&c.rect),
            _ => bubble_box,
        };
        let (direction, direction_source, no_direction) = match outcome {
            TraceOutcome::Direction { vector, source } => (Some(vector), Some(source), None),
            TraceOutcome::NoDirection(reason) => (None, None, Some(reason)),
        };
        Self {
            bubble_number,
            bubble,
            bubble_box,
            bounding_box,
            direction,
            direction_source,
            no_direction,
            capture_box,
        }
    }
}

/// Everything found on one page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PageResult {
    /// Image dimensions [width, height].
    pub image_size: [u32; 2],
    /// Raw candidates before verification.
    pub candidate_count: usize,
    /// Bubbles in reading order.
    pub bubbles: Vec<ExpandedBubble>,
}

impl PageResult {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image_size: [width, height],
            candidate_count: 0,
            bubbles: Vec::new(),
        }
    }

    /// Bubble by its 1-based number.
    pub fn bubble(&self, number: u32) -> Option<&ExpandedBubble> {
        self.bubbles.iter().find(|b| b.bubble_number == number)
    }

    pub fn with_direction_count(&self) -> usize {
        self.bubbles.iter().filter(|b| b.direction.is_some()).count()
    }
}
