//! Leader direction tracing.
//!
//! Each bubble is traced by a small state machine:
//!
//! ```text
//! SeedSearch ──no seed──────────────────────────────▶ Done(NoDirection)
//!     │
//! FloodFill ─▶ EraseBody ──too few tip pixels───────▶ Done(NoDirection)
//!                 │
//!           CornerAnalysis ──no response / too weak─▶ CentroidFallback
//!                 │                                        │
//!             Normalize ◀──────────────────────────────────┘
//!                 │ ──shorter than min length───────▶ Done(NoDirection)
//!                 ▼
//!          Done(Direction)
//! ```
//!
//! The tracer works on the raw hue mask. Before the flood fill every other
//! known bubble is erased from the search window so a touching neighbor's
//! ring can never join the component.

mod component;
mod direction;

use image::GrayImage;
use nalgebra::Vector2;

pub use component::TraceWindow;
pub use direction::{centroid_offset, corner_vote, CornerVote};

use crate::detector::VerifiedBubble;
use crate::geometry::DirectionVector;
use crate::mask::count_nonzero;

/// Leader tracing parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Search window half-size as a multiple of the bubble radius.
    pub search_radius_factor: i32,
    pub min_roi_side_px: i32,
    /// Neighbor disks are erased with radius `r + neighbor_inflate_px`.
    pub neighbor_inflate_px: i32,
    /// Neighbors whose center lies within `neighbor_reach_factor · r` of the
    /// window are erased.
    pub neighbor_reach_factor: i32,
    pub seed_angle_step_deg: u32,
    /// Radius offsets tried, in order, when the nominal ring has no seed.
    pub seed_radius_offsets: Vec<i32>,
    /// Body disk erased from the component is `r + body_erase_margin_px`.
    pub body_erase_margin_px: i32,
    pub min_tip_pixels: usize,
    pub harris_block_size: u32,
    pub harris_k: f32,
    /// Corner threshold as a fraction of the peak response.
    pub corner_threshold_frac: f32,
    /// Accepted corner distance band, in bubble radii.
    pub min_corner_dist_frac: f64,
    pub max_corner_dist_frac: f64,
    /// Proximity weight falls to its floor at this many radii from the ring.
    pub proximity_span_frac: f64,
    pub min_proximity_weight: f64,
    pub min_total_weight: f64,
    /// Shorter accumulated vectors give no direction (pixels).
    pub min_vector_length: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            search_radius_factor: 3,
            min_roi_side_px: 10,
            neighbor_inflate_px: 1,
            neighbor_reach_factor: 2,
            seed_angle_step_deg: 5,
            seed_radius_offsets: vec![-1, 1, -2, 2],
            body_erase_margin_px: 2,
            min_tip_pixels: 3,
            harris_block_size: 3,
            harris_k: 0.04,
            corner_threshold_frac: 0.01,
            min_corner_dist_frac: 0.3,
            max_corner_dist_frac: 3.0,
            proximity_span_frac: 1.5,
            min_proximity_weight: 0.1,
            min_total_weight: 1e-6,
            min_vector_length: 1.0,
        }
    }
}

impl TraceConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.search_radius_factor <= 0 {
            return Err("search radius factor must be positive".to_string());
        }
        if self.min_corner_dist_frac > self.max_corner_dist_frac {
            return Err("corner distance band is not ordered".to_string());
        }
        if self.seed_angle_step_deg == 0 {
            return Err("seed angle step must be positive".to_string());
        }
        Ok(())
    }
}

/// How the final vector was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSource {
    Corners,
    Centroid,
}

/// Why a bubble has no direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDirectionReason {
    /// Search window clamped below its minimum size.
    DegenerateRoi,
    /// No mask pixel found on or near the nominal ring.
    NoSeed,
    /// Too few pixels left after erasing the body.
    TooFewTipPixels,
    /// Accumulated vector shorter than the minimum length.
    DegenerateVector,
}

/// Terminal outcome of tracing one bubble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceOutcome {
    Direction {
        vector: DirectionVector,
        source: DirectionSource,
    },
    NoDirection(NoDirectionReason),
}

impl TraceOutcome {
    pub fn direction(&self) -> Option<DirectionVector> {
        match self {
            TraceOutcome::Direction { vector, .. } => Some(*vector),
            TraceOutcome::NoDirection(_) => None,
        }
    }
}

/// Tracer state.
#[derive(Debug, Clone)]
pub enum TraceState {
    SeedSearch,
    FloodFill { seed: (u32, u32) },
    EraseBody { component: GrayImage },
    CornerAnalysis { tip: GrayImage },
    CentroidFallback { tip: GrayImage },
    Normalize {
        vector: Vector2<f64>,
        source: DirectionSource,
    },
    Done(TraceOutcome),
}

impl TraceState {
    /// Advance one transition inside `window`.
    pub fn step(self, window: &TraceWindow, cfg: &TraceConfig) -> TraceState {
        match self {
            TraceState::SeedSearch => match window.find_seed(cfg) {
                Some(seed) => TraceState::FloodFill { seed },
                None => TraceState::Done(TraceOutcome::NoDirection(NoDirectionReason::NoSeed)),
            },
            TraceState::FloodFill { seed } => TraceState::EraseBody {
                component: window.component_at(seed),
            },
            TraceState::EraseBody { mut component } => {
                window.erase_body(&mut component, cfg);
                if count_nonzero(&component) < cfg.min_tip_pixels {
                    TraceState::Done(TraceOutcome::NoDirection(
                        NoDirectionReason::TooFewTipPixels,
                    ))
                } else {
                    TraceState::CornerAnalysis { tip: component }
                }
            }
            TraceState::CornerAnalysis { tip } => {
                match corner_vote(&tip, window.center, window.radius, cfg) {
                    CornerVote::Vector(vector) => TraceState::Normalize {
                        vector,
                        source: DirectionSource::Corners,
                    },
                    CornerVote::NoResponse | CornerVote::TooWeak => {
                        TraceState::CentroidFallback { tip }
                    }
                }
            }
            TraceState::CentroidFallback { tip } => match centroid_offset(&tip, window.center) {
                Some(vector) => TraceState::Normalize {
                    vector,
                    source: DirectionSource::Centroid,
                },
                None => TraceState::Done(TraceOutcome::NoDirection(
                    NoDirectionReason::TooFewTipPixels,
                )),
            },
            TraceState::Normalize { vector, source } => {
                match DirectionVector::normalized(vector, cfg.min_vector_length) {
                    Some(vector) => TraceState::Done(TraceOutcome::Direction { vector, source }),
                    None => TraceState::Done(TraceOutcome::NoDirection(
                        NoDirectionReason::DegenerateVector,
                    )),
                }
            }
            done @ TraceState::Done(_) => done,
        }
    }
}

/// Trace the pointer of `bubbles[index]`, excluding every other bubble.
pub fn trace_bubble(
    mask: &GrayImage,
    bubbles: &[VerifiedBubble],
    index: usize,
    cfg: &TraceConfig,
) -> TraceOutcome {
    let Some(window) = TraceWindow::cut(mask, bubbles, index, cfg) else {
        return TraceOutcome::NoDirection(NoDirectionReason::DegenerateRoi);
    };
    let mut state = TraceState::SeedSearch;
    loop {
        state = state.step(&window, cfg);
        if let TraceState::Done(outcome) = state {
            tracing::trace!("bubble {} at {:?}: {:?}", index, bubbles[index].center, outcome);
            return outcome;
        }
    }
}

/// Trace every bubble of a page in order.
pub fn trace_all(
    mask: &GrayImage,
    bubbles: &[VerifiedBubble],
    cfg: &TraceConfig,
) -> Vec<TraceOutcome> {
    (0..bubbles.len())
        .map(|i| trace_bubble(mask, bubbles, i, cfg))
        .collect()
}
