//! Bubble detection building blocks: candidate generation, gate
//! verification and score-ordered deduplication.
//!
//! The `pipeline` module decides the call order; this module only provides
//! the stages and their configuration.

pub(crate) mod candidates;
pub(crate) mod config;
pub(crate) mod dedup;
pub(crate) mod verify;

pub use candidates::{
    generate_candidates, BlurLevel, Candidate, CandidateArena, CandidateConfig, CandidateId,
    CandidateSource, ColorContourGate, GrayContourConfig, GrayHoughPass,
};
pub use config::BubbleTraceConfig;
pub use dedup::{dedup_by_score, sort_reading_order};
pub use verify::{
    verify_candidate, verify_candidates, GateMetrics, GateRejection, ScoreWeights, VerifiedBubble,
    Verification, VerifyConfig,
};
