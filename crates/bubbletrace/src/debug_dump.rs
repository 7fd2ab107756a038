//! Versioned debug dump of one page run.
//!
//! Records every raw candidate with its source pass, the gate that dropped
//! each rejected candidate (as counts), the gate metrics of survivors and
//! the final deduplicated list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detector::{
    BubbleTraceConfig, Candidate, CandidateSource, GateMetrics, GateRejection, VerifiedBubble,
};
use crate::pipeline::DetectionStages;

pub const DEBUG_SCHEMA_V1: &str = "bubbletrace.debug.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugDump {
    pub schema_version: String,
    pub image_size: [u32; 2],
    pub config: BubbleTraceConfig,
    pub candidates: Vec<Candidate>,
    /// Raw candidate count per source pass.
    pub candidates_by_source: BTreeMap<CandidateSource, usize>,
    pub rejections: BTreeMap<GateRejection, usize>,
    /// Survivors of every gate, before score dedup.
    pub passed: Vec<PassedCandidate>,
    /// Final bubbles in reading order.
    pub bubbles: Vec<VerifiedBubble>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassedCandidate {
    pub candidate_index: usize,
    pub bubble: VerifiedBubble,
    pub metrics: GateMetrics,
}

impl DebugDump {
    pub(crate) fn new(
        image_size: [u32; 2],
        config: &BubbleTraceConfig,
        stages: &DetectionStages,
    ) -> Self {
        let candidates = stages.candidates.as_slice().to_vec();
        let mut candidates_by_source = BTreeMap::new();
        for c in &candidates {
            *candidates_by_source.entry(c.source).or_insert(0) += 1;
        }
        let passed = stages
            .verification
            .passed
            .iter()
            .map(|(id, bubble, metrics)| PassedCandidate {
                candidate_index: id.0,
                bubble: *bubble,
                metrics: *metrics,
            })
            .collect();
        Self {
            schema_version: DEBUG_SCHEMA_V1.to_string(),
            image_size,
            config: config.clone(),
            candidates,
            candidates_by_source,
            rejections: stages.verification.rejections.clone(),
            passed,
            bubbles: stages.bubbles.clone(),
        }
    }
}
