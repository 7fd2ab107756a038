use std::path::Path;

use super::candidates::CandidateConfig;
use super::verify::VerifyConfig;
use crate::capture::CaptureConfig;
use crate::leader::TraceConfig;
use crate::mask::HueBand;
use crate::validation::OcrPrepConfig;

/// Complete configuration of a page run.
///
/// Every section is `#[serde(default)]`, so a JSON file only needs the
/// fields it overrides.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BubbleTraceConfig {
    /// Ring color band.
    pub hue: HueBand,
    /// Hough and contour passes of the candidate generator.
    pub candidates: CandidateConfig,
    /// Gate thresholds, dedup separation and reading-order band.
    pub verify: VerifyConfig,
    /// Leader direction tracing.
    pub trace: TraceConfig,
    /// Capture box steps and anchor margin.
    pub capture: CaptureConfig,
    /// Bubble-number crop preparation.
    pub ocr: OcrPrepConfig,
}

impl BubbleTraceConfig {
    /// Load a (partial) JSON config and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(data)?;
        config.validate().map_err(Into::into).map(|()| config)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.hue.validate()?;
        self.candidates.validate()?;
        self.verify.validate()?;
        self.trace.validate()?;
        self.capture.validate()?;
        self.ocr.validate()?;
        Ok(())
    }
}
