//! Merging table values with capture validations into per-bubble records.

use super::matcher::confidence_score;
use super::Validation;

/// Confidence below this (and above zero) counts as a page warning.
pub const WARNING_CONFIDENCE: f64 = 0.8;

const LABEL_MAX_CHARS: usize = 20;

/// Where a merged dimension value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionSource {
    /// Table value with a capture validation (matching or not).
    TableValidated,
    TableOnly,
    /// Only the validator saw a value (table entry missing).
    LlmOnly,
    None,
}

/// Validation result tagged with the capture step that produced it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepValidation {
    pub validation: Validation,
    /// `"WxH"` label of the capture step.
    pub capture_size: String,
}

/// Final per-bubble dimension record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DimensionMatch {
    pub balloon_no: u32,
    /// Table value, else the observed value.
    pub dimension: Option<String>,
    pub source: DimensionSource,
    pub table_value: Option<String>,
    pub observed: Option<String>,
    pub matches: Option<bool>,
    pub validator_confidence: f64,
    pub notes: Option<String>,
    pub has_conflict: bool,
    pub confidence: f64,
    pub capture_size: Option<String>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Combine the table value and the capture validation for one balloon.
///
/// Confidence is the validator's on a confirmed match, the fuzzy score of
/// table against observed text when both exist otherwise, the validator's
/// when only a validation exists, and zero with nothing to go on.
///
/// Empty strings, whether table values or observed text, count as absent:
/// `Some("")` with no validation yields [`DimensionSource::None`], not
/// [`DimensionSource::TableOnly`].
pub fn merge_dimension(
    balloon_no: u32,
    table_value: Option<&str>,
    validation: Option<&StepValidation>,
) -> DimensionMatch {
    let table = non_empty(table_value);
    let v = validation.map(|s| &s.validation);
    let observed = non_empty(v.and_then(|v| v.observed.as_deref()));
    let validator_confidence = v.map_or(0.0, |v| v.confidence);

    let confidence = match (v, table, observed) {
        (Some(v), _, _) if v.matches => v.confidence,
        (_, Some(t), Some(o)) => confidence_score(t, o),
        (Some(v), _, _) => v.confidence,
        _ => 0.0,
    };
    let source = match (table.is_some(), v.is_some()) {
        (true, true) => DimensionSource::TableValidated,
        (true, false) => DimensionSource::TableOnly,
        (false, true) => DimensionSource::LlmOnly,
        (false, false) => DimensionSource::None,
    };

    DimensionMatch {
        balloon_no,
        dimension: table.or(observed).map(str::to_string),
        source,
        table_value: table.map(str::to_string),
        observed: observed.map(str::to_string),
        matches: v.map(|v| v.matches),
        validator_confidence: round4(validator_confidence),
        notes: v.map(|v| v.notes.clone()),
        has_conflict: v.is_some_and(|v| !v.matches),
        confidence: round4(confidence),
        capture_size: validation.map(|s| s.capture_size.clone()),
    }
}

/// Page-level counters over merged records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageSummary {
    pub total: usize,
    /// Records with a dimension value.
    pub matched: usize,
    pub unmatched: usize,
    /// Records with `0 < confidence < 0.8`.
    pub warnings: usize,
}

impl PageSummary {
    pub fn from_matches(total_bubbles: usize, matches: &[DimensionMatch]) -> Self {
        let matched = matches.iter().filter(|m| m.dimension.is_some()).count();
        let warnings = matches
            .iter()
            .filter(|m| m.confidence > 0.0 && m.confidence < WARNING_CONFIDENCE)
            .count();
        Self {
            total: total_bubbles,
            matched,
            unmatched: total_bubbles.saturating_sub(matched),
            warnings,
        }
    }
}

/// Overlay color class of one bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Conflict,
    Missing,
}

impl MatchStatus {
    pub fn of(record: Option<&DimensionMatch>) -> Self {
        match record {
            Some(m) if m.dimension.is_some() && m.has_conflict => Self::Conflict,
            Some(m) if m.dimension.is_some() => Self::Matched,
            _ => Self::Missing,
        }
    }

    /// RGB color used for this status.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::Matched => [0, 200, 0],
            Self::Conflict => [255, 200, 0],
            Self::Missing => [255, 0, 0],
        }
    }
}

/// Geometry and status handed to an overlay renderer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverlayMarker {
    pub center: [i32; 2],
    pub radius: i32,
    pub number: u32,
    pub status: MatchStatus,
    pub rgb: [u8; 3],
    pub label: Option<String>,
}

impl OverlayMarker {
    pub fn new(center: [i32; 2], radius: i32, number: u32, record: Option<&DimensionMatch>) -> Self {
        let status = MatchStatus::of(record);
        Self {
            center,
            radius,
            number,
            status,
            rgb: status.rgb(),
            label: record
                .and_then(|m| m.dimension.as_deref())
                .map(truncate_label),
        }
    }
}

fn truncate_label(s: &str) -> String {
    if s.chars().count() > LABEL_MAX_CHARS {
        let mut out: String = s.chars().take(LABEL_MAX_CHARS).collect();
        out.push('…');
        out
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(observed: Option<&str>, matches: bool, confidence: f64) -> StepValidation {
        StepValidation {
            validation: Validation {
                observed: observed.map(str::to_string),
                matches,
                confidence,
                notes: "seen".to_string(),
            },
            capture_size: "256x128".to_string(),
        }
    }

    #[test]
    fn confirmed_match_uses_validator_confidence() {
        let v = step(Some("Ø5.5"), true, 0.93);
        let m = merge_dimension(7, Some("Ø5.5"), Some(&v));
        assert_eq!(m.source, DimensionSource::TableValidated);
        assert_eq!(m.dimension.as_deref(), Some("Ø5.5"));
        assert!(!m.has_conflict);
        assert_eq!(m.confidence, 0.93);
        assert_eq!(m.capture_size.as_deref(), Some("256x128"));
    }

    #[test]
    fn conflict_uses_fuzzy_score() {
        let v = step(Some("12.55"), false, 0.9);
        let m = merge_dimension(3, Some("12.50"), Some(&v));
        assert!(m.has_conflict);
        assert_eq!(m.confidence, 0.8);
        assert_eq!(m.dimension.as_deref(), Some("12.50"));
        assert_eq!(m.observed.as_deref(), Some("12.55"));
    }

    #[test]
    fn validator_only_and_table_only() {
        let v = step(Some("R2"), false, 0.6);
        let m = merge_dimension(9, None, Some(&v));
        assert_eq!(m.source, DimensionSource::LlmOnly);
        assert_eq!(m.dimension.as_deref(), Some("R2"));
        assert_eq!(m.confidence, 0.6);

        let m = merge_dimension(9, Some("R2"), None);
        assert_eq!(m.source, DimensionSource::TableOnly);
        assert_eq!(m.confidence, 0.0);
        assert_eq!(m.matches, None);

        let m = merge_dimension(9, Some(""), None);
        assert_eq!(m.source, DimensionSource::None);
        assert_eq!(m.dimension, None);
    }

    #[test]
    fn summary_counts_warnings_in_open_interval() {
        let a = merge_dimension(1, Some("10"), Some(&step(Some("10"), true, 0.95)));
        let b = merge_dimension(2, Some("12.50"), Some(&step(Some("12.55"), false, 0.5)));
        let c = merge_dimension(3, None, None);
        let s = PageSummary::from_matches(4, &[a, b, c]);
        assert_eq!(
            s,
            PageSummary {
                total: 4,
                matched: 2,
                unmatched: 2,
                warnings: 0,
            }
        );
        let d = merge_dimension(4, Some("Ø10"), Some(&step(Some("Ø12"), false, 0.5)));
        assert_eq!(PageSummary::from_matches(1, &[d]).warnings, 1);
    }

    #[test]
    fn overlay_status_and_label() {
        let long = "2X Ø5.5 THRU ALL ⌴ Ø9 ↧ 5.0";
        let ok = merge_dimension(1, Some(long), Some(&step(Some(long), true, 0.9)));
        let marker = OverlayMarker::new([10, 20], 16, 1, Some(&ok));
        assert_eq!(marker.status, MatchStatus::Matched);
        assert_eq!(marker.rgb, [0, 200, 0]);
        let label = marker.label.unwrap();
        assert_eq!(label.chars().count(), 21);
        assert!(label.ends_with('…'));

        let bad = merge_dimension(2, Some("5"), Some(&step(Some("6"), false, 0.4)));
        assert_eq!(MatchStatus::of(Some(&bad)), MatchStatus::Conflict);
        assert_eq!(MatchStatus::of(None).rgb(), [255, 0, 0]);
    }
}
