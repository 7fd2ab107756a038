//! Fuzzy comparison of dimension strings.

/// Scores at or above this count as the same dimension.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

/// Similarity in `[0, 1]`: 1.0 for equal strings after whitespace collapse
/// and upper-casing, otherwise `1 - levenshtein / max_len` rounded to four
/// decimals. Lengths count characters, not bytes.
pub fn confidence_score(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na == nb {
        return 1.0;
    }
    let max_len = na.chars().count().max(nb.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(&na, &nb);
    let raw = 1.0 - distance as f64 / max_len as f64;
    (raw * 10_000.0).round() / 10_000.0
}

pub fn are_similar(a: &str, b: &str) -> bool {
    confidence_score(a, b) >= SIMILARITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_and_case_are_ignored() {
        assert_eq!(confidence_score("  2x  Ø5.5 thru ", "2X Ø5.5 THRU"), 1.0);
        assert!(are_similar("r0.5", "R0.5"));
    }

    #[test]
    fn partial_matches_score_by_edit_distance() {
        // One substitution in five characters.
        assert_eq!(confidence_score("12.50", "12.55"), 0.8);
        assert_eq!(confidence_score("Ø10", "Ø12"), 0.6667);
        assert!(!are_similar("Ø10", "Ø12"));
        assert_eq!(confidence_score("ABC", "XYZ"), 0.0);
    }

    #[test]
    fn empty_against_text_is_zero() {
        assert_eq!(confidence_score("", "   "), 1.0);
        assert_eq!(confidence_score("", "45"), 0.0);
    }
}
