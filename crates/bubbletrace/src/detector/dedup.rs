use super::verify::VerifiedBubble;
use crate::geometry::distance_i;

fn sort_by_score(bubbles: Vec<VerifiedBubble>) -> Vec<VerifiedBubble> {
    let mut bubbles = bubbles;
    bubbles.sort_by(|a, b| b.score.total_cmp(&a.score));
    bubbles
}

fn dedup_by_proximity(bubbles: Vec<VerifiedBubble>, min_separation: f64) -> Vec<VerifiedBubble> {
    let mut keep = vec![true; bubbles.len()];

    for i in 0..bubbles.len() {
        if !keep[i] {
            continue;
        }

        for j in (i + 1)..bubbles.len() {
            if !keep[j] {
                continue;
            }
            if distance_i(bubbles[i].center, bubbles[j].center) < min_separation {
                keep[j] = false;
            }
        }
    }

    bubbles
        .into_iter()
        .enumerate()
        .filter_map(|(index, bubble)| keep[index].then_some(bubble))
        .collect()
}

/// Remove duplicate detections: keep the highest-scoring bubble and drop
/// every lower-scoring one closer than `min_separation`.
pub fn dedup_by_score(bubbles: Vec<VerifiedBubble>, min_separation: f64) -> Vec<VerifiedBubble> {
    let bubbles = sort_by_score(bubbles);
    dedup_by_proximity(bubbles, min_separation)
}

/// Reading order: row band `y div band` top to bottom, then `x` left to
/// right. The sort is stable, so exact ties keep their score order.
pub fn sort_reading_order(bubbles: &mut [VerifiedBubble], band: i32) {
    let band = band.max(1);
    bubbles.sort_by_key(|b| (b.center[1].div_euclid(band), b.center[0]));
}
