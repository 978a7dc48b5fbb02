//! Scoring functions for session candidates

use crate::types::ScoreWeights;
use std::collections::{HashMap, HashSet};

const EPS: f64 = 1e-9;

/// Diminishing-returns transform for raw related-link frequency
pub fn sat_log1p(x: f64) -> f64 {
    x.max(0.0).ln_1p()
}

/// Min-max scale a batch into [0, 1]
pub fn normalize01(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return vec![];
    }

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }

    if max - min < EPS {
        // No spread; every value is equally (un)informative
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Share of positive taste mass carried by the candidate's tags
pub fn sim_from_taste(tags: &[String], taste: &HashMap<String, f64>) -> f64 {
    if tags.is_empty() || taste.is_empty() {
        return 0.0;
    }

    let total: f64 = taste.values().map(|w| w.max(0.0)).sum();
    if total <= EPS {
        return 0.0;
    }

    let matched: f64 = tags
        .iter()
        .map(|t| taste.get(t).copied().unwrap_or(0.0).max(0.0))
        .sum();
    matched / total
}

/// Max Jaccard overlap between the candidate's tags and any recently shown tag set
pub fn diversity_penalty(tags: &[String], recent_tag_sets: &[HashSet<String>]) -> f64 {
    if tags.is_empty() || recent_tag_sets.is_empty() {
        return 0.0;
    }

    let cand: HashSet<&str> = tags.iter().map(String::as_str).collect();
    let mut best = 0.0f64;
    for recent in recent_tag_sets {
        if recent.is_empty() {
            continue;
        }
        let inter = recent.iter().filter(|t| cand.contains(t.as_str())).count();
        let union = cand.len() + recent.len() - inter;
        if union == 0 {
            continue;
        }
        best = best.max(inter as f64 / union as f64);
    }
    best
}

/// Decays as a video gets visited more often
pub fn novelty_bonus(seen_count: u64) -> f64 {
    1.0 / (1.0 + seen_count as f64)
}

/// Linear combination of the score components
pub fn combined_score(weights: &ScoreWeights, freq_norm: f64, sim: f64, div: f64, novelty: f64) -> f64 {
    weights.related * freq_norm + weights.sim * sim - weights.div * div + weights.novelty * novelty
}
