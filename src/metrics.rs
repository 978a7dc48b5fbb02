//! Read-only diagnostics over a built session. Never feeds back into ranking.

use std::collections::HashMap;

/// Shannon entropy (natural log) of the flattened tag multiset
pub fn entropy(tag_window: &[Vec<String>]) -> f64 {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for tags in tag_window {
        for t in tags {
            *counts.entry(t.as_str()).or_insert(0) += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }

    counts
        .values()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * (p + 1e-12).ln()
        })
        .sum()
}

/// Fraction of items (with a known creator) owned by the most frequent creator
pub fn creator_dominance(creators: &[Option<String>]) -> f64 {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut known = 0usize;
    for c in creators.iter().flatten() {
        if c.is_empty() {
            continue;
        }
        *counts.entry(c.as_str()).or_insert(0) += 1;
        known += 1;
    }
    match counts.values().max() {
        Some(&top) if known > 0 => top as f64 / known as f64,
        _ => 0.0,
    }
}
