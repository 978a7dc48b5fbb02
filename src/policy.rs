//! Temperature-controlled softmax sampling over the top-M candidates

use crate::error::{RankError, Result};
use crate::types::Candidate;
use rand::Rng;

/// Floor for the temperature so logits stay finite
const MIN_TEMPERATURE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct ExplorationPolicy {
    pub temperature: f64,
    pub top_m: usize,
}

impl ExplorationPolicy {
    pub fn new(temperature: f64, top_m: usize) -> Self {
        Self { temperature, top_m }
    }

    /// Pick the next candidate. Callers must check for an empty pool first.
    pub fn sample<'a, R: Rng + ?Sized>(&self, candidates: &'a [Candidate], rng: &mut R) -> Result<&'a Candidate> {
        softmax_sample(candidates, self.temperature, self.top_m, rng)
    }
}

pub fn softmax_sample<'a, R: Rng + ?Sized>(
    candidates: &'a [Candidate],
    temperature: f64,
    top_m: usize,
    rng: &mut R,
) -> Result<&'a Candidate> {
    if candidates.is_empty() {
        return Err(RankError::EmptyCandidatePool);
    }

    // Restrict to top-M so the junk tail never gets sampled
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.score().total_cmp(&a.score()));
    ranked.truncate(top_m.max(1));

    let t = temperature.max(MIN_TEMPERATURE);
    let logits: Vec<f64> = ranked.iter().map(|c| c.score() / t).collect();
    let max_logit = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    let total: f64 = exps.iter().sum();

    let draw = rng.gen::<f64>() * total;
    let mut acc = 0.0;
    for (cand, e) in ranked.iter().zip(exps.iter()) {
        acc += e;
        if acc >= draw {
            return Ok(*cand);
        }
    }

    // floating-point rounding can leave acc a hair short of draw
    Ok(ranked[ranked.len() - 1])
}
