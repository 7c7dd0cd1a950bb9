//! Scoring utilities for beam search decoding

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::oracle::Distribution;

/// Convert an oracle distribution into natural-log probabilities
///
/// Probabilities are renormalized by their sum, logits go through a
/// max-shifted log-softmax. Zero-probability entries become `-inf`.
pub fn log_probabilities(distribution: &Distribution) -> Result<Vec<f32>> {
    if distribution.is_empty() {
        return Err(Error::oracle("empty distribution"));
    }

    match distribution {
        Distribution::Probabilities(probs) => {
            if let Some(bad) = probs.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(Error::oracle(format!("invalid probability {}", bad)));
            }
            let total: f32 = probs.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                return Err(Error::oracle(format!("distribution has no mass (sum={})", total)));
            }
            let log_total = total.ln();
            Ok(probs.iter().map(|&p| p.ln() - log_total).collect())
        }
        Distribution::Logits(logits) => {
            if logits.iter().any(|l| l.is_nan() || *l == f32::INFINITY) {
                return Err(Error::oracle("logits contain NaN or +inf"));
            }
            let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if max == f32::NEG_INFINITY {
                return Err(Error::oracle("all logits are -inf"));
            }
            let log_sum = logits.iter().map(|&l| (l - max).exp()).sum::<f32>().ln() + max;
            Ok(logits.iter().map(|&l| l - log_sum).collect())
        }
    }
}

/// Order tokens by log-probability descending, lower token ID first on ties
fn by_log_prob_desc(a: &(u32, f32), b: &(u32, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Select the `k` most probable tokens, best first
///
/// Tokens with `-inf` log-probability can never be ranked, so fewer than `k`
/// entries come back when the distribution has fewer than `k` non-zero
/// entries.
pub fn top_k_tokens(log_probs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut candidates: Vec<(u32, f32)> = log_probs
        .iter()
        .enumerate()
        .filter(|(_, lp)| lp.is_finite())
        .map(|(i, &lp)| (i as u32, lp))
        .collect();

    if k == 0 {
        return Vec::new();
    }
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, by_log_prob_desc);
        candidates.truncate(k);
    }
    candidates.sort_by(by_log_prob_desc);
    candidates
}

/// GNMT-style length penalty `((5 + len) / 6)^alpha`
pub fn length_penalty(length: usize, alpha: f32) -> f32 {
    ((5.0 + length as f32) / 6.0).powf(alpha)
}

/// Ranking score of a hypothesis with `length` emitted tokens
///
/// With `alpha == 0` this is exactly the cumulative log-probability.
pub fn rank_score(log_prob: f32, length: usize, alpha: f32) -> f32 {
    if alpha == 0.0 {
        log_prob
    } else {
        log_prob / length_penalty(length, alpha)
    }
}

/// Beam ordering: higher score first, earlier serial first on ties
pub fn rank_order(a_score: f32, a_serial: u64, b_score: f32, b_serial: u64) -> Ordering {
    b_score.total_cmp(&a_score).then(a_serial.cmp(&b_serial))
}
