//! Argmax decoding (for comparison/debugging)

use crate::error::{Error, Result};
use crate::oracle::SequenceOracle;
use crate::SpecialTokens;

use super::beam::{BeamOutput, SearchStats};
use super::scoring::{log_probabilities, top_k_tokens};

/// Always emit the single most probable token until END or `max_output_length`
///
/// Ties go to the lower token id, as in the beam decoder, so a beam of width 1
/// reproduces this output exactly.
pub fn greedy_decode<O: SequenceOracle>(
    oracle: &O,
    special: SpecialTokens,
    input_ids: &[u32],
    max_output_length: usize,
) -> Result<BeamOutput> {
    if input_ids.is_empty() {
        return Err(Error::invalid_input("input sequence is empty"));
    }
    if max_output_length == 0 {
        return Err(Error::invalid_input("max_output_length must be at least 1"));
    }

    let mut stats = SearchStats::default();
    let mut state = oracle.encode(input_ids)?;
    let mut last = special.start;
    let mut tokens = Vec::new();
    let mut log_prob = 0.0f32;
    let mut finished = false;

    for _ in 0..max_output_length {
        stats.steps += 1;
        let step = oracle.step(&state, last)?;
        stats.oracle_calls += 1;

        let log_probs = log_probabilities(&step.distribution)?;
        let Some(&(token, token_log_prob)) = top_k_tokens(&log_probs, 1).first() else {
            break;
        };

        log_prob += token_log_prob;
        if token == special.end {
            finished = true;
            stats.completed = 1;
            break;
        }
        tokens.push(token);
        last = token;
        state = step.state;
    }

    Ok(BeamOutput {
        tokens,
        log_prob,
        finished,
        truncated: !finished,
        stats,
    })
}
