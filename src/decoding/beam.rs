//! Beam Search Decoding
//!
//! Drives a [`SequenceOracle`] one token at a time while keeping at most
//! `beam_width` hypotheses alive.
//!
//! ## Step
//!
//! Every live hypothesis is expanded with its own top-`k` tokens. The
//! expansions are pooled with the finished hypotheses already in the beam and
//! the best `k` survive. Taking only `k` tokens per parent is exact: a single
//! parent can contribute at most `k` entries to the global top-`k`, and those
//! are its own best `k`.
//!
//! ## Ordering
//!
//! Score descending, then creation order. Finished hypotheses carried from an
//! earlier step were created before any expansion of the current step, so they
//! win ties.
//!
//! ## Selection
//!
//! The result is the top-ranked hypothesis among the final beam and every
//! hypothesis that reached END, finished or not. `truncated` is set only when
//! no hypothesis ever reached END.

use crate::error::{Error, Result};
use crate::oracle::SequenceOracle;
use crate::SpecialTokens;

use super::hypothesis::Hypothesis;
use super::scoring::{log_probabilities, rank_order, rank_score, top_k_tokens};

/// Per-call beam search parameters
#[derive(Clone, Debug, PartialEq)]
pub struct BeamParams {
    /// Hypotheses retained per step; 1 is greedy decoding
    pub beam_width: usize,
    /// Hard cap on tokens emitted per hypothesis (END included)
    pub max_output_length: usize,
    /// Length normalization exponent; 0.0 ranks by raw log-probability
    pub length_alpha: f32,
}

impl Default for BeamParams {
    fn default() -> Self {
        Self {
            beam_width: crate::DEFAULT_BEAM_WIDTH,
            max_output_length: crate::DEFAULT_MAX_OUTPUT_LENGTH,
            length_alpha: 0.0,
        }
    }
}

impl BeamParams {
    pub fn new(beam_width: usize, max_output_length: usize) -> Self {
        Self {
            beam_width,
            max_output_length,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.beam_width == 0 {
            return Err(Error::invalid_input("beam_width must be at least 1"));
        }
        if self.max_output_length == 0 {
            return Err(Error::invalid_input("max_output_length must be at least 1"));
        }
        if !self.length_alpha.is_finite() || self.length_alpha < 0.0 {
            return Err(Error::invalid_input(format!(
                "length_alpha must be finite and non-negative, got {}",
                self.length_alpha
            )));
        }
        Ok(())
    }
}

/// Statistics from one decode call
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchStats {
    /// Decoding steps executed
    pub steps: usize,
    /// Oracle `step` invocations
    pub oracle_calls: usize,
    /// Hypotheses that reached END while inside the beam
    pub completed: usize,
}

/// Result of a decode call
#[derive(Debug, Clone, PartialEq)]
pub struct BeamOutput {
    /// Best sequence with START and END stripped
    pub tokens: Vec<u32>,
    /// Cumulative log-probability of the returned sequence (END included)
    pub log_prob: f32,
    /// The returned sequence ended with END
    pub finished: bool,
    /// No hypothesis reached END within `max_output_length`
    pub truncated: bool,
    pub stats: SearchStats,
}

/// A pooled entry awaiting the top-k cut
struct Candidate {
    /// Index of the parent (or the carried hypothesis) in the current beam
    slot: usize,
    /// Token appended to the parent; `None` for a carried finished hypothesis
    token: Option<u32>,
    log_prob: f32,
    score: f32,
    serial: u64,
}

/// Beam search decoder over a borrowed oracle
pub struct BeamSearchDecoder<'a, O: SequenceOracle> {
    oracle: &'a O,
    special: SpecialTokens,
}

impl<'a, O: SequenceOracle> BeamSearchDecoder<'a, O> {
    pub fn new(oracle: &'a O, special: SpecialTokens) -> Self {
        Self { oracle, special }
    }

    /// Decode `input_ids` into the best-scoring output sequence
    pub fn decode(&self, input_ids: &[u32], params: &BeamParams) -> Result<BeamOutput> {
        params.validate()?;
        if input_ids.is_empty() {
            return Err(Error::invalid_input("input sequence is empty"));
        }

        let beam_width = params.beam_width;
        let alpha = params.length_alpha;
        let mut stats = SearchStats::default();
        let mut next_serial = 0u64;

        let initial_state = self.oracle.encode(input_ids)?;
        let mut beam = vec![Hypothesis::root(self.special.start, initial_state, next_serial)];
        next_serial += 1;
        let mut completed: Vec<Hypothesis<O::State>> = Vec::new();

        for _ in 0..params.max_output_length {
            if beam.iter().all(|h| h.finished) {
                break;
            }
            stats.steps += 1;

            let mut pool: Vec<Candidate> = Vec::with_capacity(beam.len() * beam_width);
            let mut successors: Vec<Option<O::State>> = Vec::with_capacity(beam.len());

            for (slot, hyp) in beam.iter().enumerate() {
                if hyp.finished {
                    pool.push(Candidate {
                        slot,
                        token: None,
                        log_prob: hyp.log_prob,
                        score: hyp.score(alpha),
                        serial: hyp.serial,
                    });
                    successors.push(None);
                    continue;
                }

                let state = hyp
                    .state
                    .as_ref()
                    .ok_or_else(|| Error::oracle("live hypothesis has no decoder state"))?;
                let step = self.oracle.step(state, hyp.last_token())?;
                stats.oracle_calls += 1;

                let log_probs = log_probabilities(&step.distribution)?;
                for (token, token_log_prob) in top_k_tokens(&log_probs, beam_width) {
                    let log_prob = hyp.log_prob + token_log_prob;
                    pool.push(Candidate {
                        slot,
                        token: Some(token),
                        log_prob,
                        score: rank_score(log_prob, hyp.emitted_len() + 1, alpha),
                        serial: next_serial,
                    });
                    next_serial += 1;
                }
                successors.push(Some(step.state));
            }

            if pool.is_empty() {
                tracing::warn!("No expandable tokens left; stopping at step {}", stats.steps);
                break;
            }

            pool.sort_by(|a, b| rank_order(a.score, a.serial, b.score, b.serial));
            pool.truncate(beam_width);

            // Live children per parent; the last one takes the state instead of cloning it
            let mut live_children = vec![0usize; beam.len()];
            for candidate in &pool {
                if matches!(candidate.token, Some(token) if token != self.special.end) {
                    live_children[candidate.slot] += 1;
                }
            }

            let mut previous: Vec<Option<Hypothesis<O::State>>> = beam.into_iter().map(Some).collect();
            let mut next_beam = Vec::with_capacity(pool.len());

            for candidate in pool {
                let slot = candidate.slot;
                let Some(token) = candidate.token else {
                    if let Some(carried) = previous[slot].take() {
                        next_beam.push(carried);
                    }
                    continue;
                };

                let parent = previous[slot]
                    .as_ref()
                    .ok_or_else(|| Error::oracle("expansion parent already consumed"))?;
                let finished = token == self.special.end;
                let mut tokens = Vec::with_capacity(parent.tokens.len() + 1);
                tokens.extend_from_slice(&parent.tokens);
                tokens.push(token);

                let state = if finished {
                    None
                } else {
                    live_children[slot] -= 1;
                    if live_children[slot] == 0 {
                        successors[slot].take()
                    } else {
                        successors[slot].clone()
                    }
                };

                let hyp = Hypothesis {
                    tokens,
                    log_prob: candidate.log_prob,
                    state,
                    finished,
                    serial: candidate.serial,
                };
                if finished {
                    completed.push(hyp.clone());
                }
                next_beam.push(hyp);
            }

            beam = next_beam;

            tracing::trace!(
                step = stats.steps,
                live = beam.iter().filter(|h| !h.finished).count(),
                best = beam.first().map(|h| h.log_prob).unwrap_or(f32::NEG_INFINITY),
                "beam step"
            );
        }

        stats.completed = completed.len();
        let truncated = completed.is_empty();

        // Finished hypotheses pruned from the beam still compete at selection
        let best = beam
            .into_iter()
            .chain(completed)
            .min_by(|a, b| rank_order(a.score(alpha), a.serial, b.score(alpha), b.serial))
            .ok_or_else(|| Error::oracle("beam emptied during decoding"))?;

        let output = BeamOutput {
            tokens: best.content_tokens(self.special.end).to_vec(),
            log_prob: best.log_prob,
            finished: best.finished,
            truncated,
            stats,
        };

        tracing::debug!(
            "Beam decode: {} tokens, log_prob={:.4}, truncated={}, steps={}, oracle_calls={}",
            output.tokens.len(),
            output.log_prob,
            output.truncated,
            output.stats.steps,
            output.stats.oracle_calls
        );

        Ok(output)
    }
}
