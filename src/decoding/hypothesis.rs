//! Beam hypotheses

use super::scoring::rank_score;

/// One candidate output sequence with its running score and decoder state
#[derive(Debug, Clone)]
pub struct Hypothesis<S> {
    /// Emitted tokens, always starting with START
    pub tokens: Vec<u32>,
    /// Sum of per-token log-probabilities
    pub log_prob: f32,
    /// Decoder state after the last token; `None` once finished
    pub state: Option<S>,
    /// END has been emitted
    pub finished: bool,
    /// Creation order within one decode call
    pub serial: u64,
}

impl<S> Hypothesis<S> {
    /// The initial hypothesis holding only START
    pub fn root(start_token_id: u32, state: S, serial: u64) -> Self {
        Self {
            tokens: vec![start_token_id],
            log_prob: 0.0,
            state: Some(state),
            finished: false,
            serial,
        }
    }

    pub fn last_token(&self) -> u32 {
        // tokens always holds START
        self.tokens[self.tokens.len() - 1]
    }

    /// Number of tokens emitted after START
    pub fn emitted_len(&self) -> usize {
        self.tokens.len() - 1
    }

    pub fn score(&self, length_alpha: f32) -> f32 {
        rank_score(self.log_prob, self.emitted_len(), length_alpha)
    }

    /// Tokens without the leading START and a trailing END
    pub fn content_tokens(&self, end_token_id: u32) -> &[u32] {
        let body = &self.tokens[1..];
        match body.split_last() {
            Some((&last, rest)) if self.finished && last == end_token_id => rest,
            _ => body,
        }
    }
}
