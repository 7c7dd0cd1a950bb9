//! Sequence model oracle interface
//!
//! The beam search only ever sees the model through this trait: an `encode`
//! step producing the initial decoder state, and a `step` that scores every
//! vocabulary entry given a state and the previously emitted token.

use crate::error::Result;

/// Next-token scores returned by [`SequenceOracle::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Non-negative weights over the vocabulary; renormalized before use
    Probabilities(Vec<f32>),
    /// Unnormalized scores; converted with log-softmax before use
    Logits(Vec<f32>),
}

impl Distribution {
    /// Number of vocabulary entries scored
    pub fn len(&self) -> usize {
        match self {
            Self::Probabilities(values) | Self::Logits(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of a single decoder step
#[derive(Debug, Clone)]
pub struct OracleStep<S> {
    pub distribution: Distribution,
    /// Decoder state after consuming the previous token
    pub state: S,
}

/// Autoregressive encoder-decoder scoring function
///
/// Implementations must be deterministic. Shared read-only across threads
/// when `Sync`; any per-call scratch lives in `State`.
pub trait SequenceOracle {
    /// Per-hypothesis decoder state, cloned when a hypothesis branches
    type State: Clone;

    /// Encode a source sequence into the initial decoder state
    fn encode(&self, input_ids: &[u32]) -> Result<Self::State>;

    /// Score the next token given the current state and the last emitted token
    fn step(&self, state: &Self::State, previous_token: u32) -> Result<OracleStep<Self::State>>;

    /// Size of the output vocabulary
    fn vocab_size(&self) -> usize;
}
