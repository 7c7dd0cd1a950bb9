//! seq2seq-rs: subword sequence-to-sequence translation using Candle
//!
//! This crate provides beam search decoding over an autoregressive
//! encoder-decoder model, a GRU encoder-decoder implementation of that model,
//! and the batch windowing used on its training path.

pub mod batch;
pub mod codec;
pub mod config;
pub mod decoding;
pub mod engine;
pub mod error;
pub mod model;
pub mod oracle;
pub mod weights;

pub use codec::{SpecialTokens, SubwordCodec, TokenizerCodec};
pub use config::Seq2SeqConfig;
pub use decoding::{BeamOutput, BeamParams, BeamSearchDecoder};
pub use engine::{Translation, Translator};
pub use error::{Error, Result};
pub use oracle::{Distribution, OracleStep, SequenceOracle};

/// Default number of hypotheses kept per step
pub const DEFAULT_BEAM_WIDTH: usize = 5;

/// Default token cap when no model configuration bounds the output
pub const DEFAULT_MAX_OUTPUT_LENGTH: usize = 64;
