//! Decoding over a sequence model oracle
//!
//! - Beam search with deterministic tie-breaking
//! - Greedy argmax decoding, the width-1 reference

pub mod beam;
pub mod greedy;
pub mod hypothesis;
pub mod scoring;

pub use beam::{BeamOutput, BeamParams, BeamSearchDecoder, SearchStats};
pub use greedy::greedy_decode;
pub use hypothesis::Hypothesis;
