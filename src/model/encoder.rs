//! Bidirectional GRU encoder
//!
//! Reads the source sequence forward and backward with two GRUs of
//! `latent_dim / 2` units each. Their final states, concatenated, initialise
//! the decoder. PAD timesteps are skipped in both directions.

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{embedding, Embedding, VarBuilder};

use crate::config::Seq2SeqConfig;

use super::gru::GruCell;

pub struct Seq2SeqEncoder {
    /// Source embeddings: [input_vocab_size, input_embedding_dim]
    embedding: Embedding,
    forward_gru: GruCell,
    backward_gru: GruCell,
}

impl Seq2SeqEncoder {
    pub fn new(config: &Seq2SeqConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(
            config.input_vocab_size,
            config.input_embedding_dim,
            vb.pp("embedding"),
        )?;
        let units = config.encoder_units();
        let forward_gru = GruCell::new(config.input_embedding_dim, units, vb.pp("forward_gru"))?;
        let backward_gru = GruCell::new(config.input_embedding_dim, units, vb.pp("backward_gru"))?;

        Ok(Self {
            embedding,
            forward_gru,
            backward_gru,
        })
    }

    /// Encode a batch of source sequences
    ///
    /// # Arguments
    /// * `input_ids` - Token IDs [batch, seq_len] (u32)
    /// * `mask` - 1.0 for real tokens, 0.0 for padding [batch, seq_len]
    ///
    /// # Returns
    /// Decoder initial state [batch, latent_dim]
    pub fn forward(&self, input_ids: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (batch, seq_len) = input_ids.dims2()?;
        let embedded = self.embedding.forward(input_ids)?;
        let mask = mask.to_dtype(embedded.dtype())?;

        let units = self.forward_gru.hidden_size();
        let zeros = Tensor::zeros((batch, units), embedded.dtype(), embedded.device())?;

        let mut h_fwd = zeros.clone();
        for t in 0..seq_len {
            let x_t = embedded.narrow(1, t, 1)?.squeeze(1)?;
            let m_t = mask.narrow(1, t, 1)?;
            h_fwd = self.forward_gru.masked_step(&x_t, &h_fwd, &m_t)?;
        }

        let mut h_bwd = zeros;
        for t in (0..seq_len).rev() {
            let x_t = embedded.narrow(1, t, 1)?.squeeze(1)?;
            let m_t = mask.narrow(1, t, 1)?;
            h_bwd = self.backward_gru.masked_step(&x_t, &h_bwd, &m_t)?;
        }

        Tensor::cat(&[&h_fwd, &h_bwd], D::Minus1)
    }
}
