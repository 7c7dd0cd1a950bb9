//! GRU decoder with softmax output projection

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{embedding, linear, Embedding, Linear, VarBuilder};

use crate::config::Seq2SeqConfig;

use super::gru::GruCell;

pub struct Seq2SeqDecoder {
    /// Target embeddings: [target_vocab_size, target_embedding_dim]
    embedding: Embedding,
    gru: GruCell,
    /// Output projection: [latent_dim -> target_vocab_size]
    output_proj: Linear,
}

impl Seq2SeqDecoder {
    pub fn new(config: &Seq2SeqConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(
            config.target_vocab_size,
            config.target_embedding_dim,
            vb.pp("embedding"),
        )?;
        let gru = GruCell::new(config.target_embedding_dim, config.latent_dim, vb.pp("gru"))?;
        let output_proj = linear(config.latent_dim, config.target_vocab_size, vb.pp("output_proj"))?;

        Ok(Self {
            embedding,
            gru,
            output_proj,
        })
    }

    /// One decoding step
    ///
    /// # Arguments
    /// * `token_ids` - Previous tokens [batch] (u32)
    /// * `state` - Decoder state [batch, latent_dim]
    ///
    /// # Returns
    /// (probabilities [batch, target_vocab_size], next_state)
    pub fn step(&self, token_ids: &Tensor, state: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = self.embedding.forward(token_ids)?;
        let next_state = self.gru.step(&x, state)?;
        let logits = self.output_proj.forward(&next_state)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        Ok((probs, next_state))
    }

    /// Pass over whole ground-truth target prefixes
    ///
    /// # Arguments
    /// * `decoder_input` - Shifted target tokens [batch, seq_len] (u32)
    /// * `mask` - 1.0 for real tokens, 0.0 for padding [batch, seq_len]
    /// * `initial_state` - Encoder output [batch, latent_dim]
    ///
    /// # Returns
    /// Probabilities [batch, seq_len, target_vocab_size]
    pub fn forward(&self, decoder_input: &Tensor, mask: &Tensor, initial_state: &Tensor) -> Result<Tensor> {
        let (_batch, seq_len) = decoder_input.dims2()?;
        let embedded = self.embedding.forward(decoder_input)?;
        let mask = mask.to_dtype(embedded.dtype())?;

        let mut h = initial_state.clone();
        let mut outputs = Vec::with_capacity(seq_len);
        for t in 0..seq_len {
            let x_t = embedded.narrow(1, t, 1)?.squeeze(1)?;
            let m_t = mask.narrow(1, t, 1)?;
            h = self.gru.masked_step(&x_t, &h, &m_t)?;
            outputs.push(h.clone());
        }

        let hidden = Tensor::stack(&outputs, 1)?;
        let logits = self.output_proj.forward(&hidden)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }
}
