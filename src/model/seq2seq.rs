//! GRU encoder-decoder translation model
//!
//! Wires encoder and decoder together and exposes the model to the decoders
//! through [`SequenceOracle`]. The decoder state is a `[1, latent_dim]`
//! tensor; tensors are immutable, so a branching hypothesis clones a handle
//! rather than the data.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::VarBuilder;

use crate::batch::TrainingBatch;
use crate::config::Seq2SeqConfig;
use crate::error::Error;
use crate::oracle::{Distribution, OracleStep, SequenceOracle};

use super::decoder::Seq2SeqDecoder;
use super::encoder::Seq2SeqEncoder;

pub struct Seq2SeqModel {
    encoder: Seq2SeqEncoder,
    decoder: Seq2SeqDecoder,
    config: Seq2SeqConfig,
    device: Device,
}

impl Seq2SeqModel {
    pub fn new(config: &Seq2SeqConfig, vb: VarBuilder, device: &Device) -> Result<Self> {
        let encoder = Seq2SeqEncoder::new(config, vb.pp("encoder"))?;
        let decoder = Seq2SeqDecoder::new(config, vb.pp("decoder"))?;

        Ok(Self {
            encoder,
            decoder,
            config: config.clone(),
            device: device.clone(),
        })
    }

    /// Encode one unpadded source sequence into the decoder's initial state
    pub fn encode_ids(&self, input_ids: &[u32]) -> Result<Tensor> {
        let len = input_ids.len();
        let ids = Tensor::from_vec(input_ids.to_vec(), (1, len), &self.device)?;
        let mask = Tensor::ones((1, len), DType::F32, &self.device)?;
        self.encoder.forward(&ids, &mask)
    }

    /// One decoder step for a single hypothesis
    ///
    /// # Returns
    /// (probabilities over the target vocabulary, next state)
    pub fn step_token(&self, state: &Tensor, previous_token: u32) -> Result<(Vec<f32>, Tensor)> {
        let token = Tensor::from_vec(vec![previous_token], (1,), &self.device)?;
        let (probs, next_state) = self.decoder.step(&token, state)?;
        let probs: Vec<f32> = probs.squeeze(0)?.to_dtype(DType::F32)?.to_vec1()?;
        Ok((probs, next_state))
    }

    /// Step probabilities for a padded batch fed its ground-truth prefixes
    ///
    /// # Returns
    /// [batch, target_len - 1, target_vocab_size], aligned with
    /// `batch.decoder_target`
    pub fn forward_batch(&self, batch: &TrainingBatch) -> Result<Tensor> {
        let initial_state = self.encoder.forward(&batch.encoder_input, &batch.encoder_mask)?;
        self.decoder
            .forward(&batch.decoder_input, &batch.target_mask, &initial_state)
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl SequenceOracle for Seq2SeqModel {
    type State = Tensor;

    fn encode(&self, input_ids: &[u32]) -> crate::Result<Tensor> {
        if let Some(&bad) = input_ids
            .iter()
            .find(|&&id| id as usize >= self.config.input_vocab_size)
        {
            return Err(Error::invalid_input(format!(
                "source token {} outside vocabulary of {}",
                bad, self.config.input_vocab_size
            )));
        }
        // PAD is masked out during training, so it never reaches the encoder here
        let content: Vec<u32> = input_ids
            .iter()
            .copied()
            .filter(|&id| id != self.config.pad_token_id)
            .collect();
        if content.is_empty() {
            return Err(Error::invalid_input("source sequence holds only padding"));
        }

        self.encode_ids(&content)
            .map_err(|e| Error::oracle(format!("encoder failed: {}", e)))
    }

    fn step(&self, state: &Tensor, previous_token: u32) -> crate::Result<OracleStep<Tensor>> {
        let (probs, next_state) = self
            .step_token(state, previous_token)
            .map_err(|e| Error::oracle(format!("decoder step failed: {}", e)))?;

        Ok(OracleStep {
            distribution: Distribution::Probabilities(probs),
            state: next_state,
        })
    }

    fn vocab_size(&self) -> usize {
        self.config.target_vocab_size
    }
}
