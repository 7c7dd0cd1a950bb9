//! High-level translation engine

use std::path::Path;

use anyhow::Context;
use candle_core::Device;
use rayon::prelude::*;

use crate::batch::Truncation;
use crate::codec::{SubwordCodec, TokenizerCodec};
use crate::config::Seq2SeqConfig;
use crate::decoding::{greedy_decode, BeamOutput, BeamParams, BeamSearchDecoder};
use crate::error::Result;
use crate::model::Seq2SeqModel;
use crate::oracle::SequenceOracle;
use crate::weights::load_model_vb;

/// A decoded sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub text: String,
    /// Target subword IDs without START/END
    pub tokens: Vec<u32>,
    pub log_prob: f32,
    /// No hypothesis reached END within the length bound
    pub truncated: bool,
}

impl Translation {
    fn empty() -> Self {
        Self {
            text: String::new(),
            tokens: Vec::new(),
            log_prob: 0.0,
            truncated: false,
        }
    }
}

/// Text-to-text translator binding codecs, oracle and configuration
pub struct Translator<C, O> {
    source_codec: C,
    target_codec: C,
    oracle: O,
    config: Seq2SeqConfig,
    truncation: Truncation,
}

impl Translator<TokenizerCodec, Seq2SeqModel> {
    /// Load config, tokenizers and weights from a model directory
    ///
    /// Expects `config.json`, `source_tokenizer.json`, `target_tokenizer.json`
    /// and `model.safetensors` (or a sharded index).
    pub fn from_pretrained<P: AsRef<Path>>(model_path: P) -> anyhow::Result<Self> {
        let model_path = model_path.as_ref();

        let device = Self::select_device()?;
        tracing::info!("Using device: {:?}", device);

        let config = Seq2SeqConfig::from_file(model_path.join("config.json"))
            .context("Failed to load config.json")?;
        let dtype = config.candle_dtype();
        tracing::info!(
            "Model config: latent_dim={}, vocab {} -> {}, dtype={:?}",
            config.latent_dim,
            config.input_vocab_size,
            config.target_vocab_size,
            dtype
        );

        tracing::info!("Loading tokenizers...");
        let source_codec =
            TokenizerCodec::from_file(model_path.join("source_tokenizer.json"), config.pad_token_id)?;
        let target_codec =
            TokenizerCodec::from_file(model_path.join("target_tokenizer.json"), config.pad_token_id)?;
        for (side, codec, expected) in [
            ("source", &source_codec, config.input_vocab_size),
            ("target", &target_codec, config.target_vocab_size),
        ] {
            if codec.vocab_size() > expected {
                anyhow::bail!(
                    "{} tokenizer has {} entries but the model only knows {}",
                    side,
                    codec.vocab_size(),
                    expected
                );
            }
        }

        tracing::info!("Loading model weights...");
        let vb = load_model_vb(model_path, dtype, &device)?;
        let model = Seq2SeqModel::new(&config, vb, &device)?;

        Ok(Self::new(source_codec, target_codec, model, config))
    }

    /// Select the best available device
    fn select_device() -> anyhow::Result<Device> {
        #[cfg(feature = "metal")]
        {
            if candle_core::utils::metal_is_available() {
                return Ok(Device::new_metal(0)?);
            }
        }

        #[cfg(feature = "cuda")]
        {
            if candle_core::utils::cuda_is_available() {
                return Ok(Device::new_cuda(0)?);
            }
        }

        Ok(Device::Cpu)
    }
}

impl<C: SubwordCodec, O: SequenceOracle> Translator<C, O> {
    pub fn new(source_codec: C, target_codec: C, oracle: O, config: Seq2SeqConfig) -> Self {
        Self {
            source_codec,
            target_codec,
            oracle,
            config,
            truncation: Truncation::default(),
        }
    }

    /// Which end of an over-long source is dropped; match the training window
    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    /// Beam parameters bounded by the model's target length
    pub fn default_params(&self) -> BeamParams {
        BeamParams {
            max_output_length: self.config.max_len_target,
            ..Default::default()
        }
    }

    /// Translate one sentence with beam search
    pub fn translate(&self, text: &str, params: &BeamParams) -> Result<Translation> {
        let Some(input_ids) = self.prepare_input(text)? else {
            return Ok(Translation::empty());
        };
        let decoder = BeamSearchDecoder::new(&self.oracle, self.config.special_tokens());
        let output = decoder.decode(&input_ids, params)?;
        self.finish(output)
    }

    /// Translate one sentence with argmax decoding (for comparison)
    pub fn translate_greedy(&self, text: &str, max_output_length: usize) -> Result<Translation> {
        let Some(input_ids) = self.prepare_input(text)? else {
            return Ok(Translation::empty());
        };
        let output = greedy_decode(
            &self.oracle,
            self.config.special_tokens(),
            &input_ids,
            max_output_length,
        )?;
        self.finish(output)
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Encode source text, bounded to the trained input length
    ///
    /// Over-long input is cut on the same side as [`crate::batch::BatchWindow`]
    /// cuts training sources. `None` when the text encodes to nothing.
    fn prepare_input(&self, text: &str) -> Result<Option<Vec<u32>>> {
        let input_ids = self.source_codec.encode(text)?;
        if input_ids.is_empty() {
            return Ok(None);
        }
        let max_len = self.config.max_len_input;
        if input_ids.len() > max_len {
            tracing::warn!(
                "Source has {} tokens, truncating to {} ({:?})",
                input_ids.len(),
                max_len,
                self.truncation
            );
            return Ok(Some(self.truncation.apply(&input_ids, max_len).to_vec()));
        }
        Ok(Some(input_ids))
    }

    fn finish(&self, output: BeamOutput) -> Result<Translation> {
        let text = self.target_codec.decode(&output.tokens)?;
        Ok(Translation {
            text,
            tokens: output.tokens,
            log_prob: output.log_prob,
            truncated: output.truncated,
        })
    }
}

impl<C, O> Translator<C, O>
where
    C: SubwordCodec + Sync,
    O: SequenceOracle + Sync,
{
    /// Translate independent sentences in parallel, preserving input order
    ///
    /// Each sentence runs its own decode; the oracle is only read.
    pub fn translate_batch<S: AsRef<str> + Sync>(
        &self,
        texts: &[S],
        params: &BeamParams,
    ) -> Vec<Result<Translation>> {
        texts
            .par_iter()
            .map(|text| self.translate(text.as_ref(), params))
            .collect()
    }
}
