//! Seq2seq model configuration

use candle_core::DType;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::SpecialTokens;

/// Configuration for the GRU encoder-decoder translation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    /// Source subword vocabulary size (including reserved IDs)
    pub input_vocab_size: usize,

    /// Target subword vocabulary size (including reserved IDs)
    pub target_vocab_size: usize,

    /// Source embedding width: matches the BPE embedding dimension
    pub input_embedding_dim: usize,

    /// Target embedding width
    pub target_embedding_dim: usize,

    /// Decoder hidden size; each encoder direction gets half of it
    pub latent_dim: usize,

    /// Longest source sequence the model was trained on
    pub max_len_input: usize,

    /// Longest target sequence (START and END included)
    pub max_len_target: usize,

    /// START marker in the target vocabulary
    pub start_token_id: u32,

    /// END marker in the target vocabulary
    pub end_token_id: u32,

    /// Padding value for both vocabularies; zero-masked by the embeddings
    #[serde(default)]
    pub pad_token_id: u32,

    /// Weight dtype: "float32"
    #[serde(default = "default_dtype")]
    pub dtype: String,
}

fn default_dtype() -> String {
    "float32".to_string()
}

impl Seq2SeqConfig {
    /// Load configuration from JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural consistency of the configuration
    pub fn validate(&self) -> Result<()> {
        if self.latent_dim == 0 || self.latent_dim % 2 != 0 {
            return Err(Error::config(format!(
                "latent_dim must be a positive even number, got {}",
                self.latent_dim
            )));
        }
        if self.max_len_input == 0 || self.max_len_target == 0 {
            return Err(Error::config("max_len_input and max_len_target must be non-zero"));
        }
        if self.input_embedding_dim == 0 || self.target_embedding_dim == 0 {
            return Err(Error::config("embedding dimensions must be non-zero"));
        }

        let special = self.special_tokens();
        if special.start == special.end || special.pad == special.start || special.pad == special.end {
            return Err(Error::config(format!(
                "special token ids must be distinct: start={}, end={}, pad={}",
                special.start, special.end, special.pad
            )));
        }
        for (name, id) in [("start", special.start), ("end", special.end), ("pad", special.pad)] {
            if id as usize >= self.target_vocab_size {
                return Err(Error::config(format!(
                    "{} token id {} outside target vocabulary of {}",
                    name, id, self.target_vocab_size
                )));
            }
        }
        if special.pad as usize >= self.input_vocab_size {
            return Err(Error::config(format!(
                "pad token id {} outside input vocabulary of {}",
                special.pad, self.input_vocab_size
            )));
        }
        Ok(())
    }

    /// Reserved target-side token IDs
    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            start: self.start_token_id,
            end: self.end_token_id,
            pad: self.pad_token_id,
        }
    }

    /// Each encoder direction's hidden size
    pub fn encoder_units(&self) -> usize {
        self.latent_dim / 2
    }

    /// Get the candle DType based on config
    pub fn candle_dtype(&self) -> DType {
        match self.dtype.to_lowercase().as_str() {
            "float16" | "f16" | "half" => DType::F16,
            "bfloat16" | "bf16" => DType::BF16,
            _ => DType::F32,
        }
    }

    /// Small configuration for tests and smoke runs
    pub fn tiny() -> Self {
        Self {
            input_vocab_size: 16,
            target_vocab_size: 12,
            input_embedding_dim: 4,
            target_embedding_dim: 4,
            latent_dim: 8,
            max_len_input: 10,
            max_len_target: 6,
            start_token_id: 1,
            end_token_id: 2,
            pad_token_id: 0,
            dtype: "float32".to_string(),
        }
    }
}
