//! Subword codec interface and a HuggingFace tokenizer adapter

use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Reserved target-side token IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub start: u32,
    pub end: u32,
    pub pad: u32,
}

/// Text <-> subword ID mapping
pub trait SubwordCodec {
    /// Encode text into content IDs (no START/END markers)
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode content IDs back into text
    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn vocab_size(&self) -> usize;
}

/// BPE codec backed by a `tokenizer.json` file
pub struct TokenizerCodec {
    tokenizer: Tokenizer,
    pad_token_id: u32,
}

impl TokenizerCodec {
    pub fn new(tokenizer: Tokenizer, pad_token_id: u32) -> Self {
        Self {
            tokenizer,
            pad_token_id,
        }
    }

    /// Load tokenizer from a HuggingFace `tokenizer.json`
    pub fn from_file<P: AsRef<Path>>(path: P, pad_token_id: u32) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| Error::codec(format!("Failed to load tokenizer {}: {}", path.display(), e)))?;
        Ok(Self::new(tokenizer, pad_token_id))
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl SubwordCodec for TokenizerCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::codec(format!("Tokenization failed: {}", e)))?;
        let ids = encoding.get_ids().to_vec();

        if ids.contains(&self.pad_token_id) {
            return Err(Error::codec(format!(
                "pad id {} produced as content for {:?}",
                self.pad_token_id, text
            )));
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| Error::codec(format!("Decoding failed: {}", e)))
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}
