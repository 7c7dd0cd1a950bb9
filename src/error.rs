//! seq2seq-rs error types

/// seq2seq-rs result type
pub type Result<T> = std::result::Result<T, Error>;

/// seq2seq-rs errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected input: empty sequences, zero beam width, pad collisions
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of what was rejected
        reason: String,
    },

    /// The sequence model failed while encoding or stepping
    #[error("oracle error: {reason}")]
    Oracle {
        /// Description of what went wrong
        reason: String,
    },

    /// Subword encode/decode failure
    #[error("codec error: {reason}")]
    Codec {
        /// Description of what went wrong
        reason: String,
    },

    /// Inconsistent model or decoding configuration
    #[error("config error: {reason}")]
    Config {
        /// Description of what went wrong
        reason: String,
    },

    /// Error from candle tensor operations outside the oracle
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn oracle(reason: impl Into<String>) -> Self {
        Self::Oracle {
            reason: reason.into(),
        }
    }

    pub(crate) fn codec(reason: impl Into<String>) -> Self {
        Self::Codec {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
