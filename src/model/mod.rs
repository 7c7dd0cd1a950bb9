//! GRU encoder-decoder components

pub mod decoder;
pub mod encoder;
pub mod gru;
pub mod seq2seq;

pub use decoder::Seq2SeqDecoder;
pub use encoder::Seq2SeqEncoder;
pub use gru::GruCell;
pub use seq2seq::Seq2SeqModel;
