//! Shared oracles, codecs and fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};

use seq2seq_rs::{
    Distribution, Error, OracleStep, Result, Seq2SeqConfig, SequenceOracle, SpecialTokens, SubwordCodec,
};

pub const PAD: u32 = 0;
pub const START: u32 = 1;
pub const END: u32 = 2;

pub fn special() -> SpecialTokens {
    SpecialTokens {
        start: START,
        end: END,
        pad: PAD,
    }
}

/// Next-token distribution depends only on the previous token
///
/// `table[prev]` is the distribution after emitting `prev`. The state counts
/// steps so branching hypotheses carry something of their own.
#[derive(Debug)]
pub struct MarkovOracle {
    pub table: Vec<Vec<f32>>,
}

impl SequenceOracle for MarkovOracle {
    type State = usize;

    fn encode(&self, _input_ids: &[u32]) -> Result<usize> {
        Ok(0)
    }

    fn step(&self, state: &usize, previous_token: u32) -> Result<OracleStep<usize>> {
        let row = self.table.get(previous_token as usize).ok_or_else(|| Error::Oracle {
            reason: format!("no row for token {}", previous_token),
        })?;
        Ok(OracleStep {
            distribution: Distribution::Probabilities(row.clone()),
            state: state + 1,
        })
    }

    fn vocab_size(&self) -> usize {
        self.table.len()
    }
}

/// Greedy takes A then C; the better path is B then END
///
/// Tokens: PAD=0, START=1, END=2, A=3, B=4, C=5
pub fn garden_path_oracle() -> MarkovOracle {
    MarkovOracle {
        table: vec![
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],   // PAD
            vec![0.0, 0.0, 0.0, 0.55, 0.45, 0.0], // START
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],   // END
            vec![0.0, 0.0, 0.4, 0.0, 0.0, 0.6],   // A
            vec![0.0, 0.0, 0.9, 0.0, 0.0, 0.1],   // B
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],   // C
        ],
    }
}

/// Same distribution after every token
pub fn position_free_oracle(row: Vec<f32>) -> MarkovOracle {
    MarkovOracle {
        table: vec![row.clone(); row.len()],
    }
}

/// Every token equally likely at every step
pub struct UniformOracle {
    pub vocab_size: usize,
}

impl SequenceOracle for UniformOracle {
    type State = ();

    fn encode(&self, _input_ids: &[u32]) -> Result<()> {
        Ok(())
    }

    fn step(&self, _state: &(), _previous_token: u32) -> Result<OracleStep<()>> {
        Ok(OracleStep {
            distribution: Distribution::Logits(vec![0.0; self.vocab_size]),
            state: (),
        })
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

const CHARS: &str = "0123456789+-$";

/// Character-level codec: ids 0..3 are reserved, characters start at 3
pub struct CharCodec;

impl CharCodec {
    pub fn id(c: char) -> u32 {
        CHARS.find(c).map(|i| i as u32 + 3).unwrap_or(PAD)
    }

    pub fn vocab() -> usize {
        CHARS.len() + 3
    }
}

impl SubwordCodec for CharCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        text.chars()
            .map(|c| {
                CHARS.find(c).map(|i| i as u32 + 3).ok_or_else(|| Error::Codec {
                    reason: format!("unknown character {:?}", c),
                })
            })
            .collect()
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        // Reserved ids decode to nothing, like skip_special_tokens
        ids.iter()
            .filter(|&&id| id >= 3)
            .map(|&id| {
                CHARS.chars().nth(id as usize - 3).ok_or_else(|| Error::Codec {
                    reason: format!("unknown id {}", id),
                })
            })
            .collect()
    }

    fn vocab_size(&self) -> usize {
        Self::vocab()
    }
}

/// Decoder state of [`ArithmeticOracle`]: remaining answer digits
#[derive(Clone, Debug)]
pub struct AnswerState {
    answer: Vec<u32>,
    position: usize,
}

/// Rule-based oracle that "translates" `a+b$` / `a-b$` into the result
///
/// Puts probability 1.0 on the next digit of the answer, then on END.
/// Unparseable input ends immediately.
pub struct ArithmeticOracle;

impl ArithmeticOracle {
    fn solve(expression: &str) -> Option<i64> {
        let body = expression.strip_suffix('$')?;
        if let Some((a, b)) = body.split_once('+') {
            return Some(a.parse::<i64>().ok()? + b.parse::<i64>().ok()?);
        }
        let (a, b) = body.split_once('-')?;
        Some(a.parse::<i64>().ok()? - b.parse::<i64>().ok()?)
    }
}

impl SequenceOracle for ArithmeticOracle {
    type State = AnswerState;

    fn encode(&self, input_ids: &[u32]) -> Result<AnswerState> {
        let expression = CharCodec.decode(input_ids)?;
        let answer = Self::solve(&expression)
            .map(|value| value.to_string().chars().map(CharCodec::id).collect())
            .unwrap_or_default();
        Ok(AnswerState { answer, position: 0 })
    }

    fn step(&self, state: &AnswerState, _previous_token: u32) -> Result<OracleStep<AnswerState>> {
        let mut probs = vec![0.0; CharCodec::vocab()];
        let next = state.answer.get(state.position).copied().unwrap_or(END);
        probs[next as usize] = 1.0;
        Ok(OracleStep {
            distribution: Distribution::Probabilities(probs),
            state: AnswerState {
                answer: state.answer.clone(),
                position: state.position + 1,
            },
        })
    }

    fn vocab_size(&self) -> usize {
        CharCodec::vocab()
    }
}

/// Configuration matching [`CharCodec`] on both sides
pub fn char_config(max_len_target: usize) -> Seq2SeqConfig {
    Seq2SeqConfig {
        input_vocab_size: CharCodec::vocab(),
        target_vocab_size: CharCodec::vocab(),
        input_embedding_dim: 4,
        target_embedding_dim: 4,
        latent_dim: 8,
        max_len_input: 12,
        max_len_target,
        start_token_id: START,
        end_token_id: END,
        pad_token_id: PAD,
        dtype: "float32".to_string(),
    }
}

/// Deterministic pseudo-random tensor for weight fixtures
fn fixture_tensor(shape: &[usize], seed: f32, device: &Device) -> candle_core::Result<Tensor> {
    let n: usize = shape.iter().product();
    let values: Vec<f32> = (0..n)
        .map(|i| ((i as f32 * 0.37 + seed).sin() * 0.8))
        .collect();
    Tensor::from_vec(values, shape, device)
}

/// Every tensor the GRU model reads, keyed by its VarBuilder path
pub fn fixture_weights(config: &Seq2SeqConfig) -> candle_core::Result<HashMap<String, Tensor>> {
    let device = Device::Cpu;
    let units = config.encoder_units();
    let latent = config.latent_dim;
    let mut shapes: Vec<(String, Vec<usize>)> = vec![
        (
            "encoder.embedding.weight".into(),
            vec![config.input_vocab_size, config.input_embedding_dim],
        ),
        (
            "decoder.embedding.weight".into(),
            vec![config.target_vocab_size, config.target_embedding_dim],
        ),
        ("decoder.gru.input_proj.weight".into(), vec![3 * latent, config.target_embedding_dim]),
        ("decoder.gru.input_proj.bias".into(), vec![3 * latent]),
        ("decoder.gru.hidden_proj.weight".into(), vec![3 * latent, latent]),
        ("decoder.gru.hidden_proj.bias".into(), vec![3 * latent]),
        ("decoder.output_proj.weight".into(), vec![config.target_vocab_size, latent]),
        ("decoder.output_proj.bias".into(), vec![config.target_vocab_size]),
    ];
    for direction in ["forward_gru", "backward_gru"] {
        let prefix = format!("encoder.{}", direction);
        shapes.push((format!("{}.input_proj.weight", prefix), vec![3 * units, config.input_embedding_dim]));
        shapes.push((format!("{}.input_proj.bias", prefix), vec![3 * units]));
        shapes.push((format!("{}.hidden_proj.weight", prefix), vec![3 * units, units]));
        shapes.push((format!("{}.hidden_proj.bias", prefix), vec![3 * units]));
    }

    let mut tensors = HashMap::new();
    for (i, (name, shape)) in shapes.into_iter().enumerate() {
        tensors.insert(name, fixture_tensor(&shape, i as f32 * 1.7, &device)?);
    }
    Ok(tensors)
}

/// Write config.json and model.safetensors for `config` into `dir`
pub fn write_model_dir(dir: &Path, config: &Seq2SeqConfig) -> anyhow::Result<()> {
    std::fs::write(dir.join("config.json"), serde_json::to_string_pretty(config)?)?;
    candle_core::safetensors::save(&fixture_weights(config)?, dir.join("model.safetensors"))?;
    Ok(())
}

/// Word-level tokenizer.json whose vocabulary is `words` in id order
pub fn word_level_tokenizer(words: &[&str]) -> String {
    let vocab: serde_json::Map<String, serde_json::Value> = words
        .iter()
        .enumerate()
        .map(|(i, w)| (w.to_string(), serde_json::Value::from(i as u32)))
        .collect();
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<unk>"
        }
    })
    .to_string()
}
