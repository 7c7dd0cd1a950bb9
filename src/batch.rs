//! Batch windowing for the training path
//!
//! Turns variable-length token sequences into fixed-shape tensors:
//! right-padding to the longest sequence in the batch (capped by the model's
//! maximum length), shifting targets into decoder input/output, and masks that
//! keep padding out of any loss.

use candle_core::{DType, Device, Tensor, D};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};

/// Which end of an over-long sequence is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Truncation {
    /// Drop leading tokens, keep the tail
    #[default]
    Pre,
    /// Drop trailing tokens, keep the head
    Post,
}

impl Truncation {
    /// The part of `seq` kept under a `max_len` cap
    pub fn apply(self, seq: &[u32], max_len: usize) -> &[u32] {
        if seq.len() <= max_len {
            return seq;
        }
        match self {
            Truncation::Pre => &seq[seq.len() - max_len..],
            Truncation::Post => &seq[..max_len],
        }
    }
}

/// Right-pad sequences to the longest one, capped at `max_len`
///
/// Fails if `pad` occurs inside any sequence: a real token equal to the pad
/// value would be silently masked out.
pub fn pad_sequences(
    sequences: &[Vec<u32>],
    max_len: usize,
    pad: u32,
    truncation: Truncation,
) -> Result<Vec<Vec<u32>>> {
    if max_len == 0 {
        return Err(Error::invalid_input("max_len must be at least 1"));
    }
    if let Some(position) = sequences.iter().position(|seq| seq.contains(&pad)) {
        return Err(Error::invalid_input(format!(
            "sequence {} contains the pad value {}",
            position, pad
        )));
    }

    let width = sequences
        .iter()
        .map(|seq| seq.len())
        .max()
        .unwrap_or(0)
        .min(max_len);

    Ok(sequences
        .iter()
        .map(|seq| {
            let kept = truncation.apply(seq, width);
            let mut row = Vec::with_capacity(width);
            row.extend_from_slice(kept);
            row.resize(width, pad);
            row
        })
        .collect())
}

/// 1.0 where the token is real, 0.0 where it is padding
fn pad_mask(rows: &[Vec<u32>], pad: u32) -> Vec<f32> {
    rows.iter()
        .flat_map(|row| row.iter().map(|&id| if id == pad { 0.0 } else { 1.0 }))
        .collect()
}

fn to_tensor(rows: &[Vec<u32>], width: usize, device: &Device) -> Result<Tensor> {
    let flat: Vec<u32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(flat, (rows.len(), width), device)?)
}

/// Window settings shared by every batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWindow {
    pub max_len_input: usize,
    pub max_len_target: usize,
    pub pad_token_id: u32,
    pub truncation: Truncation,
}

impl BatchWindow {
    pub fn from_config(config: &crate::config::Seq2SeqConfig) -> Self {
        Self {
            max_len_input: config.max_len_input,
            max_len_target: config.max_len_target,
            pad_token_id: config.pad_token_id,
            truncation: Truncation::default(),
        }
    }
}

/// Padded encoder/decoder tensors for one batch
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    /// Source tokens [batch, src_len] (u32)
    pub encoder_input: Tensor,
    /// Source padding mask [batch, src_len] (f32)
    pub encoder_mask: Tensor,
    /// Target tokens without the last position [batch, tgt_len - 1] (u32)
    pub decoder_input: Tensor,
    /// Target tokens without the first position [batch, tgt_len - 1] (u32)
    pub decoder_target: Tensor,
    /// 1.0 where `decoder_target` is a real token [batch, tgt_len - 1] (f32)
    pub target_mask: Tensor,
}

impl TrainingBatch {
    /// Build a batch from source and target sequences (targets include START/END)
    pub fn new(
        sources: &[Vec<u32>],
        targets: &[Vec<u32>],
        window: &BatchWindow,
        device: &Device,
    ) -> Result<Self> {
        if sources.is_empty() || sources.len() != targets.len() {
            return Err(Error::invalid_input(format!(
                "need matching non-empty source/target lists, got {} and {}",
                sources.len(),
                targets.len()
            )));
        }

        let pad = window.pad_token_id;
        let source_rows = pad_sequences(sources, window.max_len_input, pad, window.truncation)?;
        let target_rows = pad_sequences(targets, window.max_len_target, pad, window.truncation)?;

        let src_len = source_rows[0].len();
        let tgt_len = target_rows[0].len();
        if src_len == 0 {
            return Err(Error::invalid_input("source batch has no tokens"));
        }
        if tgt_len < 2 {
            return Err(Error::invalid_input(
                "target sequences need at least two tokens to shift",
            ));
        }

        let decoder_input: Vec<Vec<u32>> = target_rows.iter().map(|row| row[..tgt_len - 1].to_vec()).collect();
        let decoder_target: Vec<Vec<u32>> = target_rows.iter().map(|row| row[1..].to_vec()).collect();

        let batch = sources.len();
        let shifted = tgt_len - 1;
        Ok(Self {
            encoder_input: to_tensor(&source_rows, src_len, device)?,
            encoder_mask: Tensor::from_vec(pad_mask(&source_rows, pad), (batch, src_len), device)?,
            decoder_input: to_tensor(&decoder_input, shifted, device)?,
            target_mask: Tensor::from_vec(pad_mask(&decoder_target, pad), (batch, shifted), device)?,
            decoder_target: to_tensor(&decoder_target, shifted, device)?,
        })
    }

    pub fn batch_size(&self) -> Result<usize> {
        Ok(self.encoder_input.dim(0)?)
    }
}

/// Mean negative log-likelihood over non-padding positions
///
/// # Arguments
/// * `probs` - Predicted probabilities [batch, seq_len, vocab]
/// * `targets` - Target token IDs [batch, seq_len] (u32)
/// * `mask` - 1.0 for real tokens, 0.0 for padding [batch, seq_len]
pub fn masked_nll(probs: &Tensor, targets: &Tensor, mask: &Tensor) -> Result<f32> {
    let picked = probs
        .to_dtype(DType::F32)?
        .gather(&targets.unsqueeze(2)?, 2)?
        .squeeze(D::Minus1)?;
    // Clamp so a padded position with zero probability cannot produce NaN
    let log_picked = picked.clamp(1e-12f32, 1.0f32)?.log()?;

    let mask = mask.to_dtype(DType::F32)?;
    let total: f32 = mask.sum_all()?.to_scalar()?;
    if total == 0.0 {
        return Err(Error::invalid_input("mask selects no positions"));
    }
    let nll: f32 = (log_picked * &mask)?.sum_all()?.neg()?.to_scalar()?;
    Ok(nll / total)
}

/// Endless stream of shuffled training batches
///
/// Each epoch permutes the sample indices and splits them into
/// `ceil(n / batch_size)` batches of near-equal size; the first `n % batches`
/// batches get one extra sample.
pub struct BatchGenerator {
    sources: Vec<Vec<u32>>,
    targets: Vec<Vec<u32>>,
    window: BatchWindow,
    batch_size: usize,
    device: Device,
    rng: StdRng,
    pending: Vec<Vec<usize>>,
    epoch: usize,
}

impl BatchGenerator {
    pub fn new(
        sources: Vec<Vec<u32>>,
        targets: Vec<Vec<u32>>,
        window: BatchWindow,
        batch_size: usize,
        seed: u64,
        device: &Device,
    ) -> Result<Self> {
        if sources.is_empty() || sources.len() != targets.len() {
            return Err(Error::invalid_input(format!(
                "need matching non-empty source/target lists, got {} and {}",
                sources.len(),
                targets.len()
            )));
        }
        if batch_size == 0 {
            return Err(Error::invalid_input("batch_size must be at least 1"));
        }

        Ok(Self {
            sources,
            targets,
            window,
            batch_size,
            device: device.clone(),
            rng: StdRng::seed_from_u64(seed),
            pending: Vec::new(),
            epoch: 0,
        })
    }

    /// Batches per epoch
    pub fn num_batches(&self) -> usize {
        self.sources.len().div_ceil(self.batch_size)
    }

    /// Completed or in-progress epochs
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Index groups for the next epoch, in yield order
    fn plan_epoch(&mut self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.sources.len()).collect();
        order.shuffle(&mut self.rng);
        split_even(&order, self.num_batches())
    }

    fn build(&self, indices: &[usize]) -> Result<TrainingBatch> {
        let sources: Vec<Vec<u32>> = indices.iter().map(|&i| self.sources[i].clone()).collect();
        let targets: Vec<Vec<u32>> = indices.iter().map(|&i| self.targets[i].clone()).collect();
        TrainingBatch::new(&sources, &targets, &self.window, &self.device)
    }
}

impl Iterator for BatchGenerator {
    type Item = Result<TrainingBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() {
            let mut plan = self.plan_epoch();
            plan.reverse();
            self.pending = plan;
            self.epoch += 1;
            tracing::debug!("Starting epoch {} with {} batches", self.epoch, self.pending.len());
        }
        let indices = self.pending.pop()?;
        Some(self.build(&indices))
    }
}

/// Split into `parts` contiguous chunks whose sizes differ by at most one
fn split_even(items: &[usize], parts: usize) -> Vec<Vec<usize>> {
    let base = items.len() / parts;
    let extra = items.len() % parts;
    let mut chunks = Vec::with_capacity(parts);
    let mut offset = 0;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(items[offset..offset + size].to_vec());
        offset += size;
    }
    chunks
}
