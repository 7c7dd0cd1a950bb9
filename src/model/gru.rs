//! GRU cell with reset gate applied after the recurrent projection
//!
//! Computes, with gates ordered (r, z, n) in the stacked weights:
//!   r  = sigmoid(W_ir x + b_ir + W_hr h + b_hr)
//!   z  = sigmoid(W_iz x + b_iz + W_hz h + b_hz)
//!   n  = tanh(W_in x + b_in + r * (W_hn h + b_hn))
//!   h' = (1 - z) * n + z * h

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Single GRU layer stepped one timestep at a time
pub struct GruCell {
    /// Input projection: [input_size -> 3 * hidden_size]
    input_proj: Linear,
    /// Recurrent projection: [hidden_size -> 3 * hidden_size]
    hidden_proj: Linear,
    hidden_size: usize,
}

impl GruCell {
    pub fn new(input_size: usize, hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        let input_proj = linear(input_size, 3 * hidden_size, vb.pp("input_proj"))?;
        let hidden_proj = linear(hidden_size, 3 * hidden_size, vb.pp("hidden_proj"))?;
        Ok(Self {
            input_proj,
            hidden_proj,
            hidden_size,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Advance one timestep
    ///
    /// # Arguments
    /// * `x` - Input at this timestep [batch, input_size]
    /// * `h` - Previous hidden state [batch, hidden_size]
    pub fn step(&self, x: &Tensor, h: &Tensor) -> Result<Tensor> {
        let gi = self.input_proj.forward(x)?.chunk(3, D::Minus1)?;
        let gh = self.hidden_proj.forward(h)?.chunk(3, D::Minus1)?;

        let r = candle_nn::ops::sigmoid(&(&gi[0] + &gh[0])?)?;
        let z = candle_nn::ops::sigmoid(&(&gi[1] + &gh[1])?)?;
        let n = (&gi[2] + (r * &gh[2])?)?.tanh()?;

        // (1 - z) * n + z * h
        let keep = z.affine(-1.0, 1.0)?;
        (keep * n)? + (z * h)?
    }

    /// Advance one timestep, holding the state where `mask` is 0
    ///
    /// `mask` is [batch, 1] with 1.0 for real tokens and 0.0 for padding, so
    /// padded timesteps leave the state untouched.
    pub fn masked_step(&self, x: &Tensor, h: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let updated = self.step(x, h)?;
        let hold = mask.affine(-1.0, 1.0)?;
        mask.broadcast_mul(&updated)? + hold.broadcast_mul(h)?
    }
}
