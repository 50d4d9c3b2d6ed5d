//! Autoregressive frame decoding.
//!
//! The step model is invoked once per output row. Each call sees the whole
//! history buffer and the previous attention index; only row `t` of what it
//! returns is kept, and its attention index for row `t` feeds the next call.

use anyhow::{bail, ensure};
use ndarray::ArrayView1;
use tracing::{debug, info};

use crate::error::{Result, SynthesisError};
use crate::model::{FrameMatrix, PhonemeBuffer, StepModel, StepOutput, MAX_N, MAX_T, N_MELS};

/// Running state of the decode loop at a step boundary.
///
/// Rows `0..step()` of the history are final; the rest are still zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeState {
    history: FrameMatrix,
    step: usize,
    prev_attention: usize,
}

impl Default for DecodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeState {
    pub fn new() -> Self {
        Self {
            history: FrameMatrix::zeros(),
            step: 0,
            prev_attention: 0,
        }
    }

    /// Number of rows written so far, which is also the next row to write.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn prev_attention(&self) -> usize {
        self.prev_attention
    }

    pub fn history(&self) -> &FrameMatrix {
        &self.history
    }

    /// A written row, or `None` if row `t` has not been decoded yet.
    pub fn row(&self, t: usize) -> Option<ArrayView1<'_, f32>> {
        (t < self.step).then(|| self.history.row(t))
    }

    pub fn is_complete(&self) -> bool {
        self.step == MAX_T
    }

    /// Immutable copy of the state at this step boundary.
    pub fn snapshot(&self) -> DecodeState {
        self.clone()
    }

    /// Write the next row and the attention index that produced it.
    pub fn write_row(&mut self, row: ArrayView1<'_, f32>, attention: usize) -> Result<()> {
        if self.is_complete() {
            return Err(SynthesisError::validation("decode state already holds every row"));
        }
        if row.len() != N_MELS {
            return Err(SynthesisError::validation(format!(
                "frame row has {} values, expected {}",
                row.len(),
                N_MELS
            )));
        }
        if attention >= MAX_N {
            return Err(SynthesisError::validation(format!(
                "attention index {attention} outside 0..{MAX_N}"
            )));
        }
        self.history.set_row(self.step, row);
        self.prev_attention = attention;
        self.step += 1;
        Ok(())
    }

    pub fn into_frames(self) -> FrameMatrix {
        self.history
    }
}

/// Right-pad `phonemes` with zeros to [`MAX_N`] symbols.
pub fn pad_phonemes(phonemes: &[u32]) -> Result<PhonemeBuffer> {
    if phonemes.len() > MAX_N {
        return Err(SynthesisError::validation(format!(
            "Phoneme sequence too long ({} symbols, max {})",
            phonemes.len(),
            MAX_N
        )));
    }
    let mut buffer = [0u32; MAX_N];
    buffer[..phonemes.len()].copy_from_slice(phonemes);
    Ok(buffer)
}

/// Drives a [`StepModel`] through all [`MAX_T`] decode steps.
#[derive(Debug)]
pub struct FrameSynthesizer<M> {
    model: M,
}

impl<M: StepModel> FrameSynthesizer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    /// Decode a phoneme chunk into a full [`FrameMatrix`].
    ///
    /// Always runs exactly [`MAX_T`] steps. Fails without touching the model
    /// when the chunk is longer than [`MAX_N`], and discards everything decoded
    /// so far when any step fails.
    pub fn synthesize(&mut self, phonemes: &[u32]) -> Result<FrameMatrix> {
        self.synthesize_with(phonemes, |_| {})
    }

    /// Like [`FrameSynthesizer::synthesize`], calling `observer` with the
    /// state after every step.
    pub fn synthesize_with<F>(&mut self, phonemes: &[u32], mut observer: F) -> Result<FrameMatrix>
    where
        F: FnMut(&DecodeState),
    {
        let buffer = pad_phonemes(phonemes)?;
        info!(symbols = phonemes.len(), steps = MAX_T, "Decoding frames");

        let mut state = DecodeState::new();
        for t in 0..MAX_T {
            let output = self
                .model
                .invoke(&buffer, state.history(), state.prev_attention())
                .map_err(|e| SynthesisError::model(format!("step {t}"), e))?;

            let (row, attention) = step_result(&output, t)
                .map_err(|e| SynthesisError::model(format!("step {t}"), e))?;
            state.write_row(row, attention)?;

            if t % 30 == 0 {
                debug!(step = t, attention, "decode step");
            }
            observer(&state);
        }

        Ok(state.into_frames())
    }
}

/// Pull row `t` and its attention index out of a step-model result.
fn step_result(output: &StepOutput, t: usize) -> anyhow::Result<(ArrayView1<'_, f32>, usize)> {
    ensure!(
        output.frames.dim() == (MAX_T, N_MELS),
        "step model returned a {}x{} frame buffer, expected {}x{}",
        output.frames.nrows(),
        output.frames.ncols(),
        MAX_T,
        N_MELS
    );
    let Some(&attention) = output.attention.get(t) else {
        bail!(
            "step model returned {} attention indices, needed row {t}",
            output.attention.len()
        );
    };
    let attention = usize::try_from(attention)
        .ok()
        .filter(|&a| a < MAX_N)
        .ok_or_else(|| anyhow::anyhow!("attention index {attention} outside 0..{MAX_N}"))?;
    Ok((output.frames.row(t), attention))
}
