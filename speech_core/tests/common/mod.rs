//! Common utilities for integration tests
#![allow(dead_code)]

use ndarray::Array2;
use speech_core::{
    BatchModel, FrameMatrix, PhonemeBuffer, PipelineConfig, StepModel, StepOutput, VocoderConfig,
    MAX_N, MAX_T, N_MELS, Z_COLUMNS, Z_ROWS,
};

/// Chunks starting with this symbol make [`ScriptedStep`] fail.
pub const FAIL_SYMBOL: u32 = 99;

/// Value the scripted step model writes into every cell of row `t`.
pub fn row_value(t: usize) -> f32 {
    (t + 1) as f32 / MAX_T as f32
}

/// Attention index the scripted step model reports for row `t`.
pub fn attention_for(t: usize) -> i64 {
    (t % MAX_N) as i64
}

/// Step model with deterministic output that records what it was given.
#[derive(Debug, Default)]
pub struct ScriptedStep {
    /// Step of the chunk currently being decoded.
    step: usize,
    /// Step at which chunks starting with [`FAIL_SYMBOL`] fail.
    pub fail_at: usize,
    /// Report this attention index instead of the scripted one.
    pub bad_attention: Option<i64>,
    pub not_ready: bool,
    pub calls: usize,
    /// `prev_attention` of every call, in order.
    pub received_attention: Vec<usize>,
    /// Whether every call saw rows `0..t` filled and rows `t..` still zero.
    pub history_consistent: bool,
}

impl ScriptedStep {
    pub fn new() -> Self {
        Self {
            history_consistent: true,
            ..Self::default()
        }
    }

    pub fn failing_at(step: usize) -> Self {
        Self {
            fail_at: step,
            ..Self::new()
        }
    }

    pub fn with_bad_attention(attention: i64) -> Self {
        Self {
            bad_attention: Some(attention),
            ..Self::new()
        }
    }

    pub fn unready() -> Self {
        Self {
            not_ready: true,
            ..Self::new()
        }
    }

    fn check_history(&mut self, history: &FrameMatrix, t: usize) {
        for r in 0..MAX_T {
            let expected = if r < t { row_value(r) } else { 0.0 };
            if history.row(r).iter().any(|&v| v != expected) {
                self.history_consistent = false;
                return;
            }
        }
    }
}

impl StepModel for ScriptedStep {
    fn invoke(
        &mut self,
        phonemes: &PhonemeBuffer,
        history: &FrameMatrix,
        prev_attention: usize,
    ) -> anyhow::Result<StepOutput> {
        let t = self.step;
        self.calls += 1;
        self.received_attention.push(prev_attention);
        self.check_history(history, t);

        if phonemes[0] == FAIL_SYMBOL && t == self.fail_at {
            self.step = 0;
            anyhow::bail!("executor crashed");
        }
        self.step = (t + 1) % MAX_T;

        // Garbage in every row but the current one; only row t may be used
        let mut frames = Array2::from_elem((MAX_T, N_MELS), -7.0);
        frames.row_mut(t).fill(row_value(t));
        let attention = (0..MAX_T)
            .map(|r| match self.bad_attention {
                Some(bad) if r == t => bad,
                _ => attention_for(r),
            })
            .collect();
        Ok(StepOutput { frames, attention })
    }

    fn is_ready(&self) -> bool {
        !self.not_ready
    }
}

/// Batch model returning the same spectrogram every time. Even bins hold
/// `value`, odd bins half of it, so the zero-phase frames are not all silent.
#[derive(Debug)]
pub struct StripedBatch {
    pub value: f32,
    pub shape: (usize, usize),
    pub calls: usize,
    /// Flat frame buffers received, in order.
    pub received: Vec<Vec<f32>>,
}

impl StripedBatch {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            shape: (Z_ROWS, Z_COLUMNS),
            calls: 0,
            received: Vec::new(),
        }
    }

    pub fn with_shape(value: f32, shape: (usize, usize)) -> Self {
        Self {
            shape,
            ..Self::new(value)
        }
    }
}

impl BatchModel for StripedBatch {
    fn invoke(&mut self, frames: &[f32]) -> anyhow::Result<Array2<f32>> {
        self.calls += 1;
        self.received.push(frames.to_vec());
        let value = self.value;
        Ok(Array2::from_shape_fn(self.shape, |(_, bin)| {
            if bin % 2 == 0 {
                value
            } else {
                value * 0.5
            }
        }))
    }
}

/// Default vocoder settings with fewer Griffin-Lim passes.
pub fn fast_config(iterations: usize) -> PipelineConfig {
    PipelineConfig {
        vocoder: VocoderConfig {
            iterations,
            ..VocoderConfig::default()
        },
    }
}

/// Route tracing output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("speech_core=debug")
        .with_test_writer()
        .try_init();
}
