//! Executor capabilities and the fixed-shape buffers exchanged with them.
//!
//! The neural networks themselves live behind [`StepModel`] and
//! [`BatchModel`]. Executors receive borrowed inputs and hand back owned
//! buffers, so nothing here aliases an executor's internal tensors past the
//! end of a call. Both traits take `&mut self`: an executor instance serves
//! at most one invocation at a time.

use ndarray::{Array2, ArrayView1};
use serde_json::Value;

use crate::error::{Result, SynthesisError};

/// Maximum number of phoneme symbols per chunk.
pub const MAX_N: usize = 180;
/// Decode steps (frame rows) per chunk.
pub const MAX_T: usize = 210;
/// Columns of a frame row.
pub const N_MELS: usize = 80;
/// Rows of the upsampled spectrogram.
pub const Z_ROWS: usize = 840;
/// Frequency bins of the upsampled spectrogram (`n_fft / 2 + 1` for 2048).
pub const Z_COLUMNS: usize = 1025;

/// Phoneme indices right-padded with zeros to [`MAX_N`].
pub type PhonemeBuffer = [u32; MAX_N];

/// Row-major `R x C` matrix whose shape is checked on construction and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<const R: usize, const C: usize>(Array2<f32>);

/// Autoregressively decoded frames, 210 x 80.
pub type FrameMatrix = Matrix<MAX_T, N_MELS>;

/// Upsampled spectrogram in the compressed `[0, 1]` range, 840 x 1025.
pub type SpectrogramMatrix = Matrix<Z_ROWS, Z_COLUMNS>;

impl<const R: usize, const C: usize> Matrix<R, C> {
    pub const ROWS: usize = R;
    pub const COLUMNS: usize = C;

    pub fn zeros() -> Self {
        Self(Array2::zeros((R, C)))
    }

    /// Wrap `array`, rejecting anything that is not exactly `R x C`.
    pub fn from_array(array: Array2<f32>) -> Result<Self> {
        if array.dim() != (R, C) {
            return Err(SynthesisError::validation(format!(
                "expected a {}x{} matrix, got {}x{}",
                R,
                C,
                array.nrows(),
                array.ncols()
            )));
        }
        Ok(Self(array))
    }

    /// Build from a row-major flat buffer of `R * C` values.
    pub fn from_flat(values: Vec<f32>) -> Result<Self> {
        if values.len() != R * C {
            return Err(SynthesisError::validation(format!(
                "expected {} values for a {}x{} matrix, got {}",
                R * C,
                R,
                C,
                values.len()
            )));
        }
        Array2::from_shape_vec((R, C), values)
            .map(Self)
            .map_err(|e| SynthesisError::validation(format!("matrix shape error: {e}")))
    }

    /// Row `index`.
    ///
    /// # Panics
    ///
    /// If `index >= R`. Use [`Matrix::get_row`] for a checked lookup.
    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.0.row(index)
    }

    /// Row `index`, or `None` past the last row.
    pub fn get_row(&self, index: usize) -> Option<ArrayView1<'_, f32>> {
        (index < R).then(|| self.0.row(index))
    }

    pub(crate) fn set_row(&mut self, index: usize, values: ArrayView1<'_, f32>) {
        self.0.row_mut(index).assign(&values);
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array2<f32> {
        self.0
    }

    /// Row-major copy of all values.
    pub fn to_flat(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }

    /// Nested JSON arrays, one per row, for dumping intermediate results.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.0
                .outer_iter()
                .map(|row| Value::from(row.to_vec()))
                .collect(),
        )
    }
}

/// What one step-model invocation hands back.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The model's full `MAX_T x N_MELS` frame buffer. Only the row of the
    /// current step is used.
    pub frames: Array2<f32>,
    /// Peak-attention position per row, `MAX_T` entries.
    pub attention: Vec<i64>,
}

/// One autoregressive decoder step.
pub trait StepModel {
    /// Run the network once with the padded phoneme buffer, the current frame
    /// history and the attention index of the previous step.
    fn invoke(
        &mut self,
        phonemes: &PhonemeBuffer,
        history: &FrameMatrix,
        prev_attention: usize,
    ) -> anyhow::Result<StepOutput>;

    /// Whether the executor has its inputs and outputs wired up.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Single-shot frame-to-spectrogram upsampler.
pub trait BatchModel {
    /// `frames` is a [`FrameMatrix`] flattened row-major (`MAX_T * N_MELS`
    /// values). The result must be `Z_ROWS x Z_COLUMNS`.
    fn invoke(&mut self, frames: &[f32]) -> anyhow::Result<Array2<f32>>;

    fn is_ready(&self) -> bool {
        true
    }
}

impl<M: StepModel + ?Sized> StepModel for Box<M> {
    fn invoke(
        &mut self,
        phonemes: &PhonemeBuffer,
        history: &FrameMatrix,
        prev_attention: usize,
    ) -> anyhow::Result<StepOutput> {
        (**self).invoke(phonemes, history, prev_attention)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

impl<M: BatchModel + ?Sized> BatchModel for Box<M> {
    fn invoke(&mut self, frames: &[f32]) -> anyhow::Result<Array2<f32>> {
        (**self).invoke(frames)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}
