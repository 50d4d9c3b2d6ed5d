//! Neural speech synthesis core.
//!
//! Phonetic text is encoded into symbol indices, decoded autoregressively into
//! mel frames by a step model, upsampled into a linear-frequency spectrogram by
//! a batch model, and turned into audio with Griffin-Lim phase reconstruction.
//! The two neural models are supplied by the caller through [`StepModel`] and
//! [`BatchModel`].

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod signal;
pub mod stft;
pub mod symbols;
pub mod synthesizer;
pub mod vocoder;
pub mod wav;

pub use config::{PipelineConfig, VocoderConfig};
pub use error::{Result, SynthesisError};
pub use model::{
    BatchModel, FrameMatrix, Matrix, PhonemeBuffer, SpectrogramMatrix, StepModel, StepOutput,
    MAX_N, MAX_T, N_MELS, Z_COLUMNS, Z_ROWS,
};
pub use pipeline::Pipeline;
pub use stft::{StftEngine, StftParams};
pub use symbols::{encode_utterance, split_into_chunks};
pub use synthesizer::{DecodeState, FrameSynthesizer};
pub use vocoder::{Vocoder, Waveform};
pub use wav::{encode_wav, MemorySink, WavFileSink, WaveformSink};
