//! Chunk-by-chunk orchestration: decode frames, upsample, vocode.

use anyhow::anyhow;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, SynthesisError};
use crate::model::{BatchModel, FrameMatrix, SpectrogramMatrix, StepModel};
use crate::synthesizer::FrameSynthesizer;
use crate::vocoder::{Vocoder, Waveform};
use crate::wav::WaveformSink;

/// Owns one step-model and one batch-model executor and runs every chunk
/// through both, then through the vocoder.
///
/// Chunks are independent: each gets fresh working buffers, and a failed
/// chunk leaves the pipeline usable for the next one. To synthesize in
/// parallel, build one pipeline (and one pair of executors) per worker.
#[derive(Debug)]
pub struct Pipeline<S, B> {
    synthesizer: FrameSynthesizer<S>,
    upsampler: B,
    vocoder: Vocoder,
}

impl<S: StepModel, B: BatchModel> Pipeline<S, B> {
    pub fn new(step_model: S, batch_model: B, config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            synthesizer: FrameSynthesizer::new(step_model),
            upsampler: batch_model,
            vocoder: Vocoder::new(config.vocoder)?,
        })
    }

    /// The step and batch executors.
    pub fn models(&self) -> (&S, &B) {
        (self.synthesizer.model(), &self.upsampler)
    }

    pub fn vocoder(&self) -> &Vocoder {
        &self.vocoder
    }

    /// Check that both executors are initialized.
    pub fn is_ready(&self) -> bool {
        let mut ready = true;
        if self.synthesizer.model().is_ready() {
            info!("Step model is ready");
        } else {
            error!("Step model is not initialized");
            ready = false;
        }
        if self.upsampler.is_ready() {
            info!("Batch model is ready");
        } else {
            error!("Batch model is not initialized");
            ready = false;
        }
        ready
    }

    /// Run the autoregressive decoder on one chunk.
    pub fn synthesize_frames(&mut self, phonemes: &[u32]) -> Result<FrameMatrix> {
        self.synthesizer.synthesize(phonemes)
    }

    /// Run the batch model on decoded frames.
    pub fn upsample(&mut self, frames: &FrameMatrix) -> Result<SpectrogramMatrix> {
        info!("Running batch model");
        let output = self
            .upsampler
            .invoke(&frames.to_flat())
            .map_err(|e| SynthesisError::model("batch", e))?;
        SpectrogramMatrix::from_array(output)
            .map_err(|e| SynthesisError::model("batch", anyhow!(e)))
    }

    /// Phoneme chunk in, waveform out.
    pub fn synthesize_chunk(&mut self, phonemes: &[u32]) -> Result<Waveform> {
        let frames = self.synthesize_frames(phonemes)?;
        let spectrogram = self.upsample(&frames)?;
        self.vocoder.vocode(&spectrogram)
    }

    /// Synthesize every chunk of an utterance. A failed chunk does not stop
    /// the ones after it; the caller decides whether any failure is fatal.
    pub fn synthesize_chunks<C: AsRef<[u32]>>(&mut self, chunks: &[C]) -> Vec<Result<Waveform>> {
        info!(chunks = chunks.len(), "Synthesizing utterance");
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let result = self.synthesize_chunk(chunk.as_ref());
                match &result {
                    Ok(waveform) => info!(
                        chunk = i,
                        samples = waveform.samples.len(),
                        duration_ms = waveform.duration_ms(),
                        "Chunk synthesized"
                    ),
                    Err(e) => warn!(chunk = i, error = %e, "Chunk failed"),
                }
                result
            })
            .collect()
    }

    /// Synthesize every chunk and hand each waveform to `sink`.
    pub fn synthesize_to<C, W>(&mut self, chunks: &[C], sink: &mut W) -> Vec<Result<()>>
    where
        C: AsRef<[u32]>,
        W: WaveformSink + ?Sized,
    {
        self.synthesize_chunks(chunks)
            .into_iter()
            .map(|result| {
                let waveform = result?;
                sink.write(&waveform).map_err(SynthesisError::Sink)
            })
            .collect()
    }
}
