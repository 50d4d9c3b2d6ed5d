//! Spectrogram-to-waveform conversion.
//!
//! The upsampler emits magnitudes compressed into `[0, 1]`. They are mapped
//! back through the dB domain to linear magnitudes and the missing phase is
//! estimated with Griffin-Lim.

use ndarray::Array2;
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VocoderConfig;
use crate::error::{Result, SynthesisError};
use crate::model::SpectrogramMatrix;
use crate::stft::{ComplexSpectrum, StftEngine};

/// Floor for the estimate magnitude when extracting its phase.
const MAGNITUDE_FLOOR: f32 = 1e-8;

/// Linear magnitudes, frames x bins.
pub type MagnitudeSpectrum = Array2<f32>;

/// Mono PCM samples with their sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u64
    }
}

/// Map one compressed value back to a linear magnitude.
///
/// `v` is clamped to `[0, 1]`, scaled to dB (`v * max_db - max_db + ref_db`),
/// converted to amplitude and raised to the power 1.5.
pub fn denormalize_value(v: f32, max_db: f32, ref_db: f32) -> f32 {
    let db = v.clamp(0.0, 1.0) * max_db - max_db + ref_db;
    let amplitude = 10f32.powf(db * 0.05);
    amplitude.powf(1.5)
}

/// Griffin-Lim vocoder with a fixed iteration count.
#[derive(Debug, Clone)]
pub struct Vocoder {
    config: VocoderConfig,
    engine: StftEngine,
}

impl Vocoder {
    pub fn new(config: VocoderConfig) -> Result<Self> {
        config.validate()?;
        let engine = StftEngine::new(config.stft_params())?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &VocoderConfig {
        &self.config
    }

    /// Elementwise [`denormalize_value`] with the configured dB range.
    pub fn denormalize(&self, spectrogram: &Array2<f32>) -> MagnitudeSpectrum {
        let VocoderConfig { max_db, ref_db, .. } = self.config;
        spectrogram.mapv(|v| denormalize_value(v, max_db, ref_db))
    }

    /// Estimate a waveform whose STFT magnitude matches `magnitude`.
    ///
    /// Starts from zero phase and runs exactly `iterations` passes of
    /// ISTFT -> STFT -> keep phase, impose `magnitude`; then one final ISTFT.
    pub fn griffin_lim(&self, magnitude: &MagnitudeSpectrum) -> Result<Vec<f32>> {
        let bins = self.config.bins();
        if magnitude.ncols() != bins {
            return Err(SynthesisError::validation(format!(
                "magnitude spectrum has {} bins, n_fft {} needs {}",
                magnitude.ncols(),
                self.config.n_fft,
                bins
            )));
        }
        if magnitude.nrows() == 0 {
            return Ok(Vec::new());
        }

        let mut c: ComplexSpectrum = magnitude
            .outer_iter()
            .map(|row| row.iter().map(|&m| Complex32::new(m, 0.0)).collect())
            .collect();

        for n in 0..self.config.iterations {
            let x = self.engine.istft(&c)?;
            let estimate = self.engine.stft(&x)?;
            if estimate.len() != c.len() {
                return Err(SynthesisError::Signal(format!(
                    "re-analysis produced {} frames, expected {}",
                    estimate.len(),
                    c.len()
                )));
            }

            for ((frame, est), target) in c.iter_mut().zip(&estimate).zip(magnitude.outer_iter()) {
                for ((ci, e), &m) in frame.iter_mut().zip(est).zip(target.iter()) {
                    *ci = (*e / e.norm().max(MAGNITUDE_FLOOR)) * m;
                }
            }
            debug!(iteration = n + 1, of = self.config.iterations, "Griffin-Lim pass");
        }

        self.engine.istft(&c)
    }

    /// Denormalize an upsampled spectrogram and reconstruct its waveform.
    pub fn vocode(&self, spectrogram: &SpectrogramMatrix) -> Result<Waveform> {
        info!(
            frames = SpectrogramMatrix::ROWS,
            iterations = self.config.iterations,
            "Running Griffin-Lim"
        );
        let magnitude = self.denormalize(spectrogram.as_array());
        let samples = self.griffin_lim(&magnitude)?;
        Ok(Waveform::new(samples, self.config.sample_rate))
    }
}
