// Configuration for the synthesis pipeline

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};
use crate::stft::StftParams;

/// Denormalization and Griffin-Lim parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocoderConfig {
    pub max_db: f32,
    pub ref_db: f32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub iterations: usize,
    pub sample_rate: u32,
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            max_db: 100.0,
            ref_db: 20.0,
            n_fft: 2048,
            hop_length: 275,
            win_length: 1102,
            iterations: 50,
            sample_rate: 22050,
        }
    }
}

impl VocoderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_db = env_or("VOCODER_MAX_DB", defaults.max_db);
        let ref_db = env_or("VOCODER_REF_DB", defaults.ref_db);
        let n_fft = env_or("VOCODER_N_FFT", defaults.n_fft);
        let hop_length = env_or("VOCODER_HOP_LENGTH", defaults.hop_length);
        let win_length = env_or("VOCODER_WIN_LENGTH", defaults.win_length);
        let iterations = env_or("GRIFFIN_LIM_ITERATIONS", defaults.iterations);
        let sample_rate = env_or("SAMPLE_RATE", defaults.sample_rate);

        Self {
            max_db,
            ref_db,
            n_fft,
            hop_length,
            win_length,
            iterations,
            sample_rate,
        }
    }

    pub fn stft_params(&self) -> StftParams {
        StftParams::new(self.n_fft, self.hop_length, self.win_length)
    }

    /// Frequency bins per spectrogram row.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_fft == 0 || self.n_fft % 2 != 0 {
            return Err(SynthesisError::validation(format!(
                "n_fft must be a positive even number, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 {
            return Err(SynthesisError::validation("hop_length must be positive"));
        }
        if self.win_length == 0 || self.win_length > self.n_fft {
            return Err(SynthesisError::validation(format!(
                "win_length must be in 1..={}, got {}",
                self.n_fft, self.win_length
            )));
        }
        if self.sample_rate == 0 {
            return Err(SynthesisError::validation("sample_rate must be positive"));
        }
        Ok(())
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub vocoder: VocoderConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            vocoder: VocoderConfig::from_env(),
        }
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| anyhow::anyhow!("pipeline config is not valid JSON: {e}"))?;
        config.vocoder.validate()?;
        Ok(config)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
