//! Short-time Fourier transform and its inverse.
//!
//! Analysis frames are centered: the signal is reflect-padded by `n_fft / 2`
//! on each side before framing, and [`StftEngine::istft`] trims the same
//! amount after overlap-add, so `istft(stft(y))` lines up with `y`.

use num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};
use crate::signal::{self, PadMode, RealFft};

/// Envelope values at or below this are treated as silence and left alone.
const TINY: f32 = f32::MIN_POSITIVE;

/// Per-frame complex spectra, `frames x (n_fft / 2 + 1)` bins.
pub type ComplexSpectrum = Vec<Vec<Complex32>>;

/// STFT framing parameters. Zero means "use the default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StftParams {
    /// Length of the FFT (default 2048, or `2 * (bins - 1)` for the inverse).
    pub n_fft: usize,
    /// Samples between frames (default `win_length / 4`).
    pub hop_length: usize,
    /// Length of the Hann window (default `n_fft`).
    pub win_length: usize,
}

impl StftParams {
    pub const DEFAULT_N_FFT: usize = 2048;

    pub fn new(n_fft: usize, hop_length: usize, win_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            win_length,
        }
    }

    /// Fill in defaults for the forward transform.
    pub fn resolve(self) -> Self {
        let n_fft = if self.n_fft == 0 { Self::DEFAULT_N_FFT } else { self.n_fft };
        self.with_defaults_for(n_fft)
    }

    /// Fill in defaults for the inverse transform of spectra with `bins` bins.
    pub fn resolve_for_bins(self, bins: usize) -> Self {
        let n_fft = if self.n_fft == 0 {
            2 * bins.saturating_sub(1)
        } else {
            self.n_fft
        };
        self.with_defaults_for(n_fft)
    }

    fn with_defaults_for(self, n_fft: usize) -> Self {
        let win_length = if self.win_length == 0 { n_fft } else { self.win_length };
        let hop_length = if self.hop_length == 0 { win_length / 4 } else { self.hop_length };
        Self {
            n_fft,
            hop_length,
            win_length,
        }
    }

    /// Number of frequency bins per frame.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    fn validate(&self) -> Result<()> {
        if self.n_fft == 0 {
            return Err(SynthesisError::validation("n_fft must be positive"));
        }
        if self.hop_length == 0 {
            return Err(SynthesisError::validation("hop_length must be positive"));
        }
        if self.win_length == 0 || self.win_length > self.n_fft {
            return Err(SynthesisError::validation(format!(
                "win_length {} must be in 1..={}",
                self.win_length, self.n_fft
            )));
        }
        Ok(())
    }
}

/// STFT/ISTFT with the FFT plans and padded window computed once.
#[derive(Debug, Clone)]
pub struct StftEngine {
    params: StftParams,
    fft: RealFft,
    window: Vec<f32>,
}

impl StftEngine {
    /// Build an engine for fully resolved parameters (see [`StftParams::resolve`]).
    pub fn new(params: StftParams) -> Result<Self> {
        params.validate()?;
        let fft = RealFft::new(params.n_fft)?;
        let window = signal::pad_center(
            &signal::hann(params.win_length),
            params.n_fft,
            PadMode::Constant,
        )?;
        Ok(Self {
            params,
            fft,
            window,
        })
    }

    pub fn params(&self) -> StftParams {
        self.params
    }

    /// Short-time Fourier transform of `y`.
    ///
    /// Produces `1 + len(y) / hop_length` frames.
    pub fn stft(&self, y: &[f32]) -> Result<ComplexSpectrum> {
        let StftParams { n_fft, hop_length, .. } = self.params;

        let padded = signal::pad_center(y, y.len() + n_fft, PadMode::Reflect)?;
        let frames = signal::frame(&padded, n_fft, hop_length)?;

        frames
            .into_iter()
            .map(|mut frame| {
                for (s, w) in frame.iter_mut().zip(&self.window) {
                    *s *= *w;
                }
                self.fft.forward(&mut frame)
            })
            .collect()
    }

    /// Inverse short-time Fourier transform of `c`.
    ///
    /// Returns `hop_length * (frames - 1)` samples; an empty spectrum gives an
    /// empty signal.
    pub fn istft(&self, c: &[Vec<Complex32>]) -> Result<Vec<f32>> {
        if c.is_empty() {
            return Ok(Vec::new());
        }
        let StftParams {
            n_fft,
            hop_length,
            win_length,
        } = self.params;
        if let Some(bad) = c.iter().position(|f| f.len() != self.fft.bins()) {
            return Err(SynthesisError::validation(format!(
                "frame {bad} has {} bins, expected {}",
                c[bad].len(),
                self.fft.bins()
            )));
        }

        let n_frames = c.len();
        let expected_signal_len = n_fft + hop_length * (n_frames - 1);

        // IFFT and window every frame
        let frames = c
            .iter()
            .map(|spectrum| {
                let mut y = self.fft.inverse(spectrum)?;
                for (s, w) in y.iter_mut().zip(&self.window) {
                    *s *= *w;
                }
                Ok(y)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut y = vec![0.0f32; expected_signal_len];
        signal::overlap_add(&mut y, &frames, hop_length);

        // Undo the window energy wherever there is any
        let envelope = signal::window_sumsquare(win_length, n_frames, n_fft, hop_length)?;
        for (s, &e) in y.iter_mut().zip(&envelope) {
            if e > TINY {
                *s /= e;
            }
        }

        // Center trimming
        let half = n_fft / 2;
        Ok(y[half..expected_signal_len - half].to_vec())
    }
}

/// Short-time Fourier transform with default-filled `params`.
pub fn stft(y: &[f32], params: StftParams) -> Result<ComplexSpectrum> {
    StftEngine::new(params.resolve())?.stft(y)
}

/// Inverse short-time Fourier transform; `n_fft` defaults to `2 * (bins - 1)`.
pub fn istft(c: &[Vec<Complex32>], params: StftParams) -> Result<Vec<f32>> {
    let Some(first) = c.first() else {
        return Ok(Vec::new());
    };
    StftEngine::new(params.resolve_for_bins(first.len()))?.istft(c)
}
