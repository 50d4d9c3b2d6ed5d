//! Signal primitives shared by the STFT engine and the vocoder.
//!
//! Real FFT helpers, the Hann window, centered padding, frame slicing,
//! overlap-add and the window sum-square envelope.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::error::{Result, SynthesisError};

/// Padding mode for [`pad_center`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PadMode {
    /// `[1, 2, 3, 4, 5]` -> `[0, 0, 1, 2, 3, 4, 5, 0, 0]`
    #[default]
    Constant,
    /// `[1, 2, 3, 4, 5]` -> `[3, 2, 1, 2, 3, 4, 5, 4, 3]`
    Reflect,
}

/// Planned forward/inverse real FFT pair of a fixed length.
///
/// Planning is the expensive part, so callers that transform many frames of
/// the same size (the STFT engine) keep one of these around.
#[derive(Clone)]
pub struct RealFft {
    len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl std::fmt::Debug for RealFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFft").field("len", &self.len).finish()
    }
}

impl RealFft {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(SynthesisError::Signal("FFT length must be positive".to_string()));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        Ok(Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        })
    }

    /// Time-domain length this pair was planned for.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of complex bins produced by [`RealFft::forward`].
    pub fn bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// Unnormalized forward transform. `input` is used as scratch space.
    pub fn forward(&self, input: &mut [f32]) -> Result<Vec<Complex32>> {
        if input.len() != self.len {
            return Err(SynthesisError::Signal(format!(
                "rfft input has {} samples, expected {}",
                input.len(),
                self.len
            )));
        }
        let mut spectrum = self.forward.make_output_vec();
        self.forward
            .process(input, &mut spectrum)
            .map_err(|e| SynthesisError::Signal(format!("rfft failed: {e}")))?;
        Ok(spectrum)
    }

    /// Inverse transform, normalized by the output length.
    ///
    /// The imaginary parts of the DC and Nyquist bins carry no information for
    /// a real signal and are ignored.
    pub fn inverse(&self, spectrum: &[Complex32]) -> Result<Vec<f32>> {
        if spectrum.len() != self.bins() {
            return Err(SynthesisError::Signal(format!(
                "irfft input has {} bins, expected {}",
                spectrum.len(),
                self.bins()
            )));
        }
        let mut scratch = spectrum.to_vec();
        scratch[0].im = 0.0;
        if self.len % 2 == 0 {
            if let Some(nyquist) = scratch.last_mut() {
                nyquist.im = 0.0;
            }
        }

        let mut out = self.inverse.make_output_vec();
        self.inverse
            .process(&mut scratch, &mut out)
            .map_err(|e| SynthesisError::Signal(format!("irfft failed: {e}")))?;

        // Normalize
        let scale = 1.0 / self.len as f32;
        out.iter_mut().for_each(|s| *s *= scale);
        Ok(out)
    }
}

/// One-dimensional discrete Fourier transform of real input.
///
/// Returns `len / 2 + 1` complex bins.
pub fn rfft(r: &[f32]) -> Result<Vec<Complex32>> {
    let fft = RealFft::new(r.len())?;
    let mut input = r.to_vec();
    fft.forward(&mut input)
}

/// Inverse of [`rfft`]: returns `2 * (len(c) - 1)` samples divided by that length.
pub fn irfft(c: &[Complex32]) -> Result<Vec<f32>> {
    if c.len() < 2 {
        return Err(SynthesisError::Signal(format!(
            "irfft needs at least 2 bins, got {}",
            c.len()
        )));
    }
    RealFft::new(2 * (c.len() - 1))?.inverse(c)
}

/// Hann window value of the `n`-th point of a `size`-point window.
pub fn hann_window(n: usize, size: usize) -> f32 {
    if size < 2 {
        return 1.0;
    }
    (0.5 * (1.0 - (2.0 * PI * n as f64 / (size - 1) as f64).cos())) as f32
}

/// The `size`-point Hann window as a vector.
pub fn hann(size: usize) -> Vec<f32> {
    (0..size).map(|n| hann_window(n, size)).collect()
}

/// Pad `data` on both sides so that it is centered in a vector of `size` samples.
///
/// The left pad is `(size - len) / 2`, the remainder goes to the right. When
/// nothing needs padding `data` comes back unchanged.
pub fn pad_center(data: &[f32], size: usize, mode: PadMode) -> Result<Vec<f32>> {
    let n = data.len();
    if size < n {
        return Err(SynthesisError::validation(format!(
            "cannot center {n} samples in {size}"
        )));
    }
    if size == n {
        return Ok(data.to_vec());
    }
    let lpad = (size - n) / 2;

    let mut result = vec![0.0f32; size];
    result[lpad..lpad + n].copy_from_slice(data);

    if mode == PadMode::Reflect && n > 0 {
        // Leading pad, walking away from the first sample
        let mut walk = ReflectWalk::new(n, 0, true);
        for slot in result[..lpad].iter_mut().rev() {
            *slot = data[walk.next_index()];
        }
        // Ending pad, walking away from the last sample
        let mut walk = ReflectWalk::new(n, n - 1, false);
        for slot in result[lpad + n..].iter_mut() {
            *slot = data[walk.next_index()];
        }
    }
    Ok(result)
}

/// Bounces an index back and forth over `0..n` without repeating the
/// boundary sample on the turn.
struct ReflectWalk {
    n: usize,
    index: usize,
    ascending: bool,
}

impl ReflectWalk {
    fn new(n: usize, index: usize, ascending: bool) -> Self {
        Self { n, index, ascending }
    }

    fn next_index(&mut self) -> usize {
        if self.n == 1 {
            return 0;
        }
        if self.ascending {
            if self.index != self.n - 1 {
                self.index += 1;
            } else {
                self.index -= 1;
                self.ascending = false;
            }
        } else if self.index != 0 {
            self.index -= 1;
        } else {
            self.index += 1;
            self.ascending = true;
        }
        self.index
    }
}

/// Slice `y` into overlapping frames of `frame_length` samples.
///
/// Frame `i` starts at sample `i * hop_length`; there are
/// `1 + (len - frame_length) / hop_length` of them. For `x = [0, 1, 2, 3, 4, 5, 6]`,
/// frame length 3 and hop 2 this gives `[0, 1, 2]`, `[2, 3, 4]`, `[4, 5, 6]`.
pub fn frame(y: &[f32], frame_length: usize, hop_length: usize) -> Result<Vec<Vec<f32>>> {
    if hop_length == 0 {
        return Err(SynthesisError::validation("hop length must be positive"));
    }
    if frame_length == 0 || y.len() < frame_length {
        return Ok(Vec::new());
    }
    let n_frames = 1 + (y.len() - frame_length) / hop_length;
    Ok((0..n_frames)
        .map(|i| {
            let start = i * hop_length;
            y[start..start + frame_length].to_vec()
        })
        .collect())
}

/// Sum-square envelope of a Hann window at a given hop length.
///
/// The window is `win_length` points, zero-padded to `n_fft`; the envelope
/// covers `n_fft + hop_length * (n_frames - 1)` samples.
pub fn window_sumsquare(
    win_length: usize,
    n_frames: usize,
    n_fft: usize,
    hop_length: usize,
) -> Result<Vec<f32>> {
    if n_frames == 0 {
        return Ok(Vec::new());
    }
    let n = n_fft + hop_length * (n_frames - 1);
    let mut result = vec![0.0f32; n];

    let window_sq: Vec<f32> = hann(win_length).into_iter().map(|w| w * w).collect();
    let window_sq = pad_center(&window_sq, n_fft, PadMode::Constant)?;

    for i in 0..n_frames {
        let sample = i * hop_length;
        let window_end = n_fft.min(n - sample);
        for (acc, w) in result[sample..sample + window_end].iter_mut().zip(&window_sq) {
            *acc += *w;
        }
    }
    Ok(result)
}

/// Overlap-add `frames` into the pre-allocated `y`, frame `i` at offset
/// `i * hop_length`. Samples past the end of `y` are dropped.
pub fn overlap_add(y: &mut [f32], frames: &[Vec<f32>], hop_length: usize) {
    for (i, frame) in frames.iter().enumerate() {
        let sample = i * hop_length;
        if sample >= y.len() {
            break;
        }
        for (acc, v) in y[sample..].iter_mut().zip(frame) {
            *acc += *v;
        }
    }
}
