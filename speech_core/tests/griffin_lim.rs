//! Phase reconstruction tests against the public STFT
//! Run with: cargo test --test griffin_lim

mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use num_complex::Complex32;
use speech_core::stft::{istft, stft};
use speech_core::{StftParams, Vocoder, VocoderConfig};

fn small_config(iterations: usize) -> VocoderConfig {
    VocoderConfig {
        n_fft: 256,
        hop_length: 64,
        win_length: 256,
        iterations,
        ..VocoderConfig::default()
    }
}

fn chord(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / 8000.0;
            0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                + 0.3 * (2.0 * std::f32::consts::PI * 1250.0 * t).sin()
                + 0.1 * (2.0 * std::f32::consts::PI * 3100.0 * t).cos()
        })
        .collect()
}

fn magnitude(spectrum: &[Vec<Complex32>]) -> Array2<f32> {
    let rows = spectrum.len();
    let cols = spectrum.first().map_or(0, Vec::len);
    Array2::from_shape_fn((rows, cols), |(r, c)| spectrum[r][c].norm())
}

/// ||S - |STFT(x)||| / ||S||
fn spectral_convergence(target: &Array2<f32>, x: &[f32], params: StftParams) -> f32 {
    let estimate = magnitude(&stft(x, params).unwrap());
    assert_eq!(estimate.dim(), target.dim());
    let diff: f32 = (target - &estimate).iter().map(|v| v * v).sum();
    let norm: f32 = target.iter().map(|v| v * v).sum();
    (diff / norm).sqrt()
}

#[test]
fn test_stft_round_trip_with_vocoder_params() {
    let params = VocoderConfig::default().stft_params();
    let y = chord(22050);
    let spectrum = stft(&y, params).unwrap();
    assert_eq!(spectrum.len(), 1 + y.len() / params.hop_length);
    assert_eq!(spectrum[0].len(), params.bins());

    let restored = istft(&spectrum, params).unwrap();
    assert_eq!(restored.len(), params.hop_length * (spectrum.len() - 1));
    for (a, b) in restored.iter().zip(&y) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-3);
    }
}

#[test]
fn test_zero_iterations_is_zero_phase_inverse() {
    let config = small_config(0);
    let vocoder = Vocoder::new(config).unwrap();
    let target = magnitude(&stft(&chord(4096), config.stft_params()).unwrap());

    let zero_phase: Vec<Vec<Complex32>> = target
        .outer_iter()
        .map(|row| row.iter().map(|&m| Complex32::new(m, 0.0)).collect())
        .collect();
    let expected = istft(&zero_phase, config.stft_params()).unwrap();

    let y = vocoder.griffin_lim(&target).unwrap();
    assert_eq!(y.len(), expected.len());
    for (a, b) in y.iter().zip(&expected) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn test_iterations_reduce_spectral_error() {
    common::init_tracing();
    let params = small_config(0).stft_params();
    let target = magnitude(&stft(&chord(4096), params).unwrap());

    let before = Vocoder::new(small_config(0)).unwrap().griffin_lim(&target).unwrap();
    let after = Vocoder::new(small_config(30)).unwrap().griffin_lim(&target).unwrap();

    let error_before = spectral_convergence(&target, &before, params);
    let error_after = spectral_convergence(&target, &after, params);
    assert!(
        error_after < error_before,
        "error went from {error_before} to {error_after}"
    );
}

#[test]
fn test_default_passes_converge_on_two_tones() {
    let config = VocoderConfig::default();
    assert_eq!(config.iterations, 50);
    let params = config.stft_params();
    let sample_rate = config.sample_rate as f32;
    let y: Vec<f32> = (0..22050)
        .map(|i| {
            let t = i as f32 / sample_rate;
            0.6 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                + 0.3 * (2.0 * std::f32::consts::PI * 1250.0 * t).sin()
        })
        .collect();
    let target = magnitude(&stft(&y, params).unwrap());

    let x = Vocoder::new(config).unwrap().griffin_lim(&target).unwrap();
    let error = spectral_convergence(&target, &x, params);
    assert!(error < 0.25, "spectral convergence {error} after 50 passes");
}

#[test]
fn test_denormalized_spectrum_reconstructs() {
    let vocoder = Vocoder::new(small_config(1)).unwrap();
    let spectrum = Array2::from_shape_fn((12, 129), |(r, c)| ((r + c) % 5) as f32 / 5.0);
    let magnitude = vocoder.denormalize(&spectrum);
    let y = vocoder.griffin_lim(&magnitude).unwrap();
    assert_eq!(y.len(), 64 * 11);
    assert!(y.iter().all(|v| v.is_finite()));
}
