//! Waveform sinks: where synthesized chunks go once they are audio.
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use base64::{engine::general_purpose, Engine as _};
use tracing::info;

use crate::vocoder::Waveform;

/// Accepts finished waveforms, one per synthesized chunk.
pub trait WaveformSink {
    fn write(&mut self, waveform: &Waveform) -> anyhow::Result<()>;
}

fn float_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Encode as mono 32-bit float WAV (RIFF) bytes.
pub fn encode_wav(waveform: &Waveform) -> anyhow::Result<Vec<u8>> {
    if waveform.is_empty() {
        bail!("Samples array is empty, nothing to write");
    }

    // WAV header (44 bytes) + 4 bytes per sample
    let estimated_size = 44 + waveform.samples.len() * 4;
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(estimated_size));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, float_spec(waveform.sample_rate))
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;
        for &s in &waveform.samples {
            writer
                .write_sample(s)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }
    Ok(cursor.into_inner())
}

/// Convenience: WAV bytes as standard Base64.
pub fn encode_wav_base64(waveform: &Waveform) -> anyhow::Result<String> {
    Ok(general_purpose::STANDARD.encode(encode_wav(waveform)?))
}

/// Writes every waveform to its own numbered WAV file in a directory.
#[derive(Debug)]
pub struct WavFileSink {
    dir: PathBuf,
    prefix: String,
    written: Vec<PathBuf>,
}

impl WavFileSink {
    /// Create the sink, creating `dir` if needed. Files are named
    /// `{prefix}_000.wav`, `{prefix}_001.wav`, ...
    pub fn new<P: AsRef<Path>>(dir: P, prefix: &str) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            written: Vec::new(),
        })
    }

    /// Paths written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl WaveformSink for WavFileSink {
    fn write(&mut self, waveform: &Waveform) -> anyhow::Result<()> {
        let path = self
            .dir
            .join(format!("{}_{:03}.wav", self.prefix, self.written.len()));
        let bytes = encode_wav(waveform)?;
        fs::write(&path, bytes).with_context(|| format!("{}: Write failure", path.display()))?;
        info!(
            path = %path.display(),
            duration_ms = waveform.duration_ms(),
            "Wrote waveform"
        );
        self.written.push(path);
        Ok(())
    }
}

/// Keeps waveforms in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub waveforms: Vec<Waveform>,
}

impl WaveformSink for MemorySink {
    fn write(&mut self, waveform: &Waveform) -> anyhow::Result<()> {
        if waveform.is_empty() {
            bail!("Samples array is empty, nothing to write");
        }
        self.waveforms.push(waveform.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone() -> Waveform {
        let samples = (0..2029)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        Waveform::new(samples, 11025)
    }

    #[test]
    fn test_encode_wav_is_float_pcm() {
        let waveform = tone();
        let bytes = encode_wav(&waveform).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 11025);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, waveform.samples);
    }

    #[test]
    fn test_encode_wav_rejects_empty() {
        let err = encode_wav(&Waveform::new(Vec::new(), 22050)).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_encode_wav_base64() {
        let encoded = encode_wav_base64(&tone()).unwrap();
        let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(&decoded[..4], b"RIFF");
    }

    #[test]
    fn test_file_sink_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = WavFileSink::new(dir.path().join("out"), "chunk").unwrap();
        sink.write(&tone()).unwrap();
        sink.write(&tone()).unwrap();

        assert_eq!(sink.written().len(), 2);
        assert!(sink.written()[1].ends_with("chunk_001.wav"));
        let reader = hound::WavReader::open(&sink.written()[0]).unwrap();
        assert_eq!(reader.len(), 2029);
    }

    #[test]
    fn test_memory_sink_rejects_empty() {
        let mut sink = MemorySink::default();
        assert!(sink.write(&Waveform::new(Vec::new(), 22050)).is_err());
        sink.write(&tone()).unwrap();
        assert_eq!(sink.waveforms.len(), 1);
    }
}
