use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Sample encoding used when writing WAV files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WavEncoding {
    /// 16-bit PCM, clipped to `[-1, 1]`.
    #[default]
    Pcm16,
    /// 32-bit IEEE float, written unclipped.
    Float32,
}

#[derive(Debug, Default)]
pub struct WavIo;

impl WavIo {
    /// Read a WAV file as channel-major `f32` samples in `[-1, 1]` plus its sample rate.
    pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<Vec<f32>>, u32)> {
        let path = path.as_ref();
        let mut reader = WavReader::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            anyhow::bail!("{} declares zero channels", path.display());
        }
        let mut samples = vec![Vec::with_capacity(reader.duration() as usize); channels];

        match spec.sample_format {
            SampleFormat::Float => {
                for (idx, sample) in reader.samples::<f32>().enumerate() {
                    samples[idx % channels].push(sample?);
                }
            }
            SampleFormat::Int => {
                let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                for (idx, sample) in reader.samples::<i32>().enumerate() {
                    samples[idx % channels].push(sample? as f32 / max);
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            channels,
            sample_rate = spec.sample_rate,
            frames = samples[0].len(),
            "read wav"
        );
        Ok((samples, spec.sample_rate))
    }

    /// Write channel-major samples as 16-bit PCM.
    pub fn write_wav(path: impl AsRef<Path>, samples: &[Vec<f32>], sample_rate: u32) -> Result<()> {
        Self::write_wav_with(path, samples, sample_rate, WavEncoding::Pcm16)
    }

    pub fn write_wav_with(
        path: impl AsRef<Path>,
        samples: &[Vec<f32>],
        sample_rate: u32,
        encoding: WavEncoding,
    ) -> Result<()> {
        let Some(first) = samples.first() else {
            anyhow::bail!("No audio channels provided");
        };
        let len = first.len();
        if samples.iter().any(|channel| channel.len() != len) {
            anyhow::bail!("Channel length mismatch in WAV write");
        }

        let (bits_per_sample, sample_format) = match encoding {
            WavEncoding::Pcm16 => (16, SampleFormat::Int),
            WavEncoding::Float32 => (32, SampleFormat::Float),
        };
        let spec = WavSpec {
            channels: samples.len() as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        };
        let path = path.as_ref();
        let mut writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut clipped = 0usize;
        for idx in 0..len {
            for channel in samples {
                let value = channel[idx];
                match encoding {
                    WavEncoding::Pcm16 => {
                        if value.abs() > 1.0 {
                            clipped += 1;
                        }
                        let scaled = (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                        writer.write_sample(scaled)?;
                    }
                    WavEncoding::Float32 => writer.write_sample(value)?,
                }
            }
        }
        writer.finalize()?;

        if clipped > 0 {
            tracing::warn!(path = %path.display(), clipped, "clipped samples while writing wav");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{WavEncoding, WavIo};
    use tempfile::tempdir;

    #[test]
    fn wav_roundtrip_preserves_shape() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.wav");
        let samples = vec![vec![0.0_f32, 0.5, -0.25], vec![0.1, -0.1, 0.2]];
        WavIo::write_wav(&path, &samples, 16000).expect("write wav");

        let (decoded, sample_rate) = WavIo::read_wav(&path).expect("read wav");
        assert_eq!(sample_rate, 16000);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].len(), 3);
        assert!((decoded[0][1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn float_encoding_is_lossless() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("float.wav");
        let samples = vec![vec![1.5_f32, -0.125, 0.3]];
        WavIo::write_wav_with(&path, &samples, 8000, WavEncoding::Float32).expect("write wav");

        let (decoded, _) = WavIo::read_wav(&path).expect("read wav");
        assert_eq!(decoded, samples);
    }

    #[test]
    fn rejects_ragged_channels() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.wav");
        let samples = vec![vec![0.0_f32; 3], vec![0.0; 2]];
        assert!(WavIo::write_wav(&path, &samples, 16000).is_err());
        assert!(WavIo::write_wav(&path, &[], 16000).is_err());
    }
}
