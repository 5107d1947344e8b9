//! High-level runtime wrapper for model bootstrapping and file denoising.
//!
//! This module provides a convenience-focused API for constructing a model
//! from a YAML config (with or without a checkpoint) and running it on raw
//! audio at any sample rate. It is intended to reduce boilerplate in CLIs.

use crate::audio::io::{WavEncoding, WavIo};
use crate::audio::resample::AudioResampler;
use crate::config::{load_config, resolve_relative_path, DenoiserConfig};
use crate::model::demucs::Demucs;
use crate::weights::load_state_dict;
use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use std::path::Path;
use std::time::Instant;

/// High-level denoising runtime that owns the model and configuration.
#[derive(Debug)]
pub struct DenoiseRuntime<B: Backend> {
    config: DenoiserConfig,
    model: Demucs<B>,
    device: B::Device,
}

impl<B: Backend> DenoiseRuntime<B> {
    /// Create a runtime from a config path; relative weight paths resolve against it.
    pub fn from_config_path(
        path: impl AsRef<Path>,
        seed: Option<u64>,
        device: &B::Device,
    ) -> Result<Self> {
        let path = path.as_ref();
        let config = load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        Self::from_config(config, Some(path), seed, device)
    }

    /// Create a runtime from an already-loaded config.
    ///
    /// Without `weights_path` the model is randomly initialized from `seed`
    /// (or from the OS when `seed` is `None`).
    pub fn from_config(
        config: DenoiserConfig,
        config_path: Option<&Path>,
        seed: Option<u64>,
        device: &B::Device,
    ) -> Result<Self> {
        let mut model = match seed {
            Some(seed) => Demucs::with_seed(config.model.clone(), seed, device)?,
            None => Demucs::new(config.model.clone(), device)?,
        };

        if let Some(weights) = &config.weights_path {
            let weights_path = match config_path {
                Some(config_path) => resolve_relative_path(config_path, weights),
                None => weights.into(),
            };
            let state = load_state_dict(&weights_path)
                .with_context(|| format!("failed to read weights {}", weights_path.display()))?;
            model.load_state_dict(&state, device)?;
            tracing::info!(path = %weights_path.display(), "loaded weights");
        } else {
            tracing::info!(seed, "no weights configured, using random initialization");
        }

        Ok(Self {
            config,
            model,
            device: device.clone(),
        })
    }

    /// Access the loaded configuration.
    pub fn config(&self) -> &DenoiserConfig {
        &self.config
    }

    /// Access the underlying model (advanced usage).
    pub fn model(&self) -> &Demucs<B> {
        &self.model
    }

    /// Denoise channel-major samples recorded at `sample_rate`.
    ///
    /// Returns a single channel at the input rate with the input length.
    pub fn denoise_samples(&self, samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Vec<f32>> {
        let Some(first) = samples.first() else {
            anyhow::bail!("No audio channels provided");
        };
        let input_len = first.len();
        if input_len == 0 {
            anyhow::bail!("Audio contains no samples");
        }
        if samples.iter().any(|channel| channel.len() != input_len) {
            anyhow::bail!("All channels must have the same length");
        }

        let model_rate = self.config.model.sample_rate as u32;
        let audio = AudioResampler::resample(samples, sample_rate, model_rate)?;
        let input = tensor_from_audio::<B>(audio, &self.device);

        let start = Instant::now();
        let output = self.model.forward(input)?;
        let denoised = audio_from_tensor(output)?;
        tracing::info!(
            samples = denoised.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "denoised"
        );

        let restored = AudioResampler::convert_audio(vec![denoised], model_rate, sample_rate, 1)?;
        let mut restored = AudioResampler::fit_length(restored, input_len);
        Ok(restored.pop().unwrap_or_default())
    }

    /// Read a WAV file, denoise it, and write the mono result next to the input rate.
    pub fn denoise_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        encoding: WavEncoding,
    ) -> Result<()> {
        let (samples, sample_rate) = WavIo::read_wav(input)?;
        let denoised = self.denoise_samples(samples, sample_rate)?;
        WavIo::write_wav_with(output, &[denoised], sample_rate, encoding)
    }
}

/// Convert per-channel samples into a `[1, channels, samples]` tensor.
fn tensor_from_audio<B: Backend>(samples: Vec<Vec<f32>>, device: &B::Device) -> Tensor<B, 3> {
    let channels = samples.len();
    let len = samples.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f32> = samples.into_iter().flatten().collect();
    Tensor::from_data(TensorData::new(flat, [1, channels, len]), device)
}

/// Flatten a `[1, 1, samples]` model output into host samples.
fn audio_from_tensor<B: Backend>(output: Tensor<B, 3>) -> Result<Vec<f32>> {
    output
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow::anyhow!("failed to read model output: {err:?}"))
}
