//! The waveform-domain U-Net denoiser.
//!
//! A signal is mixed down to mono, optionally normalized by its standard
//! deviation, zero-padded to a valid length, upsampled, then passed through
//! `depth` strided encoder levels, a recurrent bottleneck and `depth`
//! transposed decoder levels joined to the encoder by additive skips. The
//! result is downsampled, trimmed to the input length and rescaled.

use crate::config::{ModelConfig, ResampleFactor};
use crate::error::{DemucsError, Result};
use crate::model::length::ValidLengthCalculator;
use crate::model::skips::SkipStack;
use crate::modules::blocks::{DecoderBlock, EncoderBlock, WaveBlock};
use crate::modules::bottleneck::RecurrentBottleneck;
use crate::modules::conv::ConvWeights;
use crate::modules::param::{assign_conv, push_conv, NamedParam};
use crate::modules::rescale::WeightRescaler;
use crate::modules::resample::SincResampler;
use crate::weights::WeightTensor;
use burn::tensor::{backend::Backend, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Time lengths and skip bookkeeping observed during one forward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardTrace {
    pub input_length: usize,
    pub valid_length: usize,
    /// Length entering the first encoder level.
    pub upsampled_length: usize,
    /// Output length of each encoder level, signal side first.
    pub encoder_lengths: Vec<usize>,
    /// Output length of each decoder level, in execution order.
    pub decoder_lengths: Vec<usize>,
    pub skips_pushed: usize,
    pub skips_popped: usize,
}

/// Mono, normalized, padded and upsampled input plus its restore scale.
struct Prepared<B: Backend> {
    signal: Tensor<B, 3>,
    scale: Option<Tensor<B, 3>>,
    length: usize,
    valid_length: usize,
}

#[derive(Debug, Clone)]
pub struct Demucs<B: Backend> {
    config: ModelConfig,
    resample: ResampleFactor,
    lengths: ValidLengthCalculator,
    resampler: SincResampler<B>,
    /// Encoder levels, signal side first.
    pub encoder: Vec<EncoderBlock<B>>,
    /// Decoder levels in execution order; `decoder[0]` mirrors the deepest encoder level.
    pub decoder: Vec<DecoderBlock<B>>,
    pub bottleneck: RecurrentBottleneck<B>,
}

impl<B: Backend> Demucs<B> {
    /// Build a randomly initialized model seeded from the OS.
    pub fn new(config: ModelConfig, device: &B::Device) -> Result<Self> {
        Self::with_rng(config, &mut StdRng::from_os_rng(), device)
    }

    /// Build a randomly initialized model with a reproducible seed.
    pub fn with_seed(config: ModelConfig, seed: u64, device: &B::Device) -> Result<Self> {
        Self::with_rng(config, &mut StdRng::seed_from_u64(seed), device)
    }

    pub fn with_rng<R: Rng + ?Sized>(
        config: ModelConfig,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Self> {
        let resample = config.validate()?;

        let mut encoder = Vec::with_capacity(config.depth);
        let mut decoder = Vec::with_capacity(config.depth);
        for level in 0..config.depth {
            tracing::debug!(
                level,
                chin = config.encoder_in_channels(level),
                chout = config.encoder_out_channels(level),
                "building level"
            );
            encoder.push(EncoderBlock::init(&config, level, rng, device));
            decoder.push(DecoderBlock::init(&config, level, rng, device));
        }
        decoder.reverse();

        // Only convolutions are rescaled.
        let bottleneck = RecurrentBottleneck::init(
            config.bottleneck_channels(),
            config.causal,
            config.use_bias,
            rng,
            device,
        );

        tracing::debug!(causal = bottleneck.is_causal(), "built bottleneck");

        let mut model = Self {
            lengths: ValidLengthCalculator::new(&config),
            resampler: SincResampler::new(config.resample_zeros, device),
            resample,
            config,
            encoder,
            decoder,
            bottleneck,
        };
        if let Some(rescaler) = WeightRescaler::new(model.config.rescale) {
            rescaler.apply(model.conv_weights_mut())?;
        }
        Ok(model)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// See [`ValidLengthCalculator::valid_length`].
    pub fn valid_length(&self, length: usize) -> usize {
        self.lengths.valid_length(length)
    }

    /// Final encoder representation `[batch, bottleneck_channels, frames]`.
    ///
    /// Accepts `[batch, time]` or `[batch, channels, time]`.
    #[tracing::instrument(skip_all)]
    pub fn encode<const D: usize>(&self, input: Tensor<B, D>) -> Result<Tensor<B, 3>> {
        let prepared = self.prepare(input)?;
        let mut x = prepared.signal;
        for block in &self.encoder {
            x = run_level(block, x)?;
        }
        Ok(x)
    }

    /// Denoise a signal, returning `[batch, 1, time]` with the input's time length.
    ///
    /// Accepts `[batch, time]` or `[batch, channels, time]`.
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Result<Tensor<B, 3>> {
        self.forward_traced(input).map(|(output, _)| output)
    }

    /// [`Demucs::forward`] plus the lengths and skip counts seen along the way.
    #[tracing::instrument(skip_all)]
    pub fn forward_traced<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Result<(Tensor<B, 3>, ForwardTrace)> {
        let prepared = self.prepare(input)?;
        let mut trace = ForwardTrace {
            input_length: prepared.length,
            valid_length: prepared.valid_length,
            upsampled_length: prepared.signal.dims()[2],
            ..ForwardTrace::default()
        };

        let mut skips = SkipStack::new(self.config.depth);
        let mut x = prepared.signal;
        for block in &self.encoder {
            x = run_level(block, x)?;
            trace.encoder_lengths.push(x.dims()[2]);
            skips.push(x.clone())?;
        }

        x = self.bottleneck.forward(x);

        for block in &self.decoder {
            let skip = skips.pop()?;
            let [_, _, time] = x.dims();
            let skip_time = skip.dims()[2];
            if skip_time < time {
                return Err(DemucsError::shape(
                    format!("decoder input of length {time} exceeds its skip"),
                    &skip.dims(),
                ));
            }
            x = run_level(block, x + skip.narrow(2, 0, time))?;
            trace.decoder_lengths.push(x.dims()[2]);
        }
        let (pushed, popped) = skips.finish()?;
        trace.skips_pushed = pushed;
        trace.skips_popped = popped;

        for _ in 0..self.resample.stages() {
            x = self.resampler.downsample2(x);
        }
        let x = x.narrow(2, 0, prepared.length);
        let output = match prepared.scale {
            Some(scale) => x * scale,
            None => x,
        };
        Ok((output, trace))
    }

    /// Shared front end of [`Demucs::encode`] and [`Demucs::forward`].
    fn prepare<const D: usize>(&self, input: Tensor<B, D>) -> Result<Prepared<B>> {
        let dims = input.dims();
        let [batch, channels, length] = match dims.as_slice() {
            [batch, length] => [*batch, 1, *length],
            [batch, channels, length] => [*batch, *channels, *length],
            _ => {
                return Err(DemucsError::shape(
                    "expected [batch, time] or [batch, channels, time]",
                    &dims,
                ))
            }
        };
        if batch == 0 || channels == 0 || length == 0 {
            return Err(DemucsError::shape("empty signal", &dims));
        }

        let mono = input.reshape([batch, channels, length]).mean_dim(1);
        let (mut x, scale) = if self.config.normalize {
            let std = time_std(mono.clone());
            let x = mono / std.clone().add_scalar(self.config.floor);
            (x, Some(std))
        } else {
            (mono, None)
        };

        let valid_length = self.lengths.valid_length(length);
        if valid_length > length {
            let pad = Tensor::zeros([batch, 1, valid_length - length], &x.device());
            x = Tensor::cat(vec![x, pad], 2);
        }
        for _ in 0..self.resample.stages() {
            x = self.resampler.upsample2(x);
        }

        Ok(Prepared {
            signal: x,
            scale,
            length,
            valid_length,
        })
    }

    /// Every learnable tensor under its checkpoint name.
    pub fn named_parameters(&self) -> Vec<NamedParam<B>> {
        let mut params = Vec::new();
        for (index, block) in self.encoder.iter().enumerate() {
            for (position, weights) in block.conv_weights() {
                push_conv(&mut params, &format!("encoder.{index}.{position}"), weights);
            }
        }
        for (index, block) in self.decoder.iter().enumerate() {
            for (position, weights) in block.conv_weights() {
                push_conv(&mut params, &format!("decoder.{index}.{position}"), weights);
            }
        }
        self.bottleneck.named_parameters(&mut params);
        params
    }

    pub fn num_parameters(&self) -> usize {
        self.named_parameters()
            .iter()
            .map(|(_, param)| param.num_elements())
            .sum()
    }

    /// Mutable registry of every convolution, encoder levels first.
    pub fn conv_weights_mut(&mut self) -> Vec<&mut ConvWeights<B>> {
        let mut convs = Vec::with_capacity(4 * self.config.depth);
        for block in self.encoder.iter_mut() {
            convs.extend(block.conv_weights_mut().map(|(_, weights)| weights));
        }
        for block in self.decoder.iter_mut() {
            convs.extend(block.conv_weights_mut().map(|(_, weights)| weights));
        }
        convs
    }

    /// Replace every parameter with checkpoint values.
    ///
    /// # Errors
    ///
    /// Returns [`DemucsError::Weights`] for unknown names, shape mismatches,
    /// or parameters absent from `state`.
    pub fn load_state_dict(
        &mut self,
        state: &HashMap<String, WeightTensor>,
        device: &B::Device,
    ) -> Result<()> {
        for (name, tensor) in state {
            self.load_param(name, tensor, device)?;
        }

        let loaded: HashSet<&str> = state.keys().map(String::as_str).collect();
        let missing: Vec<String> = self
            .named_parameters()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| !loaded.contains(name.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(DemucsError::weights(format!(
                "missing parameters: {}",
                missing.join(", ")
            )));
        }
        tracing::debug!(tensors = state.len(), "applied state dict");
        Ok(())
    }

    fn load_param(&mut self, name: &str, tensor: &WeightTensor, device: &B::Device) -> Result<()> {
        let unknown = || DemucsError::weights(format!("unknown parameter {name}"));
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [side @ ("encoder" | "decoder"), index, position, field] => {
                let index: usize = index.parse().map_err(|_| unknown())?;
                let position: usize = position.parse().map_err(|_| unknown())?;
                let convs = match *side {
                    "encoder" => self
                        .encoder
                        .get_mut(index)
                        .ok_or_else(unknown)?
                        .conv_weights_mut(),
                    _ => self
                        .decoder
                        .get_mut(index)
                        .ok_or_else(unknown)?
                        .conv_weights_mut(),
                };
                let weights = convs
                    .into_iter()
                    .find(|(slot, _)| *slot == position)
                    .map(|(_, weights)| weights)
                    .ok_or_else(unknown)?;
                assign_conv(weights, field, name, tensor, device)
            }
            ["rnn" | "linear", _] => self.bottleneck.load_param(name, tensor, device),
            _ => Err(unknown()),
        }
    }
}

/// Run one level, checking its channel and length contract.
fn run_level<B: Backend>(block: &impl WaveBlock<B>, input: Tensor<B, 3>) -> Result<Tensor<B, 3>> {
    let [_, channels, time] = input.dims();
    if channels != block.in_channels() {
        return Err(DemucsError::shape(
            format!("level expects {} channels", block.in_channels()),
            &input.dims(),
        ));
    }
    let expected = [block.out_channels(), block.output_len(time)];
    let output = block.forward(input);
    let [_, channels, time] = output.dims();
    if [channels, time] != expected {
        return Err(DemucsError::shape(
            format!("level output differs from expected {expected:?}"),
            &output.dims(),
        ));
    }
    Ok(output)
}

/// Unbiased standard deviation over time, `[B, 1, T] -> [B, 1, 1]`.
fn time_std<B: Backend>(signal: Tensor<B, 3>) -> Tensor<B, 3> {
    let length = signal.dims()[2];
    let mean = signal.clone().mean_dim(2);
    let centered = signal - mean;
    centered
        .powi_scalar(2)
        .sum_dim(2)
        .div_scalar(length.saturating_sub(1).max(1) as f32)
        .sqrt()
}
