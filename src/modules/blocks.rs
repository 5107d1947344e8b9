//! Encoder and decoder levels of the U-Net.
//!
//! Each level owns two convolutions. Their positions inside a level (`0` and
//! `2`) follow the checkpoint naming, where the activations occupy the slots
//! in between.

use crate::config::ModelConfig;
use crate::modules::conv::{Conv1dOp, ConvConfig, ConvTranspose1dOp, ConvWeights};
use burn::tensor::{activation, backend::Backend, Tensor};
use rand::Rng;

/// Gated linear unit over the channel axis: `a * sigmoid(b)` for `[a, b] = split(x)`.
pub fn glu<B: Backend>(input: Tensor<B, 3>) -> Tensor<B, 3> {
    let channels = input.dims()[1] / 2;
    let value = input.clone().narrow(1, 0, channels);
    let gate = input.narrow(1, channels, channels);
    value * activation::sigmoid(gate)
}

/// Shared contract of one pyramid level.
pub trait WaveBlock<B: Backend> {
    fn in_channels(&self) -> usize;
    fn out_channels(&self) -> usize;
    /// Time length produced for a given input length.
    fn output_len(&self, input_len: usize) -> usize;
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3>;
    /// Convolution weights keyed by their position inside the level.
    fn conv_weights(&self) -> [(usize, &ConvWeights<B>); 2];
    fn conv_weights_mut(&mut self) -> [(usize, &mut ConvWeights<B>); 2];
}

/// Strided conv, optional ReLU, then a channel-doubling conv and GLU.
#[derive(Debug, Clone)]
pub struct EncoderBlock<B: Backend> {
    pub conv: Conv1dOp<B>,
    pub glu_conv: Conv1dOp<B>,
    pub activate: bool,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn init<R: Rng + ?Sized>(
        config: &ModelConfig,
        level: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let chin = config.encoder_in_channels(level);
        let chout = config.encoder_out_channels(level);
        let conv = Conv1dOp::init(
            ConvConfig::new(chin, chout, config.kernel_conv, config.stride_conv)
                .with_bias(config.use_bias),
            rng,
            device,
        );
        let glu_conv = Conv1dOp::init(
            ConvConfig::new(chout, 2 * chout, config.kernel_glu, config.stride_glu)
                .with_padding(config.kernel_glu / 2)
                .with_bias(config.use_bias),
            rng,
            device,
        );
        Self {
            conv,
            glu_conv,
            activate: config.original || level > 0,
        }
    }
}

impl<B: Backend> WaveBlock<B> for EncoderBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv.config.in_channels
    }

    fn out_channels(&self) -> usize {
        self.conv.config.out_channels
    }

    fn output_len(&self, input_len: usize) -> usize {
        self.glu_conv.output_len(self.conv.output_len(input_len))
    }

    #[tracing::instrument(skip_all)]
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = self.conv.forward(input);
        if self.activate {
            x = activation::relu(x);
        }
        glu(self.glu_conv.forward(x))
    }

    fn conv_weights(&self) -> [(usize, &ConvWeights<B>); 2] {
        [(0, &self.conv.weights), (2, &self.glu_conv.weights)]
    }

    fn conv_weights_mut(&mut self) -> [(usize, &mut ConvWeights<B>); 2] {
        [(0, &mut self.conv.weights), (2, &mut self.glu_conv.weights)]
    }
}

/// Channel-doubling conv and GLU, then a transposed conv and optional ReLU.
#[derive(Debug, Clone)]
pub struct DecoderBlock<B: Backend> {
    pub glu_conv: Conv1dOp<B>,
    pub conv_tr: ConvTranspose1dOp<B>,
    pub activate: bool,
}

impl<B: Backend> DecoderBlock<B> {
    /// Build the decoder mirroring encoder level `level`; level 0 emits the signal.
    pub fn init<R: Rng + ?Sized>(
        config: &ModelConfig,
        level: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let chin = config.encoder_out_channels(level);
        let chout = config.encoder_in_channels(level);
        let glu_conv = Conv1dOp::init(
            ConvConfig::new(chin, 2 * chin, config.kernel_glu, config.stride_glu)
                .with_padding(config.kernel_glu / 2)
                .with_bias(config.use_bias),
            rng,
            device,
        );
        let conv_tr = ConvTranspose1dOp::init(
            ConvConfig::new(chin, chout, config.kernel_conv, config.stride_conv)
                .with_bias(config.use_bias),
            rng,
            device,
        );
        Self {
            glu_conv,
            conv_tr,
            activate: level > 0,
        }
    }
}

impl<B: Backend> WaveBlock<B> for DecoderBlock<B> {
    fn in_channels(&self) -> usize {
        self.glu_conv.config.in_channels
    }

    fn out_channels(&self) -> usize {
        self.conv_tr.config.out_channels
    }

    fn output_len(&self, input_len: usize) -> usize {
        self.conv_tr.output_len(self.glu_conv.output_len(input_len))
    }

    #[tracing::instrument(skip_all)]
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = glu(self.glu_conv.forward(input));
        let x = self.conv_tr.forward(x);
        if self.activate {
            activation::relu(x)
        } else {
            x
        }
    }

    fn conv_weights(&self) -> [(usize, &ConvWeights<B>); 2] {
        [(0, &self.glu_conv.weights), (2, &self.conv_tr.weights)]
    }

    fn conv_weights_mut(&mut self) -> [(usize, &mut ConvWeights<B>); 2] {
        [(0, &mut self.glu_conv.weights), (2, &mut self.conv_tr.weights)]
    }
}
