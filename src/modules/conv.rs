//! 1D convolution primitives with learnable weights.
//!
//! Weights use the reference checkpoint layout: `[out, in, kernel]` for
//! convolutions and `[in, out, kernel]` for transposed convolutions.

use crate::modules::init::{fan_in_bound, uniform};
use burn::module::Param;
use burn::tensor::{
    backend::Backend,
    module::{conv1d, conv_transpose1d},
    ops::{ConvOptions, ConvTransposeOptions},
    Tensor,
};
use rand::Rng;

/// Weight and optional bias of a convolutional layer.
#[derive(Debug, Clone)]
pub struct ConvWeights<B: Backend> {
    /// Kernel tensor.
    pub weight: Param<Tensor<B, 3>>,
    /// Optional bias `[out]`.
    pub bias: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> ConvWeights<B> {
    /// Wrap plain tensors as learnable parameters.
    pub fn new(weight: Tensor<B, 3>, bias: Option<Tensor<B, 1>>) -> Self {
        Self {
            weight: Param::from_tensor(weight),
            bias: bias.map(Param::from_tensor),
        }
    }

    /// Copy of these weights with the weight and bias divided by `scale`.
    pub fn scaled_down(&self, scale: f32) -> Self {
        let weight = self.weight.val().detach().div_scalar(scale);
        let bias = self
            .bias
            .as_ref()
            .map(|bias| bias.val().detach().div_scalar(scale));
        Self::new(weight, bias)
    }

    fn bias_val(&self) -> Option<Tensor<B, 1>> {
        self.bias.as_ref().map(|bias| bias.val())
    }
}

/// Shape hyperparameters shared by both convolution kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    /// Zero padding on both sides (convolutions only).
    pub padding: usize,
    pub bias: bool,
}

impl ConvConfig {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, stride: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding: 0,
            bias: true,
        }
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }
}

/// Strided 1D convolution.
#[derive(Debug, Clone)]
pub struct Conv1dOp<B: Backend> {
    pub config: ConvConfig,
    pub weights: ConvWeights<B>,
}

impl<B: Backend> Conv1dOp<B> {
    /// Randomly initialize with the default uniform bound `1/sqrt(in * kernel)`.
    pub fn init<R: Rng + ?Sized>(config: ConvConfig, rng: &mut R, device: &B::Device) -> Self {
        let bound = fan_in_bound(config.in_channels * config.kernel_size);
        let shape = [config.out_channels, config.in_channels, config.kernel_size];
        let weight = uniform(rng, shape, bound, device);
        let bias = config
            .bias
            .then(|| uniform(rng, [config.out_channels], bound, device));
        Self {
            config,
            weights: ConvWeights::new(weight, bias),
        }
    }

    /// Output time length for a given input length.
    pub fn output_len(&self, input_len: usize) -> usize {
        let padded = input_len + 2 * self.config.padding;
        if padded < self.config.kernel_size {
            return 0;
        }
        (padded - self.config.kernel_size) / self.config.stride + 1
    }

    /// Apply the convolution to `[batch, in, time]`.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        conv1d(
            input,
            self.weights.weight.val(),
            self.weights.bias_val(),
            ConvOptions::new([self.config.stride], [self.config.padding], [1], 1),
        )
    }
}

/// Strided 1D transposed convolution.
#[derive(Debug, Clone)]
pub struct ConvTranspose1dOp<B: Backend> {
    pub config: ConvConfig,
    pub weights: ConvWeights<B>,
}

impl<B: Backend> ConvTranspose1dOp<B> {
    /// Randomly initialize; the bound follows the `[in, out, kernel]` layout (`out * kernel`).
    pub fn init<R: Rng + ?Sized>(config: ConvConfig, rng: &mut R, device: &B::Device) -> Self {
        let bound = fan_in_bound(config.out_channels * config.kernel_size);
        let shape = [config.in_channels, config.out_channels, config.kernel_size];
        let weight = uniform(rng, shape, bound, device);
        let bias = config
            .bias
            .then(|| uniform(rng, [config.out_channels], bound, device));
        Self {
            config,
            weights: ConvWeights::new(weight, bias),
        }
    }

    /// Output time length for a given input length.
    pub fn output_len(&self, input_len: usize) -> usize {
        (input_len.saturating_sub(1)) * self.config.stride + self.config.kernel_size
    }

    /// Apply the transposed convolution to `[batch, in, time]`.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        conv_transpose1d(
            input,
            self.weights.weight.val(),
            self.weights.bias_val(),
            ConvTransposeOptions::new([self.config.stride], [0], [0], [1], 1),
        )
    }
}
