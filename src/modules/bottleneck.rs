//! Recurrent core applied to the deepest encoder representation.

use crate::error::{DemucsError, Result};
use crate::modules::init::{fan_in_bound, uniform};
use crate::modules::lstm::Lstm;
use crate::modules::param::{assign_bias, NamedParam, ParamTensor};
use crate::weights::WeightTensor;
use burn::module::Param;
use burn::tensor::{backend::Backend, Tensor};
use burn_nn::{Linear, LinearConfig};
use rand::Rng;

/// Number of stacked recurrent layers.
pub const RECURRENT_LAYERS: usize = 2;

/// Forward-only recurrence, or bidirectional recurrence followed by a projection.
#[derive(Debug, Clone)]
pub enum RecurrentBottleneck<B: Backend> {
    Causal(Lstm<B>),
    Bidirectional { lstm: Lstm<B>, linear: Linear<B> },
}

impl<B: Backend> RecurrentBottleneck<B> {
    pub fn init<R: Rng + ?Sized>(
        channels: usize,
        causal: bool,
        bias: bool,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let lstm = Lstm::init(
            channels,
            channels,
            RECURRENT_LAYERS,
            !causal,
            bias,
            rng,
            device,
        );
        if causal {
            return Self::Causal(lstm);
        }

        let mut linear = LinearConfig::new(2 * channels, channels)
            .with_bias(bias)
            .init::<B>(device);
        // Reference layout is `[out, in]`; burn stores `[in, out]`.
        let bound = fan_in_bound(2 * channels);
        let weight: Tensor<B, 2> = uniform(rng, [channels, 2 * channels], bound, device);
        linear.weight = Param::from_tensor(weight.transpose());
        if bias {
            linear.bias = Some(Param::from_tensor(uniform(rng, [channels], bound, device)));
        }
        Self::Bidirectional { lstm, linear }
    }

    pub fn is_causal(&self) -> bool {
        matches!(self, Self::Causal(_))
    }

    /// `[batch, channels, time] -> [batch, channels, time]`.
    #[tracing::instrument(skip_all)]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let time_major = input.permute([2, 0, 1]);
        let output = match self {
            Self::Causal(lstm) => lstm.forward(time_major),
            Self::Bidirectional { lstm, linear } => linear.forward(lstm.forward(time_major)),
        };
        output.permute([1, 2, 0])
    }

    pub fn named_parameters(&self, out: &mut Vec<NamedParam<B>>) {
        match self {
            Self::Causal(lstm) => lstm.named_parameters("rnn", out),
            Self::Bidirectional { lstm, linear } => {
                lstm.named_parameters("rnn", out);
                out.push((
                    "linear.weight".to_string(),
                    ParamTensor::Matrix(linear.weight.val().transpose()),
                ));
                if let Some(bias) = &linear.bias {
                    out.push(("linear.bias".to_string(), ParamTensor::Vector(bias.val())));
                }
            }
        }
    }

    /// Assign `rnn.*` or `linear.*` checkpoint tensors.
    pub fn load_param(
        &mut self,
        name: &str,
        tensor: &WeightTensor,
        device: &B::Device,
    ) -> Result<()> {
        if let Some(param) = name.strip_prefix("rnn.") {
            let lstm = match self {
                Self::Causal(lstm) | Self::Bidirectional { lstm, .. } => lstm,
            };
            return lstm.load_param(param, name, tensor, device);
        }
        let Self::Bidirectional { linear, .. } = self else {
            return Err(DemucsError::weights(format!(
                "{name}: causal model has no projection"
            )));
        };
        match name {
            "linear.weight" => {
                let weight: Tensor<B, 2> = tensor.to_tensor(device)?;
                let weight = weight.transpose();
                let expected = linear.weight.val().dims();
                if weight.dims() != expected {
                    return Err(DemucsError::weights(format!(
                        "{name}: expected shape {:?}, got {:?}",
                        [expected[1], expected[0]],
                        tensor.shape
                    )));
                }
                linear.weight = Param::from_tensor(weight);
                Ok(())
            }
            "linear.bias" => assign_bias(&mut linear.bias, name, tensor, device),
            _ => Err(DemucsError::weights(format!("unknown parameter {name}"))),
        }
    }
}
