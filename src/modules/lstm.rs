//! Multi-layer LSTM over time-major sequences.
//!
//! Gate order and parameter naming follow the common checkpoint layout:
//! gates are packed as `[input, forget, cell, output]` along the first axis of
//! `weight_ih_l{k}` / `weight_hh_l{k}`, and the reverse direction of a
//! bidirectional layer carries a `_reverse` suffix.

use crate::error::{DemucsError, Result};
use crate::modules::init::{fan_in_bound, uniform};
use crate::modules::param::{assign, assign_bias, NamedParam, ParamTensor};
use crate::weights::WeightTensor;
use burn::module::Param;
use burn::tensor::{activation, backend::Backend, Tensor};
use rand::Rng;

/// One direction of one LSTM layer.
#[derive(Debug, Clone)]
pub struct LstmCell<B: Backend> {
    pub weight_ih: Param<Tensor<B, 2>>,
    pub weight_hh: Param<Tensor<B, 2>>,
    pub bias_ih: Option<Param<Tensor<B, 1>>>,
    pub bias_hh: Option<Param<Tensor<B, 1>>>,
    hidden_size: usize,
}

impl<B: Backend> LstmCell<B> {
    pub fn init<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        bias: bool,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let bound = fan_in_bound(hidden_size);
        let gates = 4 * hidden_size;
        let weight_ih = uniform(rng, [gates, input_size], bound, device);
        let weight_hh = uniform(rng, [gates, hidden_size], bound, device);
        let (bias_ih, bias_hh) = if bias {
            (
                Some(Param::from_tensor(uniform(rng, [gates], bound, device))),
                Some(Param::from_tensor(uniform(rng, [gates], bound, device))),
            )
        } else {
            (None, None)
        };
        Self {
            weight_ih: Param::from_tensor(weight_ih),
            weight_hh: Param::from_tensor(weight_hh),
            bias_ih,
            bias_hh,
            hidden_size,
        }
    }

    /// Run over `[time, batch, input]` from zero state; returns `[time, batch, hidden]`.
    ///
    /// With `reverse`, time is scanned back to front and outputs stay aligned
    /// with their input positions.
    pub fn forward(&self, input: Tensor<B, 3>, reverse: bool) -> Tensor<B, 3> {
        let [seq_len, batch, input_size] = input.dims();
        let hidden = self.hidden_size;
        let device = input.device();

        // Input contributions for every step in a single matmul.
        let mut gates_x = input
            .reshape([seq_len * batch, input_size])
            .matmul(self.weight_ih.val().transpose());
        for bias in [&self.bias_ih, &self.bias_hh].into_iter().flatten() {
            gates_x = gates_x + bias.val().unsqueeze::<2>();
        }
        let gates_x = gates_x.reshape([seq_len, batch, 4 * hidden]);
        let weight_hh = self.weight_hh.val().transpose();

        let mut h = Tensor::<B, 2>::zeros([batch, hidden], &device);
        let mut c = Tensor::<B, 2>::zeros([batch, hidden], &device);
        let mut outputs = Vec::with_capacity(seq_len);
        let steps: Vec<usize> = if reverse {
            (0..seq_len).rev().collect()
        } else {
            (0..seq_len).collect()
        };
        for t in steps {
            let gates = gates_x
                .clone()
                .narrow(0, t, 1)
                .reshape([batch, 4 * hidden])
                + h.matmul(weight_hh.clone());
            let i = activation::sigmoid(gates.clone().narrow(1, 0, hidden));
            let f = activation::sigmoid(gates.clone().narrow(1, hidden, hidden));
            let g = gates.clone().narrow(1, 2 * hidden, hidden).tanh();
            let o = activation::sigmoid(gates.narrow(1, 3 * hidden, hidden));
            c = f * c + i * g;
            h = o * c.clone().tanh();
            outputs.push(h.clone());
        }
        if reverse {
            outputs.reverse();
        }
        Tensor::stack(outputs, 0)
    }

    fn push_named(&self, out: &mut Vec<NamedParam<B>>, prefix: &str, suffix: &str) {
        out.push((
            format!("{prefix}.weight_ih{suffix}"),
            ParamTensor::Matrix(self.weight_ih.val()),
        ));
        out.push((
            format!("{prefix}.weight_hh{suffix}"),
            ParamTensor::Matrix(self.weight_hh.val()),
        ));
        for (kind, bias) in [("bias_ih", &self.bias_ih), ("bias_hh", &self.bias_hh)] {
            if let Some(bias) = bias {
                out.push((
                    format!("{prefix}.{kind}{suffix}"),
                    ParamTensor::Vector(bias.val()),
                ));
            }
        }
    }

    fn assign(
        &mut self,
        kind: &str,
        name: &str,
        tensor: &WeightTensor,
        device: &B::Device,
    ) -> Result<()> {
        match kind {
            "weight_ih" => assign(&mut self.weight_ih, name, tensor, device),
            "weight_hh" => assign(&mut self.weight_hh, name, tensor, device),
            "bias_ih" => assign_bias(&mut self.bias_ih, name, tensor, device),
            "bias_hh" => assign_bias(&mut self.bias_hh, name, tensor, device),
            _ => Err(DemucsError::weights(format!("unknown parameter {name}"))),
        }
    }
}

/// Forward cell plus the optional reverse cell of one stacked layer.
#[derive(Debug, Clone)]
pub struct LstmLayer<B: Backend> {
    pub forward: LstmCell<B>,
    pub reverse: Option<LstmCell<B>>,
}

/// Stacked, optionally bidirectional LSTM.
#[derive(Debug, Clone)]
pub struct Lstm<B: Backend> {
    pub layers: Vec<LstmLayer<B>>,
}

impl<B: Backend> Lstm<B> {
    pub fn init<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        bidirectional: bool,
        bias: bool,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let directions = if bidirectional { 2 } else { 1 };
        let layers = (0..num_layers)
            .map(|layer| {
                let layer_input = if layer == 0 {
                    input_size
                } else {
                    hidden_size * directions
                };
                let forward = LstmCell::init(layer_input, hidden_size, bias, rng, device);
                let reverse = bidirectional
                    .then(|| LstmCell::init(layer_input, hidden_size, bias, rng, device));
                LstmLayer { forward, reverse }
            })
            .collect();
        Self { layers }
    }

    /// `[time, batch, input] -> [time, batch, hidden * directions]`.
    #[tracing::instrument(name = "lstm_forward", skip_all)]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = input;
        for layer in &self.layers {
            let forward = layer.forward.forward(x.clone(), false);
            x = match &layer.reverse {
                Some(reverse) => Tensor::cat(vec![forward, reverse.forward(x, true)], 2),
                None => forward,
            };
        }
        x
    }

    pub fn named_parameters(&self, prefix: &str, out: &mut Vec<NamedParam<B>>) {
        for (index, layer) in self.layers.iter().enumerate() {
            layer.forward.push_named(out, prefix, &format!("_l{index}"));
            if let Some(reverse) = &layer.reverse {
                reverse.push_named(out, prefix, &format!("_l{index}_reverse"));
            }
        }
    }

    /// Assign a checkpoint tensor named like `weight_ih_l1_reverse` (without prefix).
    pub fn load_param(
        &mut self,
        param: &str,
        name: &str,
        tensor: &WeightTensor,
        device: &B::Device,
    ) -> Result<()> {
        let unknown = || DemucsError::weights(format!("unknown parameter {name}"));
        let (kind, rest) = param.rsplit_once("_l").ok_or_else(unknown)?;
        let (index, reverse) = match rest.strip_suffix("_reverse") {
            Some(index) => (index, true),
            None => (rest, false),
        };
        let index: usize = index.parse().map_err(|_| unknown())?;
        let layer = self.layers.get_mut(index).ok_or_else(unknown)?;
        let cell = if reverse {
            layer.reverse.as_mut().ok_or_else(unknown)?
        } else {
            &mut layer.forward
        };
        cell.assign(kind, name, tensor, device)
    }
}
