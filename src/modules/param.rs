//! Named parameter views and checkpoint assignment.

use crate::error::{DemucsError, Result};
use crate::modules::conv::ConvWeights;
use crate::weights::WeightTensor;
use burn::module::Param;
use burn::tensor::{backend::Backend, Tensor, TensorData};

/// A learnable tensor of any rank used by the model.
#[derive(Debug, Clone)]
pub enum ParamTensor<B: Backend> {
    Vector(Tensor<B, 1>),
    Matrix(Tensor<B, 2>),
    Kernel(Tensor<B, 3>),
}

impl<B: Backend> ParamTensor<B> {
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Self::Vector(tensor) => tensor.dims().to_vec(),
            Self::Matrix(tensor) => tensor.dims().to_vec(),
            Self::Kernel(tensor) => tensor.dims().to_vec(),
        }
    }

    pub fn num_elements(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn to_data(&self) -> TensorData {
        match self {
            Self::Vector(tensor) => tensor.to_data(),
            Self::Matrix(tensor) => tensor.to_data(),
            Self::Kernel(tensor) => tensor.to_data(),
        }
    }
}

/// Registry entry: checkpoint name and current value.
pub type NamedParam<B> = (String, ParamTensor<B>);

/// Append the weight and bias of a convolution under `prefix`.
pub fn push_conv<B: Backend>(out: &mut Vec<NamedParam<B>>, prefix: &str, weights: &ConvWeights<B>) {
    out.push((
        format!("{prefix}.weight"),
        ParamTensor::Kernel(weights.weight.val()),
    ));
    if let Some(bias) = &weights.bias {
        out.push((format!("{prefix}.bias"), ParamTensor::Vector(bias.val())));
    }
}

/// Replace a parameter with checkpoint values of the same shape.
pub fn assign<B: Backend, const D: usize>(
    slot: &mut Param<Tensor<B, D>>,
    name: &str,
    tensor: &WeightTensor,
    device: &B::Device,
) -> Result<()> {
    let expected = slot.val().dims();
    if tensor.shape != expected {
        return Err(DemucsError::weights(format!(
            "{name}: expected shape {expected:?}, got {:?}",
            tensor.shape
        )));
    }
    *slot = Param::from_tensor(tensor.to_tensor(device)?);
    Ok(())
}

/// Replace an optional bias; layers built without bias reject checkpoint biases.
pub fn assign_bias<B: Backend>(
    slot: &mut Option<Param<Tensor<B, 1>>>,
    name: &str,
    tensor: &WeightTensor,
    device: &B::Device,
) -> Result<()> {
    match slot {
        Some(param) => assign(param, name, tensor, device),
        None => Err(DemucsError::weights(format!(
            "{name}: layer was built without bias"
        ))),
    }
}

/// Assign `weight` or `bias` of a convolution.
pub fn assign_conv<B: Backend>(
    weights: &mut ConvWeights<B>,
    field: &str,
    name: &str,
    tensor: &WeightTensor,
    device: &B::Device,
) -> Result<()> {
    match field {
        "weight" => assign(&mut weights.weight, name, tensor, device),
        "bias" => assign_bias(&mut weights.bias, name, tensor, device),
        _ => Err(DemucsError::weights(format!("unknown parameter {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    #[test]
    fn assign_checks_shape() {
        let device = NdArrayDevice::default();
        let mut weights = ConvWeights::<TestBackend>::new(Tensor::zeros([2, 1, 3], &device), None);

        let good = WeightTensor::from_f32(&[1.0; 6], vec![2, 1, 3]);
        assign_conv(&mut weights, "weight", "conv.weight", &good, &device).unwrap();
        let values = weights.weight.val().into_data();
        assert_eq!(values.as_slice::<f32>().unwrap(), &[1.0; 6]);

        let bad = WeightTensor::from_f32(&[1.0; 6], vec![3, 1, 2]);
        let err = assign_conv(&mut weights, "weight", "conv.weight", &bad, &device).unwrap_err();
        assert!(err.to_string().contains("expected shape"));

        let bias = WeightTensor::from_f32(&[1.0; 2], vec![2]);
        assert!(assign_conv(&mut weights, "bias", "conv.bias", &bias, &device).is_err());
    }

    #[test]
    fn registry_counts_elements() {
        let device = NdArrayDevice::default();
        let weights = ConvWeights::<TestBackend>::new(
            Tensor::zeros([4, 2, 3], &device),
            Some(Tensor::zeros([4], &device)),
        );
        let mut params = Vec::new();
        push_conv(&mut params, "encoder.0.0", &weights);
        let names: Vec<&str> = params.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["encoder.0.0.weight", "encoder.0.0.bias"]);
        let total: usize = params.iter().map(|(_, p)| p.num_elements()).sum();
        assert_eq!(total, 28);
    }
}
