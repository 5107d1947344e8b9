//! SafeTensors weight loading.
//!
//! Checkpoints use the reference layer naming (`encoder.{i}.{j}.weight`,
//! `rnn.weight_ih_l{k}`, `linear.bias`, ...); an optional wrapper prefix is
//! stripped so exported training checkpoints load directly.

use crate::error::{DemucsError, Result};
use burn::tensor::{backend::Backend, Tensor, TensorData as BurnTensorData};
use safetensors::{Dtype, SafeTensors};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Wrapper prefixes added by common training harnesses.
const STRIP_PREFIXES: &[&str] = &["model.", "module."];

/// Raw tensor payload extracted from a SafeTensors file.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTensor {
    /// Scalar dtype in the file.
    pub dtype: Dtype,
    /// Shape as a list of dimensions.
    pub shape: Vec<usize>,
    /// Raw byte buffer in row-major order.
    pub data: Vec<u8>,
}

impl WeightTensor {
    /// Create a WeightTensor from a safetensors TensorView.
    pub fn from_safetensor(tensor: safetensors::tensor::TensorView<'_>) -> Self {
        Self {
            dtype: tensor.dtype(),
            shape: tensor.shape().to_vec(),
            data: tensor.data().to_vec(),
        }
    }

    /// Build an F32 payload from host values.
    pub fn from_f32(values: &[f32], shape: Vec<usize>) -> Self {
        Self {
            dtype: Dtype::F32,
            shape,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Decode the payload into `f32` values.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        let values = match self.dtype {
            Dtype::F32 => self
                .data
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
            Dtype::BF16 => self
                .data
                .chunks_exact(2)
                .map(|chunk| half::bf16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
                .collect(),
            Dtype::F16 => self
                .data
                .chunks_exact(2)
                .map(|chunk| half::f16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
                .collect(),
            other => {
                return Err(DemucsError::weights(format!("unsupported dtype {other:?}")));
            }
        };
        Ok(values)
    }

    /// Convert into a Burn tensor of rank `D`.
    pub fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Result<Tensor<B, D>> {
        let shape: [usize; D] = self.shape.clone().try_into().map_err(|_| {
            DemucsError::weights(format!("expected {D}D tensor, got shape {:?}", self.shape))
        })?;
        let values = self.to_f32_vec()?;
        Ok(Tensor::from_data(BurnTensorData::new(values, shape), device))
    }
}

/// Load a checkpoint into a name-keyed map, stripping wrapper prefixes.
pub fn load_state_dict(path: impl AsRef<Path>) -> Result<HashMap<String, WeightTensor>> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let mut state = HashMap::new();

    for name in tensors.names() {
        let tensor = tensors.tensor(name)?;
        state.insert(map_name(name), WeightTensor::from_safetensor(tensor));
    }

    tracing::debug!(path = %path.display(), tensors = state.len(), "loaded state dict");
    Ok(state)
}

/// Write named F32 tensors to a SafeTensors file.
pub fn save_state_dict(
    path: impl AsRef<Path>,
    state: &HashMap<String, WeightTensor>,
) -> Result<()> {
    let views = state
        .iter()
        .map(|(name, tensor)| {
            let view =
                safetensors::tensor::TensorView::new(tensor.dtype, tensor.shape.clone(), &tensor.data)?;
            Ok((name.clone(), view))
        })
        .collect::<std::result::Result<HashMap<_, _>, safetensors::SafeTensorError>>()?;
    let bytes = safetensors::serialize(&views, &None)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn map_name(name: &str) -> String {
    STRIP_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
        .to_string()
}
