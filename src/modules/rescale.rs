//! One-shot variance normalization of freshly initialized convolutions.

use crate::error::{DemucsError, Result};
use crate::modules::conv::ConvWeights;
use burn::tensor::backend::Backend;

/// Divides each convolution's weight and bias by `sqrt(std(weight) / reference)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRescaler {
    reference: f32,
}

impl WeightRescaler {
    /// `None` when rescaling is disabled (`reference == 0`).
    pub fn new(reference: f32) -> Option<Self> {
        (reference > 0.0).then_some(Self { reference })
    }

    /// Scale factor for a weight tensor, or `None` for a constant tensor.
    ///
    /// # Errors
    ///
    /// Returns [`DemucsError::Weights`] when the weights cannot be read back as `f32`.
    pub fn scale_for<B: Backend>(&self, weights: &ConvWeights<B>) -> Result<Option<f32>> {
        let values = weights
            .weight
            .val()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|err| {
                DemucsError::weights(format!("cannot read convolution weights: {err:?}"))
            })?;
        let std = unbiased_std(&values);
        Ok((std > 0.0).then(|| (std / self.reference as f64).sqrt() as f32))
    }

    /// Replace every listed convolution with its rescaled copy.
    pub fn apply<'a, B: Backend + 'a>(
        &self,
        layers: impl IntoIterator<Item = &'a mut ConvWeights<B>>,
    ) -> Result<()> {
        for (index, weights) in layers.into_iter().enumerate() {
            match self.scale_for(weights)? {
                Some(scale) => {
                    tracing::debug!(layer = index, scale, "rescaling convolution");
                    *weights = weights.scaled_down(scale);
                }
                None => tracing::debug!(layer = index, "skipping constant convolution"),
            }
        }
        Ok(())
    }
}

fn unbiased_std(values: &[f32]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
    let sum_sq: f64 = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum();
    (sum_sq / n.saturating_sub(1).max(1) as f64).sqrt()
}
