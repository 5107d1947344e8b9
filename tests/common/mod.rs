//! Shared test utilities for model construction and tensor comparison.
#![allow(dead_code)]

use burn::tensor::{Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};
use denoiser::ModelConfig;
use rand::{rngs::StdRng, Rng, SeedableRng};

pub type TestBackend = NdArray<f32>;

/// Small architecture that keeps forward passes fast.
pub fn tiny_config() -> ModelConfig {
    ModelConfig {
        hidden_dim: 4,
        depth: 2,
        resample: 2,
        ..ModelConfig::default()
    }
}

/// Deterministic uniform noise in `[-amplitude, amplitude)`.
pub fn noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| (rng.random::<f32>() * 2.0 - 1.0) * amplitude)
        .collect()
}

/// Build a `[batch, channels, time]` tensor of deterministic noise.
pub fn noise_tensor(
    batch: usize,
    channels: usize,
    len: usize,
    seed: u64,
    device: &NdArrayDevice,
) -> Tensor<TestBackend, 3> {
    let data = noise(batch * channels * len, 1.0, seed);
    Tensor::from_data(TensorData::new(data, [batch, channels, len]), device)
}

/// Flatten a tensor into host `f32` values.
pub fn to_vec<const D: usize>(tensor: Tensor<TestBackend, D>) -> Vec<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("f32 values")
}

/// Assert two slices are element-wise close within tolerance.
pub fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(
        a.len(),
        b.len(),
        "length mismatch: {} vs {}",
        a.len(),
        b.len()
    );
    for (idx, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if (x - y).abs() > tol {
            panic!(
                "mismatch at {idx}: {x} vs {y} (diff: {}, tol: {tol})",
                (x - y).abs()
            );
        }
    }
}
