//! Parameter initialization matching the reference framework's defaults.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::Rng;

/// Sample a tensor uniformly from `[-bound, bound)`.
pub fn uniform<B: Backend, const D: usize, R: Rng + ?Sized>(
    rng: &mut R,
    shape: [usize; D],
    bound: f32,
    device: &B::Device,
) -> Tensor<B, D> {
    let numel: usize = shape.iter().product();
    let values: Vec<f32> = (0..numel)
        .map(|_| (2.0 * rng.random::<f32>() - 1.0) * bound)
        .collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// `1 / sqrt(fan_in)`, the default bound for convolution, linear and recurrent weights.
pub fn fan_in_bound(fan_in: usize) -> f32 {
    1.0 / (fan_in.max(1) as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    #[test]
    fn uniform_respects_bound_and_seed() {
        let device = NdArrayDevice::default();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let a = uniform::<TestBackend, 2, _>(&mut rng, [8, 16], 0.25, &device);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let b = uniform::<TestBackend, 2, _>(&mut rng, [8, 16], 0.25, &device);

        let a = a.into_data();
        assert_eq!(a, b.into_data());
        let values = a.as_slice::<f32>().unwrap();
        assert!(values.iter().all(|v| v.abs() <= 0.25));
        assert!(values.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn fan_in_bound_matches_default_init() {
        assert_eq!(fan_in_bound(4), 0.5);
        assert_eq!(fan_in_bound(0), 1.0);
    }
}
