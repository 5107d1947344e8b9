//! Fixed windowed-sinc 2x resampling.
//!
//! Both directions share one interpolation kernel: `2 * zeros` taps of a sinc
//! evaluated at half-integer offsets, tapered by the odd samples of a
//! symmetric Hann window. The kernel is not learnable.

use burn::tensor::{backend::Backend, module::conv1d, ops::ConvOptions, Tensor, TensorData};
use std::f32::consts::PI;

/// Up/down 2x resampler with a precomputed interpolation kernel.
#[derive(Debug, Clone)]
pub struct SincResampler<B: Backend> {
    zeros: usize,
    kernel: Tensor<B, 3>,
}

impl<B: Backend> SincResampler<B> {
    pub fn new(zeros: usize, device: &B::Device) -> Self {
        let taps = sinc_kernel(zeros);
        let kernel = Tensor::from_data(TensorData::new(taps, [1, 1, 2 * zeros]), device);
        Self { zeros, kernel }
    }

    /// `[B, C, T] -> [B, C, 2T]`: original samples at even positions,
    /// interpolated midpoints at odd positions.
    #[tracing::instrument(skip_all)]
    pub fn upsample2(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, channels, time] = input.dims();
        let interpolated = self
            .interpolate(input.clone())
            .narrow(2, 1, time)
            .reshape([batch, channels, time]);
        Tensor::stack::<4>(vec![input, interpolated], 3).reshape([batch, channels, 2 * time])
    }

    /// `[B, C, T] -> [B, C, ceil(T / 2)]`, padding one trailing zero for odd `T`.
    #[tracing::instrument(skip_all)]
    pub fn downsample2(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, channels, time] = input.dims();
        let input = if time % 2 == 1 {
            let pad = Tensor::zeros([batch, channels, 1], &input.device());
            Tensor::cat(vec![input, pad], 2)
        } else {
            input
        };
        let half = time.div_ceil(2);
        let pairs = input.reshape([batch, channels, half, 2]);
        let even = pairs.clone().narrow(3, 0, 1).reshape([batch, channels, half]);
        let odd = pairs.narrow(3, 1, 1).reshape([batch, channels, half]);
        let interpolated = self
            .interpolate(odd)
            .narrow(2, 0, half)
            .reshape([batch, channels, half]);
        (even + interpolated).mul_scalar(0.5)
    }

    /// Convolve every channel independently with the kernel; yields `T + 1` samples.
    fn interpolate(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, channels, time] = input.dims();
        let flat = input.reshape([batch * channels, 1, time]);
        let out = conv1d(
            flat,
            self.kernel.clone(),
            None,
            ConvOptions::new([1], [self.zeros], [1], 1),
        );
        out.reshape([batch, channels, time + 1])
    }
}

fn sinc_kernel(zeros: usize) -> Vec<f32> {
    let window = hann_window(4 * zeros + 1);
    window
        .iter()
        .skip(1)
        .step_by(2)
        .take(2 * zeros)
        .enumerate()
        .map(|(i, w)| sinc((i as f32 - zeros as f32 + 0.5) * PI) * w)
        .collect()
}

/// Symmetric Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    let denom = size.saturating_sub(1).max(1) as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos()))
        .collect()
}

fn sinc(t: f32) -> f32 {
    if t == 0.0 {
        1.0
    } else {
        t.sin() / t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tolerance;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    fn ramp(len: usize, device: &NdArrayDevice) -> Tensor<TestBackend, 3> {
        let values: Vec<f32> = (0..len).map(|i| (i as f32 * 0.37).sin()).collect();
        Tensor::from_data(TensorData::new(values, [1, 1, len]), device)
    }

    #[test]
    fn kernel_is_symmetric_and_sums_near_one() {
        let taps = sinc_kernel(56);
        assert_eq!(taps.len(), 112);
        for i in 0..56 {
            assert!((taps[i] - taps[111 - i]).abs() < 1e-6);
        }
        let sum: f32 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-2, "kernel sum {sum}");
    }

    #[test]
    fn upsample_keeps_original_samples_at_even_positions() {
        let device = NdArrayDevice::default();
        let resampler = SincResampler::<TestBackend>::new(8, &device);
        let input = ramp(20, &device);
        let up = resampler.upsample2(input.clone());
        assert_eq!(up.dims(), [1, 1, 40]);

        let even = up.reshape([1, 1, 20, 2]).narrow(3, 0, 1).reshape([1, 1, 20]);
        even.into_data()
            .assert_approx_eq(&input.into_data(), Tolerance::<f32>::absolute(1e-6));
    }

    #[test]
    fn downsample_pads_odd_lengths() {
        let device = NdArrayDevice::default();
        let resampler = SincResampler::<TestBackend>::new(8, &device);
        let down = resampler.downsample2(ramp(21, &device));
        assert_eq!(down.dims(), [1, 1, 11]);
    }

    #[test]
    fn round_trip_preserves_smooth_signal() {
        let device = NdArrayDevice::default();
        let resampler = SincResampler::<TestBackend>::new(56, &device);
        let len = 400;
        let values: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * i as f32 / 50.0).sin())
            .collect();
        let input = Tensor::<TestBackend, 3>::from_data(TensorData::new(values, [1, 1, len]), &device);
        let back = resampler.downsample2(resampler.upsample2(input.clone()));
        assert_eq!(back.dims(), [1, 1, len]);

        // Compare away from the zero-padded edges.
        let inner = 100..300;
        let back = back.narrow(2, inner.start, inner.len()).into_data();
        let input = input.narrow(2, inner.start, inner.len()).into_data();
        back.assert_approx_eq(&input, Tolerance::<f32>::absolute(1e-2));
    }
}
