mod common;

use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArrayDevice;
use common::{assert_close, noise_tensor, tiny_config, to_vec, TestBackend};
use denoiser::{Demucs, ModelConfig, ValidLengthCalculator};

#[test]
fn output_length_matches_input_for_every_resample() {
    let device = NdArrayDevice::default();
    for resample in [1, 2, 4] {
        let config = ModelConfig {
            resample,
            ..tiny_config()
        };
        let model = Demucs::<TestBackend>::with_seed(config, 7, &device).expect("model");
        for length in [1, 7, 50, 129, 300] {
            let input = noise_tensor(1, 1, length, length as u64, &device);
            let output = model.forward(input).expect("forward");
            assert_eq!(output.dims(), [1, 1, length], "resample {resample}");
        }
    }
}

#[test]
fn channels_collapse_to_mono() {
    let device = NdArrayDevice::default();
    let model = Demucs::<TestBackend>::with_seed(tiny_config(), 11, &device).expect("model");
    for channels in [2, 3, 5] {
        let input = noise_tensor(2, channels, 90, channels as u64, &device);
        let output = model.forward(input).expect("forward");
        assert_eq!(output.dims(), [2, 1, 90]);
    }
}

#[test]
fn stereo_copies_match_mono() {
    let device = NdArrayDevice::default();
    let model = Demucs::<TestBackend>::with_seed(tiny_config(), 12, &device).expect("model");
    let mono = noise_tensor(1, 1, 80, 3, &device);
    let stereo = Tensor::cat(vec![mono.clone(), mono.clone()], 1);
    let a = to_vec(model.forward(mono).expect("mono"));
    let b = to_vec(model.forward(stereo).expect("stereo"));
    assert_close(&a, &b, 1e-5);
}

#[test]
fn normalization_preserves_input_scale() {
    let device = NdArrayDevice::default();
    let model = Demucs::<TestBackend>::with_seed(tiny_config(), 13, &device).expect("model");
    let input = noise_tensor(2, 1, 200, 5, &device);
    let k = 4.0;

    let base = to_vec(model.forward(input.clone()).expect("base"));
    let scaled = to_vec(model.forward(input.mul_scalar(k)).expect("scaled"));
    let expected: Vec<f32> = base.iter().map(|v| v * k).collect();
    let peak = expected.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
    assert_close(&scaled, &expected, 1e-2 * peak.max(1e-3));
}

#[test]
fn causal_model_never_looks_ahead() {
    let device = NdArrayDevice::default();
    let config = ModelConfig {
        hidden_dim: 4,
        depth: 3,
        resample: 1,
        kernel_conv: 2,
        stride_conv: 2,
        kernel_glu: 1,
        normalize: false,
        causal: true,
        ..ModelConfig::default()
    };
    let stride = config.total_stride();
    assert_eq!(stride, 8);
    let model = Demucs::<TestBackend>::with_seed(config, 17, &device).expect("model");

    let length = 128;
    let cut = 8 * stride;
    let mut first = common::noise(length, 1.0, 1);
    let second_tail = common::noise(length - cut, 1.0, 2);
    let a = Tensor::<TestBackend, 2>::from_data(TensorData::new(first.clone(), [1, length]), &device);
    first[cut..].copy_from_slice(&second_tail);
    let b = Tensor::<TestBackend, 2>::from_data(TensorData::new(first, [1, length]), &device);

    let out_a = to_vec(model.forward(a).expect("forward a"));
    let out_b = to_vec(model.forward(b).expect("forward b"));
    assert_eq!(&out_a[..cut], &out_b[..cut]);
    assert_ne!(&out_a[cut..], &out_b[cut..]);
}

#[test]
fn bidirectional_model_sees_the_future() {
    let device = NdArrayDevice::default();
    let config = ModelConfig {
        hidden_dim: 4,
        depth: 2,
        resample: 1,
        normalize: false,
        causal: false,
        ..ModelConfig::default()
    };
    let model = Demucs::<TestBackend>::with_seed(config, 19, &device).expect("model");
    let mut samples = common::noise(160, 1.0, 3);
    let a = Tensor::<TestBackend, 2>::from_data(TensorData::new(samples.clone(), [1, 160]), &device);
    samples[150] += 1.0;
    let b = Tensor::<TestBackend, 2>::from_data(TensorData::new(samples, [1, 160]), &device);

    let out_a = to_vec(model.forward(a).expect("forward a"));
    let out_b = to_vec(model.forward(b).expect("forward b"));
    assert_ne!(&out_a[..16], &out_b[..16]);
}

#[test]
fn skip_stack_is_balanced() {
    let device = NdArrayDevice::default();
    for depth in [1, 2, 3] {
        let config = ModelConfig {
            depth,
            ..tiny_config()
        };
        let model = Demucs::<TestBackend>::with_seed(config, 23, &device).expect("model");
        let (_, trace) = model
            .forward_traced(noise_tensor(1, 1, 100, 4, &device))
            .expect("forward");
        assert_eq!(trace.skips_pushed, depth);
        assert_eq!(trace.skips_popped, depth);
        assert_eq!(trace.encoder_lengths.len(), depth);
        assert_eq!(trace.decoder_lengths.len(), depth);
    }
}

#[test]
fn decoder_lengths_mirror_encoder_lengths() {
    let device = NdArrayDevice::default();
    for kernel_glu in [1, 3] {
        let config = ModelConfig {
            hidden_dim: 2,
            kernel_glu,
            ..ModelConfig::default()
        };
        let calc = ValidLengthCalculator::new(&config);
        let model = Demucs::<TestBackend>::with_seed(config, 29, &device).expect("model");
        let (output, trace) = model
            .forward_traced(Tensor::<TestBackend, 2>::zeros([1, 16_000], &device))
            .expect("forward");

        assert_eq!(output.dims(), [1, 1, 16_000]);
        assert_eq!(trace.valid_length, 16_213);
        assert_eq!(trace.upsampled_length, 4 * 16_213);
        assert_eq!(trace.encoder_lengths, calc.encoder_lengths(trace.upsampled_length));

        // Each decoder level restores the length its mirrored encoder level consumed.
        let mut expected: Vec<usize> = trace.encoder_lengths.iter().rev().skip(1).copied().collect();
        expected.push(trace.upsampled_length);
        assert_eq!(trace.decoder_lengths, expected);
    }
}

#[test]
fn zero_input_gives_zero_output() {
    let device = NdArrayDevice::default();
    let config = ModelConfig {
        hidden_dim: 64,
        depth: 5,
        resample: 4,
        kernel_conv: 8,
        stride_conv: 4,
        kernel_glu: 1,
        stride_glu: 1,
        use_bias: false,
        normalize: false,
        ..ModelConfig::default()
    };
    assert!(config.valid_length(16_000) >= 16_000);
    let model = Demucs::<TestBackend>::with_seed(config, 31, &device).expect("model");
    let output = model
        .forward(Tensor::<TestBackend, 3>::zeros([2, 1, 16_000], &device))
        .expect("forward");
    assert_eq!(output.dims(), [2, 1, 16_000]);
    assert!(to_vec(output).iter().all(|v| *v == 0.0));
}

#[test]
fn silent_input_with_normalization_stays_finite() {
    let device = NdArrayDevice::default();
    let model = Demucs::<TestBackend>::with_seed(tiny_config(), 37, &device).expect("model");
    let output = model
        .forward(Tensor::<TestBackend, 3>::zeros([1, 1, 64], &device))
        .expect("forward");
    assert!(to_vec(output).iter().all(|v| v.is_finite()));
}

#[test]
fn seeded_models_are_reproducible() {
    let device = NdArrayDevice::default();
    let a = Demucs::<TestBackend>::with_seed(tiny_config(), 41, &device).expect("model a");
    let b = Demucs::<TestBackend>::with_seed(tiny_config(), 41, &device).expect("model b");
    let input = noise_tensor(1, 1, 64, 6, &device);
    let out_a = to_vec(a.forward(input.clone()).expect("forward a"));
    let out_b = to_vec(b.forward(input).expect("forward b"));
    assert_eq!(out_a, out_b);
}
