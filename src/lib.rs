//! # denoiser - Waveform-Domain Speech Enhancement
//!
//! A Rust implementation of a convolutional-recurrent U-Net denoiser that maps
//! a noisy waveform to a clean estimate of the same length.
//!
//! ## Architecture Overview
//!
//! 1. **Front end**: the input is mixed down to mono, optionally normalized by
//!    its standard deviation, zero-padded to a valid length and upsampled with
//!    a windowed-sinc 2x resampler (1, 2 or 4 times).
//!
//! 2. **Encoder**: `depth` levels of strided convolution, ReLU, and a
//!    channel-doubling convolution followed by a gated linear unit.
//!
//! 3. **Bottleneck**: a two-layer LSTM, forward-only for causal models or
//!    bidirectional with a linear projection otherwise.
//!
//! 4. **Decoder**: mirrored levels of gated convolution and transposed
//!    convolution, each fed the matching encoder output through a skip.
//!
//! ## Quick Start
//!
//! ```no_run
//! use burn::tensor::Tensor;
//! use burn_ndarray::{NdArray, NdArrayDevice};
//! use denoiser::{Demucs, ModelConfig};
//!
//! let device = NdArrayDevice::default();
//! let model = Demucs::<NdArray<f32>>::with_seed(ModelConfig::default(), 0, &device).unwrap();
//!
//! // [batch, channels, time]
//! let noisy = Tensor::<NdArray<f32>, 3>::zeros([1, 1, 16_000], &device);
//! let clean = model.forward(noisy).unwrap();
//! assert_eq!(clean.dims(), [1, 1, 16_000]);
//! ```
//!
//! ## Configuration
//!
//! Models are configured via YAML files holding a [`ModelConfig`] and an
//! optional safetensors checkpoint path. See [`DenoiserConfig`].

// Public modules - these are part of the stable API
pub mod audio;
pub mod config;
pub mod error;
pub mod runtime;

// Internal modules - exposed for integration tests but not part of stable API.
#[doc(hidden)]
pub mod model;
#[doc(hidden)]
pub mod modules;
#[doc(hidden)]
pub mod weights;

// Re-exports forming the public API
pub use config::{load_config, DenoiserConfig, ModelConfig, ResampleFactor};
pub use error::{DemucsError, Result};
pub use model::demucs::{Demucs, ForwardTrace};
pub use model::length::ValidLengthCalculator;
pub use runtime::DenoiseRuntime;
