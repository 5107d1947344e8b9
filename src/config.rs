//! Configuration types for the denoiser architecture and its weights.
//!
//! Configurations are typically loaded from YAML files using [`load_config`].
//! A [`ModelConfig`] fully determines every block's channel counts and the
//! valid-length arithmetic; it never changes after a model is built.

use crate::error::{DemucsError, Result};
use crate::model::length::ValidLengthCalculator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Input/output resampling factor applied around the convolutional pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFactor {
    /// No resampling.
    One,
    /// One 2x stage.
    Two,
    /// Two cascaded 2x stages.
    Four,
}

impl ResampleFactor {
    /// Integer multiplier applied to the time axis on the way in.
    pub fn factor(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Number of cascaded 2x operators in each direction.
    pub fn stages(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Four => 2,
        }
    }
}

impl TryFrom<usize> for ResampleFactor {
    type Error = DemucsError;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            other => Err(DemucsError::config(format!(
                "resampling factor must be 1, 2 or 4, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
/// Construction-time parameters of the U-Net denoiser.
pub struct ModelConfig {
    /// Base channel size of hidden representations.
    pub hidden_dim: usize,
    /// Multiplier on the channel size of hidden representations.
    pub growth: f64,
    /// Number of encoder (and decoder) blocks.
    pub depth: usize,
    /// Forward-only recurrence in the bottleneck when true.
    pub causal: bool,
    /// Input resampling factor (1, 2 or 4).
    pub resample: usize,
    /// Reference scale for the initial convolution weights (0 disables).
    pub rescale: f32,
    /// Stride of the strided convolutions.
    pub stride_conv: usize,
    /// Kernel size of the strided convolutions.
    pub kernel_conv: usize,
    /// Stride of the channel-doubling pre-GLU convolutions.
    pub stride_glu: usize,
    /// Kernel size of the channel-doubling pre-GLU convolutions.
    pub kernel_glu: usize,
    /// Apply the activation after the first encoder convolution too.
    pub original: bool,
    /// Bias terms in every convolution, recurrent and linear layer.
    pub use_bias: bool,
    /// Normalize the input by its standard deviation and restore it on output.
    pub normalize: bool,
    /// Floor added to the standard deviation before dividing.
    pub floor: f32,
    /// Sample rate the model operates at, in Hz.
    pub sample_rate: usize,
    /// Half-width (in zero crossings) of the windowed-sinc 2x resampling kernel.
    pub resample_zeros: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_dim: 64,
            growth: 1.0,
            depth: 5,
            causal: true,
            resample: 4,
            rescale: 0.1,
            stride_conv: 4,
            kernel_conv: 8,
            stride_glu: 1,
            kernel_glu: 1,
            original: true,
            use_bias: true,
            normalize: true,
            floor: 1e-3,
            sample_rate: 16_000,
            resample_zeros: 56,
        }
    }
}

impl ModelConfig {
    /// Check every construction-time invariant.
    ///
    /// # Errors
    ///
    /// Returns [`DemucsError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<ResampleFactor> {
        let resample = ResampleFactor::try_from(self.resample)?;
        if self.depth == 0 {
            return Err(DemucsError::config("depth must be positive"));
        }
        if self.hidden_dim == 0 {
            return Err(DemucsError::config("hidden_dim must be positive"));
        }
        if !self.growth.is_finite() || self.growth <= 0.0 {
            return Err(DemucsError::config(format!(
                "growth must be a positive finite number, got {}",
                self.growth
            )));
        }
        for (name, value) in [
            ("stride_conv", self.stride_conv),
            ("kernel_conv", self.kernel_conv),
            ("stride_glu", self.stride_glu),
            ("kernel_glu", self.kernel_glu),
            ("sample_rate", self.sample_rate),
            ("resample_zeros", self.resample_zeros),
        ] {
            if value == 0 {
                return Err(DemucsError::config(format!("{name} must be positive")));
            }
        }
        // The decoder-side length arithmetic assumes the gated convolution keeps
        // the time length unchanged.
        if self.stride_glu != 1 || self.kernel_glu % 2 == 0 {
            return Err(DemucsError::config(format!(
                "gated convolution must preserve length (odd kernel, stride 1), got kernel {} stride {}",
                self.kernel_glu, self.stride_glu
            )));
        }
        let level_stride = self.stride_conv.checked_mul(self.stride_glu);
        let depth = u32::try_from(self.depth).ok();
        if level_stride
            .zip(depth)
            .and_then(|(stride, depth)| stride.checked_pow(depth))
            .is_none()
        {
            return Err(DemucsError::config(format!(
                "strides {}x{} over depth {} overflow the total stride",
                self.stride_conv, self.stride_glu, self.depth
            )));
        }
        if !self.rescale.is_finite() || self.rescale < 0.0 {
            return Err(DemucsError::config(format!(
                "rescale must be a non-negative finite number, got {}",
                self.rescale
            )));
        }
        if !self.floor.is_finite() || self.floor < 0.0 {
            return Err(DemucsError::config(format!(
                "floor must be a non-negative finite number, got {}",
                self.floor
            )));
        }
        for level in 0..self.depth {
            if self.encoder_out_channels(level) == 0 {
                return Err(DemucsError::config(format!(
                    "hidden_dim {} with growth {} yields zero channels at level {level}",
                    self.hidden_dim, self.growth
                )));
            }
        }
        Ok(resample)
    }

    /// Channels produced by encoder level `level` (0 is the signal side).
    pub fn encoder_out_channels(&self, level: usize) -> usize {
        let scale = 2f64.powi(level as i32);
        (self.hidden_dim as f64 * self.growth * scale) as usize
    }

    /// Channels consumed by encoder level `level`.
    pub fn encoder_in_channels(&self, level: usize) -> usize {
        if level == 0 {
            1
        } else {
            self.encoder_out_channels(level - 1)
        }
    }

    /// Width of the deepest encoder output, which is also the recurrent hidden size.
    pub fn bottleneck_channels(&self) -> usize {
        self.encoder_out_channels(self.depth.saturating_sub(1))
    }

    /// Overall stride between input samples and bottleneck frames.
    pub fn total_stride(&self) -> usize {
        let depth = u32::try_from(self.depth).unwrap_or(u32::MAX);
        self.stride_conv
            .saturating_mul(self.stride_glu)
            .saturating_pow(depth)
            / self.resample.max(1)
    }

    /// Nearest input length that flows through the pyramid without leftovers.
    pub fn valid_length(&self, length: usize) -> usize {
        ValidLengthCalculator::new(self).valid_length(length)
    }
}

/// Top-level configuration document.
///
/// # Example YAML
///
/// ```yaml
/// model:
///   hidden_dim: 48
///   depth: 5
///   resample: 4
///   causal: true
/// weights_path: "dns48.safetensors"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenoiserConfig {
    /// Architecture parameters.
    #[serde(default)]
    pub model: ModelConfig,
    /// Optional safetensors checkpoint (relative paths resolve against the config file).
    pub weights_path: Option<String>,
}

/// Load a denoiser configuration from a YAML file.
///
/// # Errors
///
/// Returns an error if the file doesn't exist, contains invalid YAML, or
/// describes an invalid architecture.
pub fn load_config(path: impl AsRef<Path>) -> Result<DenoiserConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DemucsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        )));
    }

    let data = fs::read_to_string(path)?;
    let config: DenoiserConfig = serde_yaml::from_str(&data)?;
    config.model.validate()?;
    Ok(config)
}

/// Resolve a possibly relative path against a config file location.
pub fn resolve_relative_path(config_path: &Path, maybe_relative: &str) -> PathBuf {
    let candidate = Path::new(maybe_relative);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(candidate)
}
