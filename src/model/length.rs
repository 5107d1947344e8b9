//! Analytic length propagation through the resample/encoder/decoder chain.

use crate::config::ModelConfig;

/// Pure length arithmetic derived from a [`ModelConfig`].
///
/// Padding an input to [`ValidLengthCalculator::valid_length`] guarantees that
/// no strided convolution drops a fractional remainder, so the decoded signal
/// is at least as long as the padded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidLengthCalculator {
    resample: usize,
    depth: usize,
    kernel_conv: usize,
    stride_conv: usize,
    kernel_glu: usize,
    stride_glu: usize,
}

impl ValidLengthCalculator {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            resample: config.resample.max(1),
            depth: config.depth,
            kernel_conv: config.kernel_conv,
            stride_conv: config.stride_conv.max(1),
            kernel_glu: config.kernel_glu,
            stride_glu: config.stride_glu.max(1),
        }
    }

    /// Smallest length `>= length` that passes the pyramid without leftovers.
    ///
    /// The gated convolution is counted with its `kernel_glu / 2` padding, so it
    /// keeps the length. The unpadded form `ceil((len - kernel_glu) / stride_glu) + 1`
    /// would shrink every level by `kernel_glu - 1` frames for wider gated kernels,
    /// which the padded convolutions never do.
    pub fn valid_length(&self, length: usize) -> usize {
        let mut length = length * self.resample;
        for _ in 0..self.depth {
            length = self.encoder_step(length);
        }
        for _ in 0..self.depth {
            length = self.decoder_step(length);
        }
        length.div_ceil(self.resample)
    }

    /// Time length after each encoder level for an (already upsampled) input.
    pub fn encoder_lengths(&self, upsampled_length: usize) -> Vec<usize> {
        let mut length = upsampled_length;
        (0..self.depth)
            .map(|_| {
                length = self.encoder_step(length);
                length
            })
            .collect()
    }

    /// Length through one strided convolution followed by the gated convolution.
    fn encoder_step(&self, length: usize) -> usize {
        let length = strided_length(length, self.kernel_conv, self.stride_conv);
        // The gated convolution pads by `kernel_glu / 2` on both sides.
        let padded = length + 2 * (self.kernel_glu / 2);
        strided_length(padded, self.kernel_glu, self.stride_glu)
    }

    /// Transposed-convolution length, assuming the same kernel at every level.
    fn decoder_step(&self, length: usize) -> usize {
        (length - 1) * self.stride_conv + self.kernel_conv
    }
}

/// `max(ceil((length - kernel) / stride) + 1, 1)` without going negative.
fn strided_length(length: usize, kernel: usize, stride: usize) -> usize {
    if length <= kernel {
        1
    } else {
        (length - kernel).div_ceil(stride) + 1
    }
}
