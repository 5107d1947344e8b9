use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Sample-rate and channel-count conversion for channel-major audio.
#[derive(Debug, Default)]
pub struct AudioResampler;

impl AudioResampler {
    /// Convert to `to_channels` channels, then resample from `from_rate` to `to_rate`.
    pub fn convert_audio(
        samples: Vec<Vec<f32>>,
        from_rate: u32,
        to_rate: u32,
        to_channels: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let samples = convert_channels(samples, to_channels)?;
        Self::resample(samples, from_rate, to_rate)
    }

    /// Band-limited sample-rate conversion of every channel.
    pub fn resample(samples: Vec<Vec<f32>>, from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
        if from_rate == to_rate || samples.is_empty() || samples[0].is_empty() {
            return Ok(samples);
        }
        if from_rate == 0 || to_rate == 0 {
            anyhow::bail!("Sample rates must be positive, got {from_rate} -> {to_rate}");
        }

        let channels = samples.len();
        let input_len = samples[0].len();
        let ratio = to_rate as f64 / from_rate as f64;
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_len, channels)?;
        let delay = resampler.output_delay();
        let expected = (input_len as f64 * ratio).round() as usize;

        let mut output = resampler.process(&samples, None)?;
        // Flush the filter tail so the last input samples reach the output.
        while output[0].len() < delay + expected {
            let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
            if tail[0].is_empty() {
                break;
            }
            for (channel, rest) in output.iter_mut().zip(tail) {
                channel.extend(rest);
            }
        }
        for channel in &mut output {
            channel.drain(..delay.min(channel.len()));
            channel.truncate(expected);
        }
        tracing::debug!(from_rate, to_rate, input_len, output_len = output[0].len(), "resampled");
        Ok(output)
    }

    /// Truncate or zero-pad every channel to exactly `len` samples.
    pub fn fit_length(mut samples: Vec<Vec<f32>>, len: usize) -> Vec<Vec<f32>> {
        for channel in &mut samples {
            channel.resize(len, 0.0);
        }
        samples
    }
}

fn convert_channels(samples: Vec<Vec<f32>>, to_channels: usize) -> Result<Vec<Vec<f32>>> {
    if samples.is_empty() {
        return Ok(samples);
    }
    let from_channels = samples.len();
    if from_channels == to_channels {
        return Ok(samples);
    }
    if to_channels == 1 {
        let len = samples[0].len();
        let mut mixed = vec![0.0_f32; len];
        for channel in &samples {
            if channel.len() != len {
                anyhow::bail!("Channel length mismatch in audio conversion");
            }
            for (acc, value) in mixed.iter_mut().zip(channel) {
                *acc += *value;
            }
        }
        let scale = 1.0 / from_channels as f32;
        mixed.iter_mut().for_each(|value| *value *= scale);
        return Ok(vec![mixed]);
    }
    if from_channels == 1 {
        return Ok(vec![samples[0].clone(); to_channels]);
    }
    anyhow::bail!("Unsupported channel conversion from {from_channels} to {to_channels}")
}
