//! Low-level building blocks of the denoiser.
//!
//! Convolutions, resampling, recurrent layers and the encoder/decoder levels
//! built from them. Blocks hold their parameters directly and run on any burn
//! backend.

pub mod blocks;
pub mod bottleneck;
pub mod conv;
pub mod init;
pub mod lstm;
pub mod param;
pub mod rescale;
pub mod resample;
