//! The U-Net denoiser and its call-scoped helpers.
//!
//! `length` holds the analytic valid-length arithmetic, `skips` the per-call
//! skip stack, and `demucs` the model that ties the building blocks together.

pub mod demucs;
pub mod length;
pub mod skips;
