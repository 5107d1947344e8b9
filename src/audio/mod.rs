//! Audio I/O and sample-rate conversion for the CLI and runtime.
//!
//! These helpers keep file handling outside the model, which only ever sees
//! mono tensors at its configured sample rate.

pub mod io;
pub mod resample;
