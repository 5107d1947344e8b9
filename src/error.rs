//! Error taxonomy for model construction, inference and checkpoint loading.
//!
//! Every failure here is deterministic for a given input and configuration,
//! so callers are expected to fix the input rather than retry.

/// Main library error type.
#[derive(Debug, thiserror::Error)]
pub enum DemucsError {
    /// Invalid construction-time parameters (fatal, never recovered).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Input tensor does not satisfy the signal shape contract.
    #[error("invalid input shape {shape:?}: {msg}")]
    Shape { msg: String, shape: Vec<usize> },

    /// Encoder and decoder disagreed on the number of skip connections.
    #[error("skip stack imbalance: pushed {pushed}, popped {popped}")]
    SkipImbalance { pushed: usize, popped: usize },

    /// Checkpoint tensors that cannot be mapped onto the model.
    #[error("weights: {0}")]
    Weights(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    SafeTensor(#[from] safetensors::SafeTensorError),
}

pub type Result<T> = std::result::Result<T, DemucsError>;

impl DemucsError {
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    pub fn shape(msg: impl std::fmt::Display, shape: &[usize]) -> Self {
        Self::Shape {
            msg: msg.to_string(),
            shape: shape.to_vec(),
        }
    }

    pub fn weights(msg: impl std::fmt::Display) -> Self {
        Self::Weights(msg.to_string())
    }
}
