use resnet::ResNetError;
use thiserror::Error;

/// The error type for `PoolNet-Burn` operations.
///
/// Configuration problems are reported when a network is built; shape problems are
/// reported by the forward pass of the layer that detects them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolNetError {
    /// The backbone could not be built.
    #[error("Backbone error: {0}")]
    Backbone(#[from] ResNetError),

    /// Error for when an invalid model configuration is provided.
    /// This can happen if configuration parameters are logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Consecutive layers disagree on a channel count.
    #[error("Channel mismatch in {module}: expected {expected}, got {actual}")]
    ChannelMismatch {
        /// The layer whose input does not line up.
        module: String,
        /// The expected channel count.
        expected: usize,
        /// The channel count that would be fed to it.
        actual: usize,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid tensor shape in {module}: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The layer that received the tensor.
        module: String,
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// A fusing layer was called without one of its side inputs.
    #[error("Missing input `{input}` for {module}")]
    MissingInput {
        /// The layer that needs the input.
        module: String,
        /// The name of the missing input.
        input: String,
    },
}

/// A specialized `Result` type for `PoolNet-Burn` operations.
pub type PoolNetResult<T> = Result<T, PoolNetError>;
