use thiserror::Error;

/// The error type for backbone construction.
///
/// Every variant is raised while validating a configuration, before any weight is
/// allocated, so a network that constructs successfully has consistent channel
/// arithmetic throughout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResNetError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid ResNet configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Two layers that must agree on their channel/stride contract do not.
    #[error("Channel mismatch in {module}: expected {expected}, got {actual}")]
    ChannelMismatch {
        /// The module whose construction failed.
        module: String,
        /// The expected shape contract.
        expected: String,
        /// The shape contract that was requested.
        actual: String,
    },
}

/// A specialized `Result` type for backbone construction.
pub type ResNetResult<T> = Result<T, ResNetError>;
