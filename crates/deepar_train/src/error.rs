//! Error types for training and prediction.

use thiserror::Error;

use deepar_models::checkpoint::CheckpointError;

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur during training or prediction.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Invalid learning rate or schedule.
    #[error("Invalid learning rate: {0}")]
    InvalidLearningRate(String),

    /// Callback error.
    #[error("Callback error: {0}")]
    CallbackError(String),

    /// Data error.
    #[error(transparent)]
    DataError(#[from] deepar_data::DataError),

    /// Core error.
    #[error(transparent)]
    CoreError(#[from] deepar_core::CoreError),

    /// Checkpoint error.
    #[error(transparent)]
    CheckpointError(#[from] CheckpointError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TrainError {
    /// Whether the run was misconfigured, shape mismatches included.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::InvalidLearningRate(_) => true,
            Self::CoreError(e) => e.is_configuration(),
            Self::DataError(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Whether distribution parameters or the loss left their domain.
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        match self {
            Self::CoreError(e) => e.is_numerical(),
            Self::DataError(deepar_data::DataError::CoreError(e)) => e.is_numerical(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepar_core::CoreError;

    #[test]
    fn test_classification() {
        let err: TrainError = CoreError::ShapeMismatch {
            input: "past_target".into(),
            expected: "[N, 49]".into(),
            got: "[N, 48]".into(),
        }
        .into();
        assert!(err.is_configuration());
        assert!(!err.is_numerical());

        let err: TrainError = CoreError::Numerical("alpha = 0".into()).into();
        assert!(err.is_numerical());
        assert!(!TrainError::CallbackError("x".into()).is_configuration());
    }
}
