//! Error types for deepar_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Configuration and numerical errors shared across the workspace.
///
/// Both kinds are fatal: a run that hits one of them halts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A configuration value is out of range or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A declared input shape disagrees with the network configuration.
    #[error("Shape mismatch for input `{input}`: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Name of the offending input.
        input: String,
        /// Shape the configuration requires.
        expected: String,
        /// Shape that was declared.
        got: String,
    },

    /// Distribution parameters left their valid domain.
    #[error("Numerical error: {0}")]
    Numerical(String),
}

impl CoreError {
    /// Whether this error belongs to the configuration class.
    ///
    /// Shape mismatches count as configuration errors.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ShapeMismatch { .. })
    }

    /// Whether this error belongs to the numerical class.
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::Numerical(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let err = CoreError::ShapeMismatch {
            input: "past_target".into(),
            expected: "[_, 49]".into(),
            got: "[_, 48]".into(),
        };
        assert!(err.is_configuration());
        assert!(!err.is_numerical());
        assert!(CoreError::Numerical("alpha <= 0".into()).is_numerical());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::Configuration("holdout too long".into());
        assert_eq!(err.to_string(), "Configuration error: holdout too long");
    }
}
