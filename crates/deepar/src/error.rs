//! The four classes every failure falls into.
//!
//! Each crate keeps its own error enum; [`ErrorKind`] maps any of them onto
//! the class a caller reports. Every class is fatal.

use std::fmt;

use deepar_core::CoreError;
use deepar_data::DataError;
use deepar_models::checkpoint::CheckpointError;
use deepar_train::TrainError;

/// Class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid or inconsistent configuration, shape mismatches included.
    Configuration,
    /// The series could not be fetched or parsed.
    DataFetch,
    /// A persisted model could not be found or restored.
    ModelLoad,
    /// Distribution parameters or the loss left their domain.
    Numerical,
    /// Anything else, such as a failed checkpoint write.
    Other,
}

impl From<&CoreError> for ErrorKind {
    fn from(err: &CoreError) -> Self {
        if err.is_numerical() {
            Self::Numerical
        } else {
            Self::Configuration
        }
    }
}

impl From<&DataError> for ErrorKind {
    fn from(err: &DataError) -> Self {
        match err {
            DataError::CoreError(e) => e.into(),
            e if e.is_fetch() => Self::DataFetch,
            DataError::InvalidSeries(_) => Self::DataFetch,
            DataError::IndexOutOfBounds { .. } => Self::Other,
            _ => Self::Configuration,
        }
    }
}

impl From<&CheckpointError> for ErrorKind {
    fn from(err: &CheckpointError) -> Self {
        if err.is_load() {
            Self::ModelLoad
        } else {
            Self::Other
        }
    }
}

impl From<&TrainError> for ErrorKind {
    fn from(err: &TrainError) -> Self {
        match err {
            TrainError::CoreError(e) => e.into(),
            TrainError::DataError(e) => e.into(),
            TrainError::CheckpointError(e) => e.into(),
            TrainError::InvalidLearningRate(_) => Self::Configuration,
            TrainError::CallbackError(_) | TrainError::IoError(_) => Self::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "ConfigurationError",
            Self::DataFetch => "DataFetchError",
            Self::ModelLoad => "ModelLoadError",
            Self::Numerical => "NumericalError",
            Self::Other => "Error",
        };
        f.write_str(name)
    }
}
