//! Error types for deepar_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading series and slicing windows.
#[derive(Error, Debug)]
pub enum DataError {
    /// The series could not be fetched from its source.
    #[error("Failed to fetch series: {0}")]
    Fetch(String),

    /// The payload did not match the `{start, target}` schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Series values violate their invariants.
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Dataset is empty.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Index out of bounds.
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length of the collection.
        length: usize,
    },

    /// Batch size error.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(String),

    /// Windows in one batch disagree on their lengths.
    #[error("Inconsistent windows: {0}")]
    InconsistentWindows(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core error.
    #[error(transparent)]
    CoreError(#[from] deepar_core::CoreError),
}

impl DataError {
    /// Whether this error means the series could not be obtained or read.
    #[must_use]
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Parse(_) | Self::IoError(_))
    }

    /// Whether this error is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::CoreError(e) if e.is_configuration())
    }
}
