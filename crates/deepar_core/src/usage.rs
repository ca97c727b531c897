//! Which segment of a series a dataset is built from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Segment of the series a dataset draws its windows from.
///
/// The series is split once at `k = len - holdout_length`; [`Usage::Train`]
/// covers `values[0..k]` and [`Usage::Test`] covers the holdout `values[k..]`.
///
/// # Example
///
/// ```rust
/// use deepar_core::Usage;
///
/// assert_eq!(Usage::Train.segment(144, 32), 0..112);
/// assert_eq!(Usage::Test.segment(144, 32), 112..144);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Usage {
    /// Everything before the holdout.
    #[default]
    Train,
    /// The most recent `holdout_length` points.
    Test,
}

impl Usage {
    /// Check if this is the training segment.
    #[must_use]
    pub const fn is_train(&self) -> bool {
        matches!(self, Usage::Train)
    }

    /// Check if this is the holdout segment.
    #[must_use]
    pub const fn is_test(&self) -> bool {
        matches!(self, Usage::Test)
    }

    /// Index range of this segment for a series of `len` points.
    ///
    /// Callers validate `0 < holdout_length < len` first.
    #[must_use]
    pub fn segment(&self, len: usize, holdout_length: usize) -> std::ops::Range<usize> {
        let split = len.saturating_sub(holdout_length);
        match self {
            Usage::Train => 0..split,
            Usage::Test => split..len,
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Usage::Train => write!(f, "train"),
            Usage::Test => write!(f, "test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_partition_series() {
        let train = Usage::Train.segment(50, 32);
        let test = Usage::Test.segment(50, 32);
        assert_eq!(train.end, test.start);
        assert_eq!(train.len() + test.len(), 50);
    }

    #[test]
    fn test_usage_display() {
        assert_eq!(Usage::Train.to_string(), "train");
        assert_eq!(Usage::Test.to_string(), "test");
        assert!(Usage::default().is_train());
    }
}
