//! Declared input shapes of the forecasting network.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shapes of the tensors a batch of windows feeds to the network.
///
/// The leading dimension of every shape is the batch size `N`. Only the
/// trailing dimensions are compared by [`InputShapes::check_against`], so a
/// declaration made with batch size 1 validates batches of any size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShapes {
    /// Static categorical features, `[N, n_static_cat]`.
    pub static_cat: [usize; 2],
    /// Calendar and age features of the history, `[N, H, F + 1]`.
    pub past_time_feat: [usize; 3],
    /// Observed history values, `[N, H]`.
    pub past_target: [usize; 2],
    /// Calendar and age features of the horizon, `[N, P, F + 1]`.
    pub future_time_feat: [usize; 3],
    /// Horizon values, `[N, P]`.
    pub future_target: [usize; 2],
}

impl InputShapes {
    /// Build the declaration for the given dimensions.
    #[must_use]
    pub const fn declared(
        batch: usize,
        n_static_cat: usize,
        history_length: usize,
        prediction_length: usize,
        n_time_features: usize,
    ) -> Self {
        Self {
            static_cat: [batch, n_static_cat],
            past_time_feat: [batch, history_length, n_time_features],
            past_target: [batch, history_length],
            future_time_feat: [batch, prediction_length, n_time_features],
            future_target: [batch, prediction_length],
        }
    }

    /// Batch size of the declaration.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.past_target[0]
    }

    /// Compare the non-batch dimensions against `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] naming the first input that
    /// disagrees.
    pub fn check_against(&self, expected: &InputShapes) -> Result<()> {
        compare("static_cat", &self.static_cat, &expected.static_cat)?;
        compare("past_time_feat", &self.past_time_feat, &expected.past_time_feat)?;
        compare("past_target", &self.past_target, &expected.past_target)?;
        compare("future_time_feat", &self.future_time_feat, &expected.future_time_feat)?;
        compare("future_target", &self.future_target, &expected.future_target)
    }
}

fn compare(input: &str, got: &[usize], expected: &[usize]) -> Result<()> {
    if got[1..] == expected[1..] {
        return Ok(());
    }
    Err(CoreError::ShapeMismatch {
        input: input.to_string(),
        expected: describe(expected),
        got: describe(got),
    })
}

fn describe(dims: &[usize]) -> String {
    let tail: Vec<String> = dims[1..].iter().map(ToString::to_string).collect();
    format!("[N, {}]", tail.join(", "))
}
