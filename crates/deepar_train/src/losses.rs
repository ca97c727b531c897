//! Loss functions.

use burn::prelude::*;

use deepar_models::NegativeBinomial;

/// Negative log-likelihood of observed values under a negative binomial.
///
/// Padded positions carry a zero in `observed` and do not contribute; the
/// sum is divided by the number of observed positions (at least one).
#[derive(Debug, Clone, Copy, Default)]
pub struct NegativeLogLikelihood;

impl NegativeLogLikelihood {
    /// Create a new loss.
    pub fn new() -> Self {
        Self
    }

    /// Compute the masked mean loss, a single-element tensor.
    pub fn forward<B: Backend>(
        &self,
        distribution: &NegativeBinomial<B, 2>,
        target: Tensor<B, 2>,
        observed: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let count = observed.clone().sum().clamp_min(1.0);
        let log_likelihood = (distribution.log_prob(target) * observed).sum();
        log_likelihood.neg() / count
    }
}
