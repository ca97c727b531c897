//! Negative binomial output distribution.
//!
//! Parameterized by mean `mu` and dispersion `alpha`, so that
//! `Var[Y] = mu + alpha * mu^2`. The network emits two unconstrained values
//! per step which [`DistributionOutput::distribution`] maps into the domain
//! with softplus; the mean is then multiplied by the series scale.

use burn::prelude::*;
use burn::tensor::activation::softplus;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};
use serde::{Deserialize, Serialize};

use deepar_core::{CoreError, Result};

/// Floor added after softplus so parameters stay strictly positive.
const PARAM_FLOOR: f64 = 1e-6;

/// Which distribution the network head parameterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DistributionOutput {
    /// Negative binomial over non-negative counts.
    #[default]
    NegativeBinomial,
}

impl DistributionOutput {
    /// Unconstrained values the head emits per time step.
    #[must_use]
    pub const fn args_dim(&self) -> usize {
        match self {
            Self::NegativeBinomial => 2,
        }
    }

    /// Map raw head outputs `[N, T, args_dim]` and scale `[N, 1]` to a
    /// distribution over `[N, T]`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Numerical`] if the mapped parameters are not
    /// finite.
    pub fn distribution<B: Backend>(
        &self,
        raw: Tensor<B, 3>,
        scale: Tensor<B, 2>,
    ) -> Result<NegativeBinomial<B, 2>> {
        let [n, t, _] = raw.dims();
        let mu_raw = raw.clone().slice([0..n, 0..t, 0..1]).reshape([n, t]);
        let alpha_raw = raw.slice([0..n, 0..t, 1..2]).reshape([n, t]);

        let mu = (softplus(mu_raw, 1.0) + PARAM_FLOOR) * scale;
        let alpha = softplus(alpha_raw, 1.0) + PARAM_FLOOR;
        NegativeBinomial::new(mu, alpha)
    }
}

/// A batch of negative binomial distributions with matching shapes.
#[derive(Debug, Clone)]
pub struct NegativeBinomial<B: Backend, const D: usize> {
    mu: Tensor<B, D>,
    alpha: Tensor<B, D>,
}

impl<B: Backend, const D: usize> NegativeBinomial<B, D> {
    /// Create from mean and dispersion tensors.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Numerical`] unless every `mu >= 0`, every
    /// `alpha > 0` and all values are finite.
    pub fn new(mu: Tensor<B, D>, alpha: Tensor<B, D>) -> Result<Self> {
        if mu.dims() != alpha.dims() {
            return Err(CoreError::Numerical(format!(
                "mean shape {:?} differs from dispersion shape {:?}",
                mu.dims(),
                alpha.dims()
            )));
        }
        for (m, a) in host_values(&mu).into_iter().zip(host_values(&alpha)) {
            check_params(m, a)?;
        }
        Ok(Self { mu, alpha })
    }

    /// Mean `mu`.
    pub fn mean(&self) -> Tensor<B, D> {
        self.mu.clone()
    }

    /// Dispersion `alpha`.
    pub fn dispersion(&self) -> Tensor<B, D> {
        self.alpha.clone()
    }

    /// Variance `mu + alpha * mu^2`.
    pub fn variance(&self) -> Tensor<B, D> {
        self.mu.clone() + self.alpha.clone() * self.mu.clone().powf_scalar(2.0)
    }

    /// Log-probability of the counts `y`.
    pub fn log_prob(&self, y: Tensor<B, D>) -> Tensor<B, D> {
        let alpha_inv = self.alpha.clone().recip();
        let alpha_mu = self.alpha.clone() * self.mu.clone();

        let log_odds = alpha_mu.clone().log() - alpha_mu.clone().log1p();
        y.clone() * log_odds - alpha_inv.clone() * alpha_mu.log1p()
            + lgamma(y.clone() + alpha_inv.clone())
            - lgamma(y.add_scalar(1.0))
            - lgamma(alpha_inv)
    }

    /// Per-element parameters copied to the host, in row-major order.
    pub fn to_params(&self) -> Result<Vec<NegativeBinomialParams>> {
        host_values(&self.mu)
            .into_iter()
            .zip(host_values(&self.alpha))
            .map(|(m, a)| NegativeBinomialParams::new(m, a))
            .collect()
    }
}

fn host_values<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Vec<f32> {
    tensor.clone().into_data().iter::<f32>().collect()
}

fn check_params(mean: f32, dispersion: f32) -> Result<()> {
    if !mean.is_finite() || !dispersion.is_finite() {
        return Err(CoreError::Numerical(format!(
            "non-finite negative binomial parameters (mean {mean}, dispersion {dispersion})"
        )));
    }
    if mean < 0.0 {
        return Err(CoreError::Numerical(format!("negative mean {mean}")));
    }
    if dispersion <= 0.0 {
        return Err(CoreError::Numerical(format!(
            "dispersion {dispersion} must be positive"
        )));
    }
    Ok(())
}

/// Host-side parameters of one forecast step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegativeBinomialParams {
    /// Mean `mu >= 0`.
    pub mean: f32,
    /// Dispersion `alpha > 0`.
    pub dispersion: f32,
}

impl NegativeBinomialParams {
    /// Create validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Numerical`] outside the domain.
    pub fn new(mean: f32, dispersion: f32) -> Result<Self> {
        check_params(mean, dispersion)?;
        Ok(Self { mean, dispersion })
    }

    /// Variance `mu + alpha * mu^2`.
    #[must_use]
    pub fn variance(&self) -> f32 {
        self.mean + self.dispersion * self.mean * self.mean
    }

    /// Draw one count through the gamma-Poisson mixture.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Numerical`] if the mixture cannot be formed.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f32> {
        if self.mean == 0.0 {
            return Ok(0.0);
        }
        let shape = 1.0 / f64::from(self.dispersion);
        let scale = f64::from(self.mean) * f64::from(self.dispersion);
        let gamma = Gamma::new(shape, scale)
            .map_err(|e| CoreError::Numerical(format!("gamma({shape}, {scale}): {e}")))?;
        let rate = gamma.sample(rng);
        if rate <= 0.0 {
            return Ok(0.0);
        }
        let poisson = Poisson::new(rate)
            .map_err(|e| CoreError::Numerical(format!("poisson({rate}): {e}")))?;
        Ok(poisson.sample(rng) as f32)
    }
}

/// Log-gamma for positive arguments, built from differentiable tensor ops.
///
/// Shifts the argument by six with the recurrence
/// `ln G(x) = ln G(x + 6) - sum(ln(x + k), k = 0..6)` and evaluates the
/// Stirling series at `x + 6`, which keeps the absolute error below 1e-8.
pub fn lgamma<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let mut shift = x.clone().log();
    for k in 1..6 {
        shift = shift + x.clone().add_scalar(k as f64).log();
    }

    let z = x.add_scalar(6.0);
    let z_inv = z.clone().recip();
    let z_inv2 = z_inv.clone().powf_scalar(2.0);
    // 1/(12z) - 1/(360z^3) + 1/(1260z^5)
    let series = z_inv.clone()
        * (z_inv2.clone().mul_scalar(1.0 / 1260.0).sub_scalar(1.0 / 360.0) * z_inv2)
            .add_scalar(1.0 / 12.0);

    let stirling = (z.clone().sub_scalar(0.5) * z.clone().log()) - z
        + series.add_scalar(0.5 * (2.0 * std::f64::consts::PI).ln());
    stirling - shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;
    use deepar_core::Seed;

    type TestBackend = NdArray;

    fn tensor(values: &[f32]) -> Tensor<TestBackend, 1> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), &Default::default())
    }

    fn values(t: Tensor<TestBackend, 1>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_lgamma_reference_values() {
        let out = values(lgamma(tensor(&[1.0, 2.0, 0.5, 10.0, 3.7])));
        let expected = [0.0, 0.0, 0.572_364_94, 12.801_827, 1.428_072_3];
        for (got, want) in out.iter().zip(expected) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_log_prob_matches_closed_form() {
        // r = 1/alpha = 2, mu = 2, y = 3: P = C(4,3) (1/2)^2 (1/2)^3 = 0.125
        let nb = NegativeBinomial::new(tensor(&[2.0]), tensor(&[0.5])).unwrap();
        let lp = values(nb.log_prob(tensor(&[3.0])));
        assert_abs_diff_eq!(lp[0], 0.125f32.ln(), epsilon = 1e-4);

        // y = 0 reduces to -(1/alpha) ln(1 + alpha mu)
        let nb = NegativeBinomial::new(tensor(&[4.0]), tensor(&[0.25])).unwrap();
        let lp = values(nb.log_prob(tensor(&[0.0])));
        assert_abs_diff_eq!(lp[0], -4.0 * 2f32.ln(), epsilon = 1e-4);
    }

    #[test]
    fn test_log_prob_peaks_near_mean() {
        let nb = NegativeBinomial::new(tensor(&[100.0; 3]), tensor(&[0.01; 3])).unwrap();
        let lp = values(nb.log_prob(tensor(&[50.0, 100.0, 150.0])));
        assert!(lp[1] > lp[0]);
        assert!(lp[1] > lp[2]);
    }

    #[test]
    fn test_invalid_params_are_numerical_errors() {
        let err = NegativeBinomial::new(tensor(&[1.0]), tensor(&[0.0])).unwrap_err();
        assert!(err.is_numerical());
        assert!(NegativeBinomial::new(tensor(&[-1.0]), tensor(&[1.0])).is_err());
        assert!(NegativeBinomial::new(tensor(&[f32::NAN]), tensor(&[1.0])).is_err());
        assert!(NegativeBinomialParams::new(1.0, f32::INFINITY).is_err());
    }

    #[test]
    fn test_domain_map_is_positive_and_scaled() {
        let device = Default::default();
        let raw = Tensor::<TestBackend, 3>::from_floats([[[-30.0, -30.0], [0.0, 0.0]]], &device);
        let scale = Tensor::<TestBackend, 2>::from_floats([[10.0]], &device);
        let dist = DistributionOutput::NegativeBinomial
            .distribution(raw, scale)
            .unwrap();
        let params = dist.to_params().unwrap();
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|p| p.dispersion > 0.0 && p.mean >= 0.0));
        assert_abs_diff_eq!(params[1].mean, 10.0 * 2f32.ln(), epsilon = 1e-4);
    }

    #[test]
    fn test_sample_mean_and_variance() {
        let params = NegativeBinomialParams::new(20.0, 0.1).unwrap();
        let mut rng = Seed::new(3).to_rng();
        let draws: Vec<f32> = (0..20_000).map(|_| params.sample(&mut rng).unwrap()).collect();
        let mean = draws.iter().sum::<f32>() / draws.len() as f32;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f32>() / draws.len() as f32;
        assert!((mean - 20.0).abs() < 0.5, "sample mean {mean}");
        assert!((var - params.variance()).abs() < 6.0, "sample variance {var}");
        assert!(draws.iter().all(|d| *d >= 0.0 && d.fract() == 0.0));
    }
}
