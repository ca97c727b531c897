//! Turning a prediction network and context windows into forecasts.
//!
//! [`ForecastSampler`] never touches the weights; it only runs the
//! autoregressive rollout of a [`DeepARPredictionNetwork`] and copies the
//! results to the host.
//!
//! # Example
//!
//! ```rust,ignore
//! use deepar_train::{ForecastMode, ForecastSampler};
//!
//! let window = forecast_window(&series, &window_config)?;
//! let forecast = ForecastSampler::new(ForecastMode::Mean).predict(&network, &window, &device)?;
//! println!("{:?}", forecast.mean);
//! ```

use burn::prelude::*;
use burn::tensor::TensorData;

use deepar_core::{CoreError, Frequency, Seed};
use deepar_data::{DataError, Series, Window, WindowBatch, YearMonth};
use deepar_models::{DeepARPredictionNetwork, NegativeBinomialParams};

use crate::error::{Result, TrainError};

/// What is fed back into the network during the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForecastMode {
    /// Feed back the distribution mean; deterministic.
    #[default]
    Mean,
    /// Draw `num_samples` trajectories, feeding back each sampled count.
    Samples {
        /// Number of trajectories per window.
        num_samples: usize,
    },
}

/// Forecast for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Position (periods from the series start) of the first forecast step.
    pub forecast_start: usize,
    /// Point forecast per step.
    ///
    /// In [`ForecastMode::Mean`] this is the rollout mean; with sampling it is
    /// the average over trajectories.
    pub mean: Vec<f32>,
    /// Per-step distribution parameters of the mean rollout.
    pub params: Vec<NegativeBinomialParams>,
    /// Sampled trajectories, empty in [`ForecastMode::Mean`].
    pub samples: Vec<Vec<f32>>,
}

impl Forecast {
    /// Number of forecast steps.
    pub fn prediction_length(&self) -> usize {
        self.mean.len()
    }

    /// Month of the first forecast step.
    ///
    /// # Errors
    ///
    /// Propagates calendar overflow from [`Series::timestamp`].
    pub fn start_date(&self, series: &Series, frequency: Frequency) -> Result<YearMonth> {
        Ok(series.timestamp(self.forecast_start, frequency)?)
    }

    /// Per-step empirical quantile of the sampled trajectories.
    ///
    /// Returns `None` without samples or for `q` outside `[0, 1]`.
    pub fn quantile(&self, q: f32) -> Option<Vec<f32>> {
        if self.samples.is_empty() || !(0.0..=1.0).contains(&q) {
            return None;
        }
        let n = self.samples.len();
        let rank = ((n - 1) as f32 * q).round() as usize;
        let quantiles = (0..self.prediction_length())
            .map(|step| {
                let mut column: Vec<f32> = self.samples.iter().map(|path| path[step]).collect();
                column.sort_by(f32::total_cmp);
                column[rank]
            })
            .collect();
        Some(quantiles)
    }
}

/// Produces [`Forecast`]s from a prediction network.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastSampler {
    mode: ForecastMode,
    seed: Seed,
}

impl ForecastSampler {
    /// Create a sampler.
    #[must_use]
    pub fn new(mode: ForecastMode) -> Self {
        Self {
            mode,
            seed: Seed::default(),
        }
    }

    /// Set the seed of the sampling stream.
    #[must_use]
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// The rollout mode.
    pub fn mode(&self) -> ForecastMode {
        self.mode
    }

    /// Forecast the horizon of a single window.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a window that does not fit the
    /// network and a numerical error for out-of-domain parameters.
    pub fn predict<B: Backend>(
        &self,
        network: &DeepARPredictionNetwork<B>,
        window: &Window,
        device: &B::Device,
    ) -> Result<Forecast> {
        self.predict_batch(network, std::slice::from_ref(window), device)?
            .pop()
            .ok_or(TrainError::DataError(DataError::EmptyDataset))
    }

    /// Forecast every window in one batched rollout.
    ///
    /// # Errors
    ///
    /// See [`ForecastSampler::predict`].
    pub fn predict_batch<B: Backend>(
        &self,
        network: &DeepARPredictionNetwork<B>,
        windows: &[Window],
        device: &B::Device,
    ) -> Result<Vec<Forecast>> {
        let batch = WindowBatch::<B>::from_windows(windows, device)?;
        let n = windows.len();
        let p = network.config().prediction_length;

        let rollout = network.rollout(&batch, |dist| Ok(dist.mean()))?;
        let params = host_values(rollout.mean)
            .into_iter()
            .zip(host_values(rollout.dispersion))
            .map(|(m, a)| NegativeBinomialParams::new(m, a))
            .collect::<deepar_core::Result<Vec<_>>>()?;

        let mut paths = match self.mode {
            ForecastMode::Mean => vec![Vec::new(); n],
            ForecastMode::Samples { num_samples } => {
                self.sample_paths(network, &batch, num_samples, device)?
            }
        };

        let forecasts = windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let params = params[i * p..(i + 1) * p].to_vec();
                let samples = std::mem::take(&mut paths[i]);
                let mean = if samples.is_empty() {
                    params.iter().map(|param| param.mean).collect()
                } else {
                    (0..p)
                        .map(|step| {
                            samples.iter().map(|path| path[step]).sum::<f32>() / samples.len() as f32
                        })
                        .collect()
                };
                Forecast {
                    forecast_start: window.forecast_start,
                    mean,
                    params,
                    samples,
                }
            })
            .collect();
        Ok(forecasts)
    }

    /// Trajectories per window; row `s * N + i` of the repeated batch is
    /// sample `s` of window `i`.
    fn sample_paths<B: Backend>(
        &self,
        network: &DeepARPredictionNetwork<B>,
        batch: &WindowBatch<B>,
        num_samples: usize,
        device: &B::Device,
    ) -> Result<Vec<Vec<Vec<f32>>>> {
        if num_samples == 0 {
            return Err(CoreError::Configuration("num_samples must be positive".into()).into());
        }
        let n = batch.batch_size();
        let p = network.config().prediction_length;
        let mut rng = self.seed.derive("sampling").to_rng();

        let rollout = network.rollout(&batch.repeat(num_samples), |dist| {
            let draws = dist
                .to_params()?
                .iter()
                .map(|param| param.sample(&mut rng))
                .collect::<deepar_core::Result<Vec<f32>>>()?;
            let rows = draws.len();
            Ok(Tensor::from_data(TensorData::new(draws, [rows, 1]), device))
        })?;

        let values = host_values(rollout.values);
        let mut paths = vec![Vec::with_capacity(num_samples); n];
        for s in 0..num_samples {
            for (i, window_paths) in paths.iter_mut().enumerate() {
                let row = s * n + i;
                window_paths.push(values[row * p..(row + 1) * p].to_vec());
            }
        }
        Ok(paths)
    }
}

fn host_values<B: Backend>(tensor: Tensor<B, 2>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use deepar_data::{forecast_window, WindowConfig};
    use deepar_models::DeepARConfig;

    type TestBackend = NdArray;

    fn series() -> Series {
        let values = (0..60).map(|i| 50.0 + (i % 12) as f32 * 3.0).collect();
        Series::new(YearMonth::new(2000, 1).unwrap(), values).unwrap()
    }

    fn network() -> DeepARPredictionNetwork<TestBackend> {
        DeepARConfig::new(Frequency::Monthly, 6, vec![28])
            .with_context_length(12)
            .with_hidden_size(8)
            .build_inference(&Default::default())
            .unwrap()
    }

    fn window() -> Window {
        let config = WindowConfig::new(Frequency::Monthly, 12, 6).with_holdout_length(12);
        forecast_window(&series(), &config).unwrap()
    }

    #[test]
    fn test_mean_forecast() {
        let device = Default::default();
        let forecast = ForecastSampler::default()
            .predict(&network(), &window(), &device)
            .unwrap();
        assert_eq!(forecast.prediction_length(), 6);
        assert_eq!(forecast.forecast_start, 60);
        assert!(forecast.samples.is_empty());
        assert!(forecast.mean.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(forecast.params.iter().all(|p| p.dispersion > 0.0));
        assert_eq!(
            forecast.start_date(&series(), Frequency::Monthly).unwrap(),
            YearMonth::new(2005, 1).unwrap()
        );
        assert_eq!(forecast.quantile(0.5), None);
    }

    #[test]
    fn test_sampling_is_seeded() {
        let device = Default::default();
        let sampler = ForecastSampler::new(ForecastMode::Samples { num_samples: 5 })
            .with_seed(Seed::new(7));
        let net = network();
        let a = sampler.predict(&net, &window(), &device).unwrap();
        let b = sampler.predict(&net, &window(), &device).unwrap();
        assert_eq!(a.samples.len(), 5);
        assert!(a.samples.iter().all(|path| path.len() == 6));
        assert_eq!(a, b);
        assert!(a.samples.iter().flatten().all(|v| *v >= 0.0 && v.fract() == 0.0));

        let low = a.quantile(0.0).unwrap();
        let high = a.quantile(1.0).unwrap();
        assert!(low.iter().zip(&high).all(|(l, h)| l <= h));
    }

    #[test]
    fn test_batch_matches_single() {
        let device = Default::default();
        let net = network();
        let sampler = ForecastSampler::default();
        let w = window();
        let batch = sampler
            .predict_batch(&net, &[w.clone(), w.clone()], &device)
            .unwrap();
        let single = sampler.predict(&net, &w, &device).unwrap();
        assert_eq!(batch.len(), 2);
        for (a, b) in batch[1].mean.iter().zip(&single.mean) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_samples_rejected() {
        let err = ForecastSampler::new(ForecastMode::Samples { num_samples: 0 })
            .predict(&network(), &window(), &Default::default())
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
