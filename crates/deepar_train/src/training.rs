//! The training loop.
//!
//! [`ForecastTrainer`] fits a [`DeepARTrainingNetwork`] on the windows of a
//! training dataset with Adam, and after every epoch scores mean forecasts of
//! the holdout windows with RMSSE. Batches are visited in a deterministic
//! order, and the optimizer step between batches is the only place weights
//! change.

use std::time::Instant;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

use deepar_core::{CoreError, Seed};
use deepar_data::{WindowBatch, WindowDataset, WindowLoader, WindowedSeriesDataset};
use deepar_models::{DeepARConfig, DeepARNetwork, DeepARPredictionNetwork, DeepARTrainingNetwork};

use crate::callback::{Callback, CallbackContext, CallbackList, Monitor, Monitored};
use crate::error::Result;
use crate::losses::NegativeLogLikelihood;
use crate::metrics::{Rmsse, RmsseAccumulator};
use crate::predict::{ForecastMode, ForecastSampler};
use crate::scheduler::LrSchedule;

/// Configuration for [`ForecastTrainer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTrainerConfig {
    /// Number of epochs.
    pub n_epochs: usize,
    /// Windows per batch.
    pub batch_size: usize,
    /// Base learning rate.
    pub lr: f64,
    /// Gradient norm clipping threshold (`None` = disabled).
    pub grad_clip: Option<f32>,
    /// Learning rate schedule.
    pub lr_schedule: LrSchedule,
    /// Shuffle training windows each epoch.
    pub shuffle: bool,
    /// Seed for shuffling.
    pub seed: Seed,
}

impl Default for ForecastTrainerConfig {
    fn default() -> Self {
        Self {
            n_epochs: 5,
            batch_size: 32,
            lr: 1e-3,
            grad_clip: Some(10.0),
            lr_schedule: LrSchedule::Constant,
            shuffle: false,
            seed: Seed::default(),
        }
    }
}

impl ForecastTrainerConfig {
    /// Set the number of epochs.
    #[must_use]
    pub fn with_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the base learning rate.
    #[must_use]
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the gradient norm clipping threshold.
    #[must_use]
    pub fn with_grad_clip(mut self, grad_clip: Option<f32>) -> Self {
        self.grad_clip = grad_clip;
        self
    }

    /// Set the learning rate schedule.
    #[must_use]
    pub fn with_lr_schedule(mut self, lr_schedule: LrSchedule) -> Self {
        self.lr_schedule = lr_schedule;
        self
    }

    /// Enable seeded shuffling.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero epochs or batch size, or a
    /// non-positive clipping threshold.
    pub fn validate(&self) -> Result<()> {
        if self.n_epochs == 0 || self.batch_size == 0 {
            return Err(CoreError::Configuration(format!(
                "n_epochs ({}) and batch_size ({}) must be positive",
                self.n_epochs, self.batch_size
            ))
            .into());
        }
        if matches!(self.grad_clip, Some(c) if !(c.is_finite() && c > 0.0)) {
            return Err(CoreError::Configuration(format!(
                "grad_clip must be positive, got {:?}",
                self.grad_clip
            ))
            .into());
        }
        Ok(())
    }
}

/// Result of a training run.
#[derive(Debug)]
pub struct TrainingResult<M> {
    /// Network from the best epoch.
    pub model: M,
    /// Mean training loss per epoch.
    pub loss_history: Vec<f32>,
    /// Validation loss per epoch (empty without validation data).
    pub valid_losses: Vec<f32>,
    /// Validation RMSSE per epoch.
    pub valid_rmsse: Vec<Option<f32>>,
    /// Monitored value at the best epoch.
    pub best_metric: Option<f32>,
    /// Quantity `best_metric` measures.
    pub best_monitor: Option<Monitor>,
    /// Best epoch (0-indexed).
    pub best_epoch: Option<usize>,
    /// Total training time in seconds.
    pub training_time_secs: f64,
}

/// Trainer for DeepAR networks.
pub struct ForecastTrainer<B: AutodiffBackend> {
    config: ForecastTrainerConfig,
    device: B::Device,
    callbacks: CallbackList<B::InnerBackend>,
    loss: NegativeLogLikelihood,
}

impl<B: AutodiffBackend> ForecastTrainer<B> {
    /// Create a new trainer without callbacks.
    pub fn new(config: ForecastTrainerConfig, device: B::Device) -> Self {
        Self {
            config,
            device,
            callbacks: CallbackList::new(),
            loss: NegativeLogLikelihood::new(),
        }
    }

    /// Add a callback.
    #[must_use]
    pub fn with_callback<C: Callback<B::InnerBackend> + 'static>(mut self, callback: C) -> Self {
        self.add_callback(callback);
        self
    }

    /// Add a callback.
    pub fn add_callback<C: Callback<B::InnerBackend> + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    /// The configuration.
    pub fn config(&self) -> &ForecastTrainerConfig {
        &self.config
    }

    /// Train `network` on `train`, validating on `valid` after each epoch.
    ///
    /// Shapes are checked against both datasets before the first epoch, so a
    /// mismatch fails without any weight update.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for shape or config mismatches, a
    /// numerical error for a non-finite loss or out-of-domain parameters,
    /// and propagates callback and checkpoint errors.
    pub fn fit(
        &mut self,
        network: DeepARTrainingNetwork<B>,
        train: &WindowedSeriesDataset,
        valid: Option<&WindowedSeriesDataset>,
    ) -> Result<TrainingResult<DeepARTrainingNetwork<B>>> {
        let start_time = Instant::now();
        self.config.validate()?;

        let (config, mut model) = network.into_parts();
        preflight(&config, train)?;
        if let Some(valid) = valid {
            preflight(&config, valid)?;
        }

        let loader = WindowLoader::builder(train)
            .batch_size(self.config.batch_size)
            .shuffle(self.config.shuffle)
            .seed(self.config.seed)
            .build()?;
        let valid_loader = valid
            .map(|ds| {
                WindowLoader::builder(ds)
                    .batch_size(self.config.batch_size)
                    .build()
            })
            .transpose()?;

        let n_epochs = self.config.n_epochs;
        let n_batches = loader.n_batches();
        let scheduler = self
            .config
            .lr_schedule
            .build(self.config.lr, n_epochs * n_batches)?;
        let mut optim = AdamConfig::new()
            .with_grad_clipping(self.config.grad_clip.map(GradientClippingConfig::Norm))
            .init::<B, DeepARNetwork<B>>();
        let metric = Rmsse::for_frequency(config.frequency);
        let inner_device: <B::InnerBackend as Backend>::Device = self.device.clone().into();

        tracing::info!(
            "Training on {} windows ({} validation), {} epochs, scheduler {}",
            train.size(),
            valid.map_or(0, |v| v.size()),
            n_epochs,
            scheduler.name()
        );

        let mut ctx = CallbackContext::new(n_epochs, n_batches);
        self.callbacks.before_fit(&mut ctx)?;

        let mut best_model = model.clone();
        let mut best: Option<Monitored> = None;
        let mut best_epoch = None;
        let mut loss_history = Vec::with_capacity(n_epochs);
        let mut valid_losses = Vec::with_capacity(n_epochs);
        let mut valid_rmsse = Vec::with_capacity(n_epochs);
        let mut global_step = 0;

        for epoch in 0..n_epochs {
            ctx.epoch = epoch;
            ctx.batch = 0;
            ctx.train_loss = None;
            ctx.valid_loss = None;
            ctx.rmsse = None;
            ctx.improved = false;
            self.callbacks.before_epoch(&mut ctx)?;

            let mut total_loss = 0.0f32;
            let mut batches = 0usize;
            for (batch_idx, batch) in loader.iter::<B>(epoch, &self.device).enumerate() {
                let batch = batch?;
                let lr = scheduler.get_lr(global_step);
                let (loss_value, next) = self.train_step(&config, model, &mut optim, &batch, lr)?;
                model = next;

                total_loss += loss_value;
                batches += 1;
                global_step += 1;

                ctx.batch = batch_idx;
                ctx.lr = lr;
                ctx.train_loss = Some(loss_value);
                self.callbacks.after_batch(&mut ctx)?;
            }
            let train_loss = total_loss / batches.max(1) as f32;
            loss_history.push(train_loss);
            ctx.train_loss = Some(train_loss);

            let predictor = DeepARPredictionNetwork::from_parts(config.clone(), model.clone().valid());
            if let Some(valid_loader) = &valid_loader {
                let (valid_loss, rmsse) =
                    self.evaluate(&predictor, valid_loader, metric, &inner_device)?;
                if let Some(loss) = valid_loss {
                    valid_losses.push(loss);
                }
                valid_rmsse.push(rmsse);
                ctx.valid_loss = valid_loss;
                ctx.rmsse = rmsse;
            }

            let monitored = ctx.monitored();
            ctx.improved = monitored.is_some_and(|current| current.improves_on(best.as_ref()));
            if ctx.improved {
                best = monitored;
                best_epoch = Some(epoch);
                best_model = model.clone();
            }

            self.callbacks.after_epoch(&mut ctx, &predictor)?;
            if ctx.stop_training {
                tracing::info!("Training stopped by callback after epoch {}", epoch + 1);
                break;
            }
        }

        self.callbacks.after_fit(&mut ctx)?;
        let training_time_secs = start_time.elapsed().as_secs_f64();
        tracing::info!("Training complete in {:.1}s", training_time_secs);
        if let (Some(best), Some(epoch)) = (best, best_epoch) {
            tracing::info!("Best {}: {:.5} at epoch {}", best.kind, best.value, epoch + 1);
        }

        Ok(TrainingResult {
            model: DeepARTrainingNetwork::from_parts(config, best_model),
            loss_history,
            valid_losses,
            valid_rmsse,
            best_metric: best.map(|m| m.value),
            best_monitor: best.map(|m| m.kind),
            best_epoch,
            training_time_secs,
        })
    }

    /// One optimizer step; returns the batch loss and the updated module.
    fn train_step<O>(
        &self,
        config: &DeepARConfig,
        model: DeepARNetwork<B>,
        optim: &mut O,
        batch: &WindowBatch<B>,
        lr: f64,
    ) -> Result<(f32, DeepARNetwork<B>)>
    where
        O: Optimizer<DeepARNetwork<B>, B>,
    {
        let network = DeepARTrainingNetwork::from_parts(config.clone(), model);
        let distribution = network.forward(batch)?;
        let loss = self.loss.forward(
            &distribution,
            batch.future_target.clone(),
            batch.future_observed.clone(),
        );
        let loss_value = loss.clone().into_scalar().elem::<f32>();
        if !loss_value.is_finite() {
            return Err(CoreError::Numerical(format!("training loss is {loss_value}")).into());
        }

        let grads = loss.backward();
        let (_, model) = network.into_parts();
        let grads = GradientsParams::from_grads(grads, &model);
        Ok((loss_value, optim.step(lr, model, grads)))
    }

    /// Validation loss over observed horizon values and mean RMSSE of the
    /// mean forecasts.
    fn evaluate(
        &self,
        predictor: &DeepARPredictionNetwork<B::InnerBackend>,
        loader: &WindowLoader<'_, WindowedSeriesDataset>,
        metric: Rmsse,
        device: &<B::InnerBackend as Backend>::Device,
    ) -> Result<(Option<f32>, Option<f32>)> {
        let evaluator = DeepARTrainingNetwork::from_parts(
            predictor.config().clone(),
            predictor.network().clone(),
        );
        let sampler = ForecastSampler::new(ForecastMode::Mean);
        let mut rmsse = RmsseAccumulator::new(metric);
        let mut loss_sum = 0.0f64;
        let mut observed = 0.0f64;

        for windows in loader.window_chunks(0) {
            let windows = windows?;
            let count: f32 = windows
                .iter()
                .map(|w| w.target_observed.iter().sum::<f32>())
                .sum();
            if count > 0.0 {
                let batch = WindowBatch::<B::InnerBackend>::from_windows(&windows, device)?;
                let distribution = evaluator.forward(&batch)?;
                let loss = self
                    .loss
                    .forward(&distribution, batch.future_target, batch.future_observed)
                    .into_scalar()
                    .elem::<f32>();
                loss_sum += f64::from(loss) * f64::from(count);
                observed += f64::from(count);
            }

            let forecasts = sampler.predict_batch(predictor, &windows, device)?;
            for (window, forecast) in windows.iter().zip(&forecasts) {
                rmsse.update(window, &forecast.mean);
            }
        }

        let valid_loss = (observed > 0.0).then(|| (loss_sum / observed) as f32);
        Ok((valid_loss, rmsse.value()))
    }
}

/// Checks run once before the first epoch.
fn preflight(config: &DeepARConfig, dataset: &WindowedSeriesDataset) -> Result<()> {
    config.validate()?;
    let window_config = dataset.config();
    if window_config.frequency != config.frequency {
        return Err(CoreError::Configuration(format!(
            "dataset frequency {} differs from network frequency {}",
            window_config.frequency, config.frequency
        ))
        .into());
    }
    config.check_input_shapes(&dataset.input_shapes(1))?;
    config.check_static_category(window_config.static_category)?;
    Ok(())
}

/// Convenience function to train a network with default settings.
///
/// # Errors
///
/// See [`ForecastTrainer::fit`].
pub fn train_forecaster<B: AutodiffBackend>(
    network: DeepARTrainingNetwork<B>,
    train: &WindowedSeriesDataset,
    valid: Option<&WindowedSeriesDataset>,
    n_epochs: usize,
    batch_size: usize,
    device: &B::Device,
) -> Result<TrainingResult<DeepARTrainingNetwork<B>>> {
    let config = ForecastTrainerConfig::default()
        .with_epochs(n_epochs)
        .with_batch_size(batch_size);
    ForecastTrainer::<B>::new(config, device.clone()).fit(network, train, valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use deepar_core::{Frequency, Usage};
    use deepar_data::{Series, WindowConfig, YearMonth};

    type TestBackend = Autodiff<NdArray>;
    type InnerBackend = NdArray;

    struct EpochCounter(Arc<AtomicUsize>);

    impl Callback<InnerBackend> for EpochCounter {
        fn before_epoch(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn datasets(context_length: usize) -> (WindowedSeriesDataset, WindowedSeriesDataset) {
        let values = (0..72)
            .map(|i| 40.0 + i as f32 * 0.5 + 10.0 * ((i % 12) as f32 / 2.0).sin().abs())
            .collect();
        let series = Arc::new(Series::new(YearMonth::new(1990, 1).unwrap(), values).unwrap());
        let config = WindowConfig::new(Frequency::Monthly, context_length, 6).with_holdout_length(12);
        (
            WindowedSeriesDataset::build(series.clone(), Usage::Train, config.clone()).unwrap(),
            WindowedSeriesDataset::build(series, Usage::Test, config).unwrap(),
        )
    }

    fn network(context_length: usize) -> DeepARTrainingNetwork<TestBackend> {
        DeepARConfig::new(Frequency::Monthly, 6, vec![60])
            .with_context_length(context_length)
            .with_hidden_size(4)
            .with_num_layers(1)
            .build_training(&Default::default())
            .unwrap()
    }

    #[test]
    fn test_trainer_config_default() {
        let config = ForecastTrainerConfig::default();
        assert_eq!(config.n_epochs, 5);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.lr, 1e-3);
        assert_eq!(config.grad_clip, Some(10.0));
        assert!(!config.shuffle);
        assert!(config.validate().is_ok());
        assert!(config.clone().with_epochs(0).validate().is_err());
        assert!(config.with_grad_clip(Some(-1.0)).validate().is_err());
    }

    #[test]
    fn test_shape_mismatch_fails_before_any_epoch() {
        let (train, valid) = datasets(12);
        let epochs = Arc::new(AtomicUsize::new(0));
        let mut trainer = ForecastTrainer::<TestBackend>::new(
            ForecastTrainerConfig::default(),
            Default::default(),
        )
        .with_callback(EpochCounter(epochs.clone()));

        let err = trainer.fit(network(6), &train, Some(&valid)).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(epochs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fit_records_history() {
        let (train, valid) = datasets(12);
        let epochs = Arc::new(AtomicUsize::new(0));
        let config = ForecastTrainerConfig::default()
            .with_epochs(2)
            .with_batch_size(16)
            .with_lr(1e-2);
        let mut trainer = ForecastTrainer::<TestBackend>::new(config, Default::default())
            .with_callback(EpochCounter(epochs.clone()));

        let result = trainer.fit(network(12), &train, Some(&valid)).unwrap();
        assert_eq!(epochs.load(Ordering::SeqCst), 2);
        assert_eq!(result.loss_history.len(), 2);
        assert!(result.loss_history.iter().all(|l| l.is_finite()));
        assert_eq!(result.valid_losses.len(), 2);
        assert_eq!(result.valid_rmsse.len(), 2);
        assert!(result.valid_rmsse.iter().all(Option::is_some));
        assert!(result.best_epoch.is_some());
        assert!(result.best_metric.unwrap().is_finite());
    }

    #[test]
    fn test_train_without_validation_monitors_train_loss() {
        let (train, _) = datasets(12);
        let result =
            train_forecaster(network(12), &train, None, 1, 32, &Default::default()).unwrap();
        assert!(result.valid_rmsse.is_empty());
        assert_eq!(result.best_metric, result.loss_history.first().copied());
        assert_eq!(result.best_monitor, Some(Monitor::TrainLoss));
    }
}
