//! # deepar
//!
//! Probabilistic forecasting of monthly count series with an autoregressive
//! recurrent network and a negative binomial output.
//!
//! - **Data**: series sources, calendar and age features, windowed datasets
//!   with a fixed holdout
//! - **Models**: the DeepAR network in training and prediction variants,
//!   checkpoints
//! - **Training**: negative log-likelihood, RMSSE, callbacks, schedulers
//! - **Forecasting**: mean and sampled trajectories
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use deepar::prelude::*;
//! use deepar::backend::{InferBackend, TrainBackend};
//!
//! let series = Arc::new(SeriesSource::default().fetch()?);
//! let windows = WindowConfig::new(Frequency::Monthly, 12, 12);
//! let train = WindowedSeriesDataset::build(series.clone(), Usage::Train, windows.clone())?;
//! let test = WindowedSeriesDataset::build(series.clone(), Usage::Test, windows.clone())?;
//!
//! let device = Default::default();
//! let network = DeepARConfig::new(Frequency::Monthly, 12, vec![train.size()])
//!     .build_training::<TrainBackend>(&device)?;
//! ForecastTrainer::new(ForecastTrainerConfig::default(), device)
//!     .with_callback(SaveModelCallback::new("output/model"))
//!     .fit(network, &train, Some(&test))?;
//!
//! let predictor = load_checkpoint::<InferBackend>("output/model", &device)?.into_inference();
//! let window = forecast_window(&series, &windows)?;
//! let forecast = ForecastSampler::default().predict(&predictor, &window, &device)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use deepar_core as core;
pub use deepar_data as data;
pub use deepar_models as models;
pub use deepar_train as train;

pub use error::ErrorKind;

/// Backends used by the binary and the integration tests.
pub mod backend {
    pub use burn_autodiff::Autodiff;
    pub use burn_ndarray::NdArray;

    /// CPU backend with automatic differentiation, for training.
    pub type TrainBackend = Autodiff<NdArray>;

    /// CPU backend for inference.
    pub type InferBackend = NdArray;
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use deepar::prelude::*;
///
/// let config = WindowConfig::new(Frequency::Monthly, 12, 12);
/// assert_eq!(config.holdout_length, DEFAULT_HOLDOUT_LENGTH);
/// ```
pub mod prelude {
    pub use deepar_core::{CoreError, Frequency, Seed, Usage};

    pub use deepar_data::{
        forecast_window, DataError, Series, SeriesSource, Window, WindowConfig, WindowDataset,
        WindowedSeriesDataset, YearMonth, AIR_PASSENGERS_URL, DEFAULT_HOLDOUT_LENGTH,
    };

    pub use deepar_models::checkpoint::{
        load_checkpoint, save_checkpoint, CheckpointError, LoadedModel, ModelProperties,
    };
    pub use deepar_models::{
        DeepARConfig, DeepARPredictionNetwork, DeepARTrainingNetwork, NegativeBinomialParams,
    };

    pub use deepar_train::{
        Forecast, ForecastMode, ForecastSampler, ForecastTrainer, ForecastTrainerConfig,
        LrSchedule, ProgressCallback, SaveModelCallback, TrainError, TrainingResult,
    };

    pub use crate::error::ErrorKind;
}
