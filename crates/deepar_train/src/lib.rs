//! # deepar_train
//!
//! Training loop, callbacks, metrics and forecast sampling for DeepAR
//! networks.
//!
//! This crate provides:
//! - [`ForecastTrainer`] fitting a network with Adam and gradient clipping
//! - [`NegativeLogLikelihood`], the masked training loss
//! - [`Rmsse`] scoring mean forecasts against the seasonal naive baseline
//! - Callbacks with lifecycle hooks, including progress logging and
//!   best-model checkpointing
//! - [`ForecastSampler`] producing mean or sampled forecasts
//!
//! ## Example
//!
//! ```rust,ignore
//! use deepar_train::{ForecastTrainer, ForecastTrainerConfig, ProgressCallback, SaveModelCallback};
//!
//! let mut trainer = ForecastTrainer::<Autodiff<NdArray>>::new(ForecastTrainerConfig::default(), device)
//!     .with_callback(ProgressCallback::default())
//!     .with_callback(SaveModelCallback::new("output/model"));
//! let result = trainer.fit(network, &train, Some(&test))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callback;
pub mod error;
pub mod losses;
pub mod metrics;
pub mod predict;
pub mod scheduler;
pub mod training;

pub use callback::{
    Callback, CallbackContext, CallbackList, Monitor, Monitored, ProgressCallback,
    SaveModelCallback, LOSS_PROPERTY, RMSSE_PROPERTY,
};
pub use error::{Result, TrainError};
pub use losses::NegativeLogLikelihood;
pub use metrics::{Rmsse, RmsseAccumulator};
pub use predict::{Forecast, ForecastMode, ForecastSampler};
pub use scheduler::{ConstantLR, LrSchedule, OneCycleLR, OneCycleLRConfig, Scheduler};
pub use training::{train_forecaster, ForecastTrainer, ForecastTrainerConfig, TrainingResult};
