//! # deepar_models
//!
//! The DeepAR network for count-valued series, built on Burn.
//!
//! This crate provides:
//! - [`DeepARConfig`] building a [`DeepARTrainingNetwork`] (teacher forcing)
//!   or a [`DeepARPredictionNetwork`] (autoregressive rollout) around one
//!   shared [`DeepARNetwork`] module
//! - [`NegativeBinomial`] output distribution and its host-side
//!   [`NegativeBinomialParams`]
//! - [`checkpoint`] utilities storing weights, configuration and properties
//!
//! ## Example
//!
//! ```rust,ignore
//! use deepar_core::Frequency;
//! use deepar_models::DeepARConfig;
//!
//! let config = DeepARConfig::new(Frequency::Monthly, 12, vec![112]);
//! let training = config.build_training::<Autodiff<NdArray>>(&device)?;
//! let dist = training.forward(&batch)?;
//! let nll = -dist.log_prob(batch.future_target.clone()).mean();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
mod deepar;
mod distribution;
mod scaler;

pub use deepar::{
    lagged_subsequences, DeepARConfig, DeepARNetwork, DeepARPredictionNetwork,
    DeepARTrainingNetwork, Rollout,
};
pub use distribution::{lgamma, DistributionOutput, NegativeBinomial, NegativeBinomialParams};
pub use scaler::{mean_scale, MIN_SCALE};
