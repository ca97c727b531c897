//! # deepar_data
//!
//! Series loading and windowing for DeepAR forecasting.
//!
//! This crate provides:
//! - [`Series`] and [`YearMonth`] for a univariate count series
//! - [`SeriesSource`] to fetch the `{start, target}` JSON over HTTP or from disk
//! - [`FeatureTransformPipeline`] for calendar and age features
//! - [`WindowedSeriesDataset`] slicing the training segment or the holdout
//! - [`WindowLoader`] batching windows into Burn tensors ([`WindowBatch`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use deepar_core::{Frequency, Usage};
//! use deepar_data::{SeriesSource, WindowConfig, WindowedSeriesDataset, WindowLoader};
//!
//! let series = Arc::new(SeriesSource::default().fetch()?);
//! let config = WindowConfig::new(Frequency::Monthly, 12, 12);
//! let train = WindowedSeriesDataset::build(series.clone(), Usage::Train, config.clone())?;
//! let test = WindowedSeriesDataset::build(series, Usage::Test, config)?;
//!
//! let loader = WindowLoader::builder(&train).batch_size(32).build()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
mod features;
mod loader;
mod sampler;
mod series;
mod source;

pub use dataset::{
    forecast_window, Window, WindowConfig, WindowDataset, WindowedSeriesDataset,
    DEFAULT_HOLDOUT_LENGTH,
};
pub use error::{DataError, Result};
pub use features::{age, FeatureTransformPipeline};
pub use loader::{WindowBatch, WindowChunks, WindowLoader, WindowLoaderBuilder, WindowLoaderIter};
pub use sampler::{RandomSampler, Sampler, SequentialSampler};
pub use series::{Series, YearMonth};
pub use source::{SeriesSource, AIR_PASSENGERS_URL};
