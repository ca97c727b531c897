//! # deepar_core
//!
//! Core types shared by every DeepAR forecasting crate.
//!
//! This crate provides:
//! - [`CoreError`], the configuration and numerical half of the error taxonomy
//! - [`Frequency`] with its lag indices, season length and calendar features
//! - [`Usage`] to tell the training segment of a series from the holdout
//! - [`InputShapes`] describing the tensors a network declares as input
//! - [`Seed`] for deterministic sampling and shuffling
//!
//! ## Shape Convention
//!
//! Sequence tensors follow `(N, T, F)`:
//! - `N`: batch size (number of windows)
//! - `T`: time steps (history length or prediction length)
//! - `F`: features per time step
//!
//! ## Example
//!
//! ```rust
//! use deepar_core::{Frequency, InputShapes};
//!
//! let freq = Frequency::Monthly;
//! let history_length = freq.history_length(12);
//! assert_eq!(history_length, 49);
//!
//! let shapes = InputShapes::declared(1, 1, history_length, 12, 2);
//! assert_eq!(shapes.past_time_feat, [1, 49, 2]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frequency;
mod seed;
mod shape;
mod usage;

pub use error::{CoreError, Result};
pub use frequency::{Frequency, TimeFeature};
pub use seed::Seed;
pub use shape::InputShapes;
pub use usage::Usage;
