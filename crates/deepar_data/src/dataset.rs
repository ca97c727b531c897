//! Windowed views over the training and holdout segments of a series.

use std::ops::Range;
use std::sync::Arc;

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use deepar_core::{CoreError, Frequency, InputShapes, Usage};

use crate::error::{DataError, Result};
use crate::features::FeatureTransformPipeline;
use crate::series::Series;

/// Number of most recent points reserved as the holdout.
pub const DEFAULT_HOLDOUT_LENGTH: usize = 32;

/// Window geometry shared by the training and holdout datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Sampling frequency of the series.
    pub frequency: Frequency,
    /// Steps the network conditions on before forecasting.
    pub context_length: usize,
    /// Steps forecast per window.
    pub prediction_length: usize,
    /// Points at the end of the series reserved for testing.
    pub holdout_length: usize,
    /// Static category attached to every window.
    pub static_category: Option<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Monthly,
            context_length: 12,
            prediction_length: 12,
            holdout_length: DEFAULT_HOLDOUT_LENGTH,
            static_category: None,
        }
    }
}

impl WindowConfig {
    /// Create a config with the default holdout.
    #[must_use]
    pub fn new(frequency: Frequency, context_length: usize, prediction_length: usize) -> Self {
        Self {
            frequency,
            context_length,
            prediction_length,
            ..Default::default()
        }
    }

    /// Set the holdout length.
    #[must_use]
    pub fn with_holdout_length(mut self, holdout_length: usize) -> Self {
        self.holdout_length = holdout_length;
        self
    }

    /// Set the static category.
    #[must_use]
    pub fn with_static_category(mut self, category: usize) -> Self {
        self.static_category = Some(category);
        self
    }

    /// `context_length + max_lag`.
    #[must_use]
    pub fn history_length(&self) -> usize {
        self.frequency.history_length(self.context_length)
    }

    /// Input shapes of a batch of `batch` windows.
    #[must_use]
    pub fn input_shapes(&self, batch: usize) -> InputShapes {
        InputShapes::declared(
            batch,
            1,
            self.history_length(),
            self.prediction_length,
            self.frequency.num_time_features(),
        )
    }

    /// Check the config against a series of `series_len` points.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero lengths, a holdout that leaves
    /// no training data, or a series too short for one full window.
    pub fn validate(&self, series_len: usize) -> deepar_core::Result<()> {
        if self.context_length == 0 || self.prediction_length == 0 {
            return Err(CoreError::Configuration(
                "context_length and prediction_length must be positive".into(),
            ));
        }
        if self.holdout_length == 0 || self.holdout_length >= series_len {
            return Err(CoreError::Configuration(format!(
                "holdout_length {} must lie in 1..{} for a series of {} points",
                self.holdout_length, series_len, series_len
            )));
        }
        if series_len <= self.context_length + self.prediction_length {
            return Err(CoreError::Configuration(format!(
                "series of length {} is too short for context_length {} + prediction_length {}",
                series_len, self.context_length, self.prediction_length
            )));
        }
        Ok(())
    }
}

/// One forecast origin: the history before it and the horizon after it.
///
/// Slots outside the dataset's segment hold zero and are flagged unobserved
/// in the masks, so a window never carries a value from the other segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Position (periods from the series start) of the first target step.
    pub forecast_start: usize,
    /// History values, length `history_length`, oldest first.
    pub context: Vec<f32>,
    /// 1.0 where `context` holds an observation, 0.0 for padding.
    pub context_observed: Vec<f32>,
    /// Horizon values, length `prediction_length`.
    pub target: Vec<f32>,
    /// 1.0 where `target` holds an observation, 0.0 for padding.
    pub target_observed: Vec<f32>,
    /// Per-step features for history then horizon, `[H + P, F + 1]`.
    pub calendar_features: Array2<f32>,
    /// Static category of the series.
    pub static_category: Option<usize>,
}

impl Window {
    /// Length of the history.
    #[must_use]
    pub fn history_length(&self) -> usize {
        self.context.len()
    }

    /// Length of the horizon.
    #[must_use]
    pub fn prediction_length(&self) -> usize {
        self.target.len()
    }

    /// Features of the history rows.
    #[must_use]
    pub fn past_time_features(&self) -> ArrayView2<'_, f32> {
        self.calendar_features.slice(s![..self.history_length(), ..])
    }

    /// Features of the horizon rows.
    #[must_use]
    pub fn future_time_features(&self) -> ArrayView2<'_, f32> {
        self.calendar_features.slice(s![self.history_length().., ..])
    }

    /// Positions of every observed value in the window, history then horizon.
    #[must_use]
    pub fn observed_positions(&self) -> Vec<usize> {
        let h = self.history_length();
        let history = self
            .context_observed
            .iter()
            .enumerate()
            .filter(|(_, o)| **o > 0.0)
            .map(move |(i, _)| self.forecast_start + i - h);
        let horizon = self
            .target_observed
            .iter()
            .enumerate()
            .filter(|(_, o)| **o > 0.0)
            .map(|(j, _)| self.forecast_start + j);
        history.chain(horizon).collect()
    }
}

/// A source of forecast windows addressed by index.
pub trait WindowDataset {
    /// Number of windows.
    fn size(&self) -> usize;

    /// Window at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::IndexOutOfBounds`] for `index >= size()`.
    fn get_window(&self, index: usize) -> Result<Window>;

    /// Check if the dataset has no windows.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Windows over one segment of a series split at a fixed holdout.
///
/// Window `i` forecasts from position `segment.start + i`, so the training
/// dataset exposes one window per pre-holdout point and the test dataset one
/// per holdout point.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use deepar_core::{Frequency, Usage};
/// use deepar_data::{Series, WindowConfig, WindowDataset, WindowedSeriesDataset, YearMonth};
///
/// let values: Vec<f32> = (0..144).map(|i| 100.0 + i as f32).collect();
/// let series = Arc::new(Series::new(YearMonth::new(1949, 1).unwrap(), values).unwrap());
/// let config = WindowConfig::new(Frequency::Monthly, 12, 12);
///
/// let train = WindowedSeriesDataset::build(series.clone(), Usage::Train, config.clone()).unwrap();
/// let test = WindowedSeriesDataset::build(series, Usage::Test, config).unwrap();
/// assert_eq!(train.size(), 112);
/// assert_eq!(test.size(), 32);
/// ```
#[derive(Debug, Clone)]
pub struct WindowedSeriesDataset {
    series: Arc<Series>,
    usage: Usage,
    config: WindowConfig,
    pipeline: FeatureTransformPipeline,
    segment: Range<usize>,
}

impl WindowedSeriesDataset {
    /// Build the dataset for one segment of `series`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not fit the series.
    pub fn build(series: Arc<Series>, usage: Usage, config: WindowConfig) -> Result<Self> {
        config.validate(series.len())?;
        let pipeline = FeatureTransformPipeline::new(config.frequency, series.start());
        let segment = usage.segment(series.len(), config.holdout_length);
        tracing::debug!(
            "Built {} dataset over positions {}..{} (history {}, horizon {})",
            usage,
            segment.start,
            segment.end,
            config.history_length(),
            config.prediction_length
        );
        Ok(Self {
            series,
            usage,
            config,
            pipeline,
            segment,
        })
    }

    /// The underlying series.
    #[must_use]
    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Which segment this dataset covers.
    #[must_use]
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// The window geometry.
    #[must_use]
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// The feature pipeline anchored at the series start.
    #[must_use]
    pub fn pipeline(&self) -> &FeatureTransformPipeline {
        &self.pipeline
    }

    /// Index range of the segment within the series.
    #[must_use]
    pub fn segment(&self) -> Range<usize> {
        self.segment.clone()
    }

    /// Input shapes of a batch of `batch` windows.
    #[must_use]
    pub fn input_shapes(&self, batch: usize) -> InputShapes {
        self.config.input_shapes(batch)
    }
}

impl WindowDataset for WindowedSeriesDataset {
    fn size(&self) -> usize {
        self.segment.len()
    }

    fn get_window(&self, index: usize) -> Result<Window> {
        if index >= self.size() {
            return Err(DataError::IndexOutOfBounds {
                index,
                length: self.size(),
            });
        }
        let origin = self.segment.start + index;
        Ok(slice_window(
            self.series.values(),
            self.segment.clone(),
            origin,
            &self.config,
            &self.pipeline,
        ))
    }
}

/// Window forecasting `prediction_length` steps past the end of `series`.
///
/// The history is the tail of the full series; the horizon is unobserved.
///
/// # Errors
///
/// Returns a configuration error if `config` does not fit the series.
pub fn forecast_window(series: &Series, config: &WindowConfig) -> Result<Window> {
    config.validate(series.len())?;
    let pipeline = FeatureTransformPipeline::new(config.frequency, series.start());
    Ok(slice_window(
        series.values(),
        0..series.len(),
        series.len(),
        config,
        &pipeline,
    ))
}

fn slice_window(
    values: &[f32],
    segment: Range<usize>,
    origin: usize,
    config: &WindowConfig,
    pipeline: &FeatureTransformPipeline,
) -> Window {
    let history_length = config.history_length();
    let prediction_length = config.prediction_length;
    let first = origin as i64 - history_length as i64;

    let read = |position: i64| -> (f32, f32) {
        match usize::try_from(position) {
            Ok(p) if segment.contains(&p) => (values[p], 1.0),
            _ => (0.0, 0.0),
        }
    };

    let (context, context_observed): (Vec<f32>, Vec<f32>) =
        (0..history_length as i64).map(|i| read(first + i)).unzip();
    let (target, target_observed): (Vec<f32>, Vec<f32>) = (0..prediction_length as i64)
        .map(|j| read(origin as i64 + j))
        .unzip();

    Window {
        forecast_start: origin,
        context,
        context_observed,
        target,
        target_observed,
        calendar_features: pipeline
            .transform_positions(first, history_length + prediction_length),
        static_category: config.static_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::YearMonth;
    use std::collections::HashSet;

    fn series(len: usize) -> Arc<Series> {
        let values = (0..len).map(|i| 1.0 + i as f32).collect();
        Arc::new(Series::new(YearMonth::new(1949, 1).unwrap(), values).unwrap())
    }

    fn config() -> WindowConfig {
        WindowConfig::new(Frequency::Monthly, 12, 12)
    }

    #[test]
    fn test_sizes_follow_split() {
        for len in [40, 77, 144] {
            let s = series(len);
            let train = WindowedSeriesDataset::build(s.clone(), Usage::Train, config()).unwrap();
            let test = WindowedSeriesDataset::build(s, Usage::Test, config()).unwrap();
            assert_eq!(train.size(), len - 32);
            assert_eq!(test.size(), 32);
        }
    }

    #[test]
    fn test_train_and_test_disjoint_in_time() {
        for len in [33, 60, 144] {
            let s = series(len);
            let train = WindowedSeriesDataset::build(s.clone(), Usage::Train, config()).unwrap();
            let test = WindowedSeriesDataset::build(s, Usage::Test, config()).unwrap();

            let mut train_positions = HashSet::new();
            for i in 0..train.size() {
                train_positions.extend(train.get_window(i).unwrap().observed_positions());
            }
            for i in 0..test.size() {
                for p in test.get_window(i).unwrap().observed_positions() {
                    assert!(!train_positions.contains(&p), "position {p} in both segments");
                }
            }
            assert!(train_positions.iter().all(|&p| p < len - 32));
        }
    }

    #[test]
    fn test_train_targets_cover_pre_holdout_points() {
        let s = series(144);
        let train = WindowedSeriesDataset::build(s, Usage::Train, config()).unwrap();
        let covered: HashSet<usize> = (0..train.size())
            .map(|i| train.get_window(i).unwrap().forecast_start)
            .collect();
        assert_eq!(covered, (0..112).collect());
    }

    #[test]
    fn test_window_values_and_masks() {
        let s = series(144);
        let test = WindowedSeriesDataset::build(s, Usage::Test, config()).unwrap();
        let w = test.get_window(5).unwrap();

        assert_eq!(w.forecast_start, 117);
        assert_eq!(w.history_length(), 49);
        assert_eq!(w.prediction_length(), 12);
        // Only positions 112..117 of the history are inside the test segment.
        assert_eq!(w.context_observed.iter().sum::<f32>(), 5.0);
        assert_eq!(&w.context[44..], &[113.0, 114.0, 115.0, 116.0, 117.0]);
        assert_eq!(w.target[0], 118.0);
        assert_eq!(w.calendar_features.dim(), (61, 2));

        // The last window only observes its first target step.
        let last = test.get_window(31).unwrap();
        assert_eq!(last.target_observed.iter().sum::<f32>(), 1.0);
        assert_eq!(last.target[1], 0.0);
    }

    #[test]
    fn test_get_window_is_stable() {
        let s = series(144);
        let train = WindowedSeriesDataset::build(s, Usage::Train, config()).unwrap();
        assert_eq!(train.get_window(60).unwrap(), train.get_window(60).unwrap());
    }

    #[test]
    fn test_out_of_range_index() {
        let s = series(144);
        let test = WindowedSeriesDataset::build(s, Usage::Test, config()).unwrap();
        assert!(matches!(
            test.get_window(32),
            Err(DataError::IndexOutOfBounds { index: 32, length: 32 })
        ));
    }

    #[test]
    fn test_holdout_longer_than_series_rejected() {
        let s = series(30);
        let err = WindowedSeriesDataset::build(s, Usage::Train, config()).unwrap_err();
        assert!(err.is_configuration());

        let s = series(144);
        let err = WindowedSeriesDataset::build(s, Usage::Test, config().with_holdout_length(0))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_forecast_window_uses_series_tail() {
        let s = series(144);
        let w = forecast_window(&s, &config()).unwrap();
        assert_eq!(w.forecast_start, 144);
        assert_eq!(w.context.last(), Some(&144.0));
        assert_eq!(w.context_observed.iter().sum::<f32>(), 49.0);
        assert_eq!(w.target_observed.iter().sum::<f32>(), 0.0);
    }

    #[test]
    fn test_static_category_propagates() {
        let s = series(144);
        let cfg = config().with_static_category(3);
        let train = WindowedSeriesDataset::build(s, Usage::Train, cfg).unwrap();
        assert_eq!(train.get_window(0).unwrap().static_category, Some(3));
    }
}
