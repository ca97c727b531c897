//! Forecast accuracy metrics.

use deepar_core::Frequency;
use deepar_data::Window;

/// Root mean squared scaled error.
///
/// The squared forecast error over the observed horizon is scaled by the
/// in-sample squared error of the seasonal naive forecast on the observed
/// history. When the history holds no more than one season of observations
/// the lag-1 naive forecast is used instead. A perfect forecast scores 0 and
/// a forecast as good as the naive baseline scores 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rmsse {
    seasonality: usize,
}

impl Rmsse {
    /// Create the metric for a given season length.
    pub fn new(seasonality: usize) -> Self {
        Self {
            seasonality: seasonality.max(1),
        }
    }

    /// Create the metric for a sampling frequency.
    pub fn for_frequency(frequency: Frequency) -> Self {
        Self::new(frequency.season_length())
    }

    /// Season length used for the naive baseline.
    pub fn seasonality(&self) -> usize {
        self.seasonality
    }

    /// Score a forecast of one window.
    ///
    /// Returns `None` when the window has no observed horizon value, fewer
    /// than two observed history values, or a constant history.
    pub fn score(&self, window: &Window, forecast: &[f32]) -> Option<f32> {
        let history: Vec<f64> = window
            .context
            .iter()
            .zip(&window.context_observed)
            .filter(|(_, o)| **o > 0.0)
            .map(|(v, _)| f64::from(*v))
            .collect();

        let lag = if history.len() > self.seasonality {
            self.seasonality
        } else {
            1
        };
        if history.len() <= lag {
            return None;
        }
        let naive = history
            .iter()
            .skip(lag)
            .zip(&history)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            / (history.len() - lag) as f64;
        if naive <= 0.0 {
            return None;
        }

        let errors: Vec<f64> = window
            .target
            .iter()
            .zip(&window.target_observed)
            .zip(forecast)
            .filter(|((_, o), _)| **o > 0.0)
            .map(|((a, _), f)| (f64::from(*a) - f64::from(*f)).powi(2))
            .collect();
        if errors.is_empty() {
            return None;
        }
        let mse = errors.iter().sum::<f64>() / errors.len() as f64;

        Some((mse / naive).sqrt() as f32)
    }
}

/// Running mean of per-window RMSSE scores.
#[derive(Debug, Clone)]
pub struct RmsseAccumulator {
    metric: Rmsse,
    total: f64,
    count: usize,
}

impl RmsseAccumulator {
    /// Create an empty accumulator.
    pub fn new(metric: Rmsse) -> Self {
        Self {
            metric,
            total: 0.0,
            count: 0,
        }
    }

    /// Score one window and add it to the mean if it is scorable.
    pub fn update(&mut self, window: &Window, forecast: &[f32]) {
        if let Some(score) = self.metric.score(window, forecast) {
            self.total += f64::from(score);
            self.count += 1;
        }
    }

    /// Number of scored windows.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean score, `None` if no window was scorable.
    pub fn value(&self) -> Option<f32> {
        (self.count > 0).then(|| (self.total / self.count as f64) as f32)
    }
}
