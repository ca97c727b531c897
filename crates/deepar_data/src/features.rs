//! Calendar and age features attached to every time step of a window.

use ndarray::Array2;

use deepar_core::{Frequency, TimeFeature};

use crate::series::YearMonth;

/// Derives per-step covariates from timestamps alone.
///
/// Each row holds the calendar encodings of the frequency followed by the
/// age feature. Positions are counted in periods from the series start and
/// may be negative for history slots that precede it. The pipeline is pure:
/// the same request always produces the same matrix.
///
/// # Example
///
/// ```rust
/// use deepar_core::Frequency;
/// use deepar_data::{FeatureTransformPipeline, YearMonth};
///
/// let start = YearMonth::new(1949, 1).unwrap();
/// let pipeline = FeatureTransformPipeline::new(Frequency::Monthly, start);
///
/// assert_eq!(pipeline.history_length(12), 49);
/// let feats = pipeline.transform(start, 24);
/// assert_eq!(feats.dim(), (24, 2));
/// assert_eq!(feats[[0, 1]], 0.0); // age is zero at the series start
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTransformPipeline {
    frequency: Frequency,
    series_start: YearMonth,
}

impl FeatureTransformPipeline {
    /// Create a pipeline anchored at the first timestamp of a series.
    #[must_use]
    pub fn new(frequency: Frequency, series_start: YearMonth) -> Self {
        Self {
            frequency,
            series_start,
        }
    }

    /// The sampling frequency.
    #[must_use]
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Calendar features produced, in column order.
    #[must_use]
    pub fn time_features(&self) -> &'static [TimeFeature] {
        self.frequency.time_features()
    }

    /// Columns per row: calendar features plus age.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.frequency.num_time_features()
    }

    /// Lag indices the network reads from the history.
    #[must_use]
    pub fn lags(&self) -> &'static [usize] {
        self.frequency.lags_seq()
    }

    /// `context_length + max_lag`.
    #[must_use]
    pub fn history_length(&self, context_length: usize) -> usize {
        self.frequency.history_length(context_length)
    }

    /// Features for `length` steps starting at timestamp `window_start`.
    #[must_use]
    pub fn transform(&self, window_start: YearMonth, length: usize) -> Array2<f32> {
        let months = self.series_start.months_until(&window_start);
        let position = months.div_euclid(i64::from(self.frequency.months_per_period()));
        self.transform_positions(position, length)
    }

    /// Features for `length` steps starting `first_position` periods after
    /// the series start.
    #[must_use]
    pub fn transform_positions(&self, first_position: i64, length: usize) -> Array2<f32> {
        let features = self.time_features();
        let n_cols = features.len() + 1;
        let step = i64::from(self.frequency.months_per_period());
        let base = self.series_start.month_index();

        Array2::from_shape_fn((length, n_cols), |(row, col)| {
            let position = first_position + row as i64;
            if col == features.len() {
                return age(position);
            }
            let month = (base + position * step).rem_euclid(12) as u32 + 1;
            features[col].encode(month)
        })
    }
}

/// Age feature: `sign(p) * log10(1 + |p|)` for position `p`.
///
/// Strictly increasing in `p` and zero exactly at the series start.
#[must_use]
pub fn age(position: i64) -> f32 {
    let magnitude = (1.0 + position.unsigned_abs() as f64).log10();
    (position.signum() as f64 * magnitude) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> FeatureTransformPipeline {
        FeatureTransformPipeline::new(Frequency::Monthly, YearMonth::new(1949, 1).unwrap())
    }

    #[test]
    fn test_transform_is_idempotent() {
        let p = pipeline();
        let start = YearMonth::new(1952, 7).unwrap();
        assert_eq!(p.transform(start, 61), p.transform(start, 61));
    }

    #[test]
    fn test_age_strictly_increasing_within_window() {
        let p = pipeline();
        let feats = p.transform_positions(-40, 100);
        let age_col = feats.column(1);
        for i in 1..age_col.len() {
            assert!(age_col[i] > age_col[i - 1], "age not increasing at row {i}");
        }
        // Zero exactly at the series start (row 40).
        assert_eq!(age_col[40], 0.0);
        assert!(age_col[39] < 0.0);
    }

    #[test]
    fn test_month_of_year_follows_calendar() {
        let p = pipeline();
        let feats = p.transform(YearMonth::new(1950, 11).unwrap(), 3);
        // November, December, January.
        assert!((feats[[0, 0]] - (10.0 / 11.0 - 0.5)).abs() < 1e-6);
        assert!((feats[[1, 0]] - 0.5).abs() < 1e-6);
        assert!((feats[[2, 0]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_positions_wrap_months() {
        let p = pipeline();
        // One period before 1949-01 is December 1948.
        let feats = p.transform_positions(-1, 1);
        assert!((feats[[0, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_transform_matches_positions() {
        let p = pipeline();
        let start = YearMonth::new(1949, 1).unwrap().add_months(30).unwrap();
        assert_eq!(p.transform(start, 12), p.transform_positions(30, 12));
    }

    #[test]
    fn test_yearly_has_only_age() {
        let p = FeatureTransformPipeline::new(Frequency::Yearly, YearMonth::new(1900, 1).unwrap());
        let feats = p.transform_positions(0, 5);
        assert_eq!(feats.dim(), (5, 1));
        assert!((feats[[4, 0]] - 5f32.log10()).abs() < 1e-6);
    }
}
