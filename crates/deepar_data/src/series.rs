//! The raw univariate series and its calendar-month timestamps.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use deepar_core::{CoreError, Frequency};

use crate::error::{DataError, Result};

/// A calendar month, the timestamp unit of every supported series.
///
/// Parsed from `YYYY-MM`; a trailing day or time (`YYYY-MM-DD`,
/// `YYYY-MM-DD HH:MM:SS`) is accepted and ignored.
///
/// # Example
///
/// ```rust
/// use deepar_data::YearMonth;
///
/// let start: YearMonth = "1949-01".parse().unwrap();
/// let later = start.add_months(143).unwrap();
/// assert_eq!(later.to_string(), "1960-12");
/// assert_eq!(start.months_until(&later), 143);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    /// Create from a year and a month (1..=12).
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| DataError::Parse(format!("invalid calendar month {year}-{month}")))
    }

    /// Calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Calendar month (1..=12).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Months elapsed since year 0, used for calendar arithmetic.
    #[must_use]
    pub fn month_index(&self) -> i64 {
        i64::from(self.year()) * 12 + i64::from(self.month()) - 1
    }

    /// Signed number of months from `self` to `other`.
    #[must_use]
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        other.month_index() - self.month_index()
    }

    /// Shift by a signed number of months.
    pub fn add_months(&self, months: i64) -> Result<Self> {
        let magnitude = u32::try_from(months.unsigned_abs())
            .map_err(|_| DataError::Parse(format!("month offset {months} out of range")))?;
        let shifted = if months >= 0 {
            self.0.checked_add_months(Months::new(magnitude))
        } else {
            self.0.checked_sub_months(Months::new(magnitude))
        };
        shifted
            .map(Self)
            .ok_or_else(|| DataError::Parse(format!("{self} shifted by {months} months overflows")))
    }

    /// Shift by a signed number of periods of `frequency`.
    pub fn add_periods(&self, periods: i64, frequency: Frequency) -> Result<Self> {
        self.add_months(periods * i64::from(frequency.months_per_period()))
    }
}

impl std::str::FromStr for YearMonth {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || DataError::Parse(format!("expected a YYYY-MM timestamp, got `{s}`"));
        let mut parts = s.splitn(3, '-');
        let year: i32 = parts
            .next()
            .and_then(|y| y.parse().ok())
            .ok_or_else(invalid)?;
        let month: u32 = parts
            .next()
            .and_then(|m| m.parse().ok())
            .ok_or_else(invalid)?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for YearMonth {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// A univariate series of non-negative counts starting at a calendar month.
///
/// The JSON form is `{"start": "YYYY-MM", "target": [numbers]}`. Values must
/// be finite and non-negative; the series is immutable once loaded and is
/// shared between datasets behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    start: YearMonth,
    #[serde(rename = "target")]
    values: Vec<f32>,
}

impl Series {
    /// Create a series, validating its values.
    pub fn new(start: YearMonth, values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(DataError::InvalidSeries("series has no values".into()));
        }
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(DataError::InvalidSeries(format!(
                "value {v} at index {i} is not a finite non-negative count"
            )));
        }
        Ok(Self { start, values })
    }

    /// Parse the `{start, target}` JSON schema.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Series =
            serde_json::from_str(json).map_err(|e| DataError::Parse(e.to_string()))?;
        Self::new(raw.start, raw.values)
    }

    /// Timestamp of the first value.
    #[must_use]
    pub fn start(&self) -> YearMonth {
        self.start
    }

    /// Observed values in time order.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the series has no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp of the observation at `position` (may lie past the end).
    pub fn timestamp(&self, position: usize, frequency: Frequency) -> Result<YearMonth> {
        let periods = i64::try_from(position)
            .map_err(|_| DataError::IndexOutOfBounds { index: position, length: self.len() })?;
        self.start.add_periods(periods, frequency)
    }

    /// Require `len > context_length + prediction_length`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the series is too short.
    pub fn ensure_forecastable(&self, context_length: usize, prediction_length: usize) -> Result<()> {
        if self.len() <= context_length + prediction_length {
            return Err(CoreError::Configuration(format!(
                "series of length {} is too short for context_length {} + prediction_length {}",
                self.len(),
                context_length,
                prediction_length
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_month_variants() {
        let a: YearMonth = "1949-01".parse().unwrap();
        let b: YearMonth = "1949-01-15".parse().unwrap();
        let c: YearMonth = "1949-01-01 00:00:00".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.year(), 1949);
        assert_eq!(a.month(), 1);
    }

    #[test]
    fn test_parse_year_month_rejects_garbage() {
        assert!("1949".parse::<YearMonth>().is_err());
        assert!("1949-13".parse::<YearMonth>().is_err());
        assert!("Jan 1949".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_month_arithmetic() {
        let start = YearMonth::new(1949, 11).unwrap();
        assert_eq!(start.add_months(3).unwrap().to_string(), "1950-02");
        assert_eq!(start.add_months(-11).unwrap().to_string(), "1948-12");
        assert_eq!(start.months_until(&start.add_months(-40).unwrap()), -40);
        assert_eq!(
            start.add_periods(2, Frequency::Quarterly).unwrap().to_string(),
            "1950-05"
        );
    }

    #[test]
    fn test_series_from_json() {
        let series = Series::from_json(r#"{"start": "1949-01", "target": [112, 118.0, 132]}"#).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.values(), &[112.0, 118.0, 132.0]);
        assert_eq!(
            series.timestamp(2, Frequency::Monthly).unwrap().to_string(),
            "1949-03"
        );
    }

    #[test]
    fn test_series_rejects_other_schemas() {
        let err = Series::from_json(r#"{"begin": "1949-01", "values": [1, 2]}"#).unwrap_err();
        assert!(err.is_fetch());
        assert!(Series::from_json(r#"{"start": "1949-01", "target": ["a"]}"#).is_err());
    }

    #[test]
    fn test_series_rejects_negative_values() {
        let start = YearMonth::new(2000, 1).unwrap();
        assert!(matches!(
            Series::new(start, vec![1.0, -2.0]),
            Err(DataError::InvalidSeries(_))
        ));
        assert!(Series::new(start, vec![]).is_err());
        assert!(Series::new(start, vec![f32::NAN]).is_err());
    }

    #[test]
    fn test_ensure_forecastable() {
        let start = YearMonth::new(2000, 1).unwrap();
        let series = Series::new(start, vec![1.0; 25]).unwrap();
        assert!(series.ensure_forecastable(12, 12).is_ok());
        let err = series.ensure_forecastable(12, 13).unwrap_err();
        assert!(err.is_configuration());
    }
}
