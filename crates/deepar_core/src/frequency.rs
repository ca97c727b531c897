//! Sampling frequencies supported for calendar-month series.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Sampling frequency of a series whose timestamps are calendar months.
///
/// The frequency decides three things that both the dataset and the network
/// must agree on: the lag indices fed to the network, the calendar features
/// attached to every time step, and the season length used by RMSSE.
///
/// # Example
///
/// ```rust
/// use deepar_core::Frequency;
///
/// let freq: Frequency = "M".parse().unwrap();
/// assert_eq!(freq, Frequency::Monthly);
/// assert_eq!(freq.max_lag(), 37);
/// assert_eq!(freq.season_length(), 12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Frequency {
    /// Monthly (M)
    #[default]
    #[serde(rename = "M")]
    Monthly,
    /// Quarterly (Q)
    #[serde(rename = "Q")]
    Quarterly,
    /// Yearly (Y)
    #[serde(rename = "Y")]
    Yearly,
}

const MONTHLY_LAGS: &[usize] = &[1, 2, 3, 4, 5, 6, 7, 11, 12, 13, 23, 24, 25, 35, 36, 37];
const QUARTERLY_LAGS: &[usize] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 12, 13];
const YEARLY_LAGS: &[usize] = &[1, 2, 3, 4, 5, 6, 7];

impl Frequency {
    /// Number of calendar months between consecutive observations.
    #[must_use]
    pub const fn months_per_period(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
        }
    }

    /// Number of periods in one seasonal cycle.
    #[must_use]
    pub const fn season_length(&self) -> usize {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Yearly => 1,
        }
    }

    /// Lag indices (1-based, ascending) used as autoregressive inputs.
    #[must_use]
    pub const fn lags_seq(&self) -> &'static [usize] {
        match self {
            Self::Monthly => MONTHLY_LAGS,
            Self::Quarterly => QUARTERLY_LAGS,
            Self::Yearly => YEARLY_LAGS,
        }
    }

    /// Largest lag index.
    #[must_use]
    pub fn max_lag(&self) -> usize {
        self.lags_seq().iter().copied().max().unwrap_or(0)
    }

    /// Past steps a window must carry: `context_length + max_lag`.
    #[must_use]
    pub fn history_length(&self, context_length: usize) -> usize {
        context_length + self.max_lag()
    }

    /// Calendar features derived for each time step.
    #[must_use]
    pub const fn time_features(&self) -> &'static [TimeFeature] {
        match self {
            Self::Monthly => &[TimeFeature::MonthOfYear],
            Self::Quarterly => &[TimeFeature::QuarterOfYear],
            Self::Yearly => &[],
        }
    }

    /// Number of per-step features: calendar features plus the age feature.
    #[must_use]
    pub fn num_time_features(&self) -> usize {
        self.time_features().len() + 1
    }

    /// Short frequency code (`M`, `Q` or `Y`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Monthly => "M",
            Self::Quarterly => "Q",
            Self::Yearly => "Y",
        }
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "M" | "MS" | "MONTHLY" => Ok(Self::Monthly),
            "Q" | "QS" | "QUARTERLY" => Ok(Self::Quarterly),
            "Y" | "A" | "YEARLY" | "ANNUAL" => Ok(Self::Yearly),
            other => Err(CoreError::Configuration(format!(
                "unsupported frequency `{other}`; expected M, Q or Y"
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A calendar feature encoded into `[-0.5, 0.5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFeature {
    /// Month of the year, January = -0.5, December = 0.5.
    MonthOfYear,
    /// Quarter of the year, Q1 = -0.5, Q4 = 0.5.
    QuarterOfYear,
}

impl TimeFeature {
    /// Encode the feature for a calendar month (1..=12).
    #[must_use]
    pub fn encode(&self, month: u32) -> f32 {
        match self {
            Self::MonthOfYear => (month as f32 - 1.0) / 11.0 - 0.5,
            Self::QuarterOfYear => ((month - 1) / 3) as f32 / 3.0 - 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_history_length() {
        let freq = Frequency::Monthly;
        assert_eq!(freq.max_lag(), 37);
        assert_eq!(freq.history_length(12), 49);
        assert_eq!(freq.num_time_features(), 2);
    }

    #[test]
    fn test_lags_sorted_and_positive() {
        for freq in [Frequency::Monthly, Frequency::Quarterly, Frequency::Yearly] {
            let lags = freq.lags_seq();
            assert!(lags.windows(2).all(|w| w[0] < w[1]));
            assert!(lags.iter().all(|&l| l >= 1));
        }
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!("m".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("Q".parse::<Frequency>().unwrap(), Frequency::Quarterly);
        assert_eq!("annual".parse::<Frequency>().unwrap(), Frequency::Yearly);

        let err = "H".parse::<Frequency>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_month_of_year_range() {
        let f = TimeFeature::MonthOfYear;
        assert!((f.encode(1) + 0.5).abs() < 1e-6);
        assert!((f.encode(12) - 0.5).abs() < 1e-6);
        assert!(f.encode(6) < f.encode(7));
    }

    #[test]
    fn test_quarter_of_year() {
        let f = TimeFeature::QuarterOfYear;
        assert_eq!(f.encode(1), f.encode(3));
        assert!((f.encode(10) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_frequency_serde_code() {
        let json = serde_json::to_string(&Frequency::Monthly).unwrap();
        assert_eq!(json, "\"M\"");
        let back: Frequency = serde_json::from_str("\"Q\"").unwrap();
        assert_eq!(back, Frequency::Quarterly);
    }
}
