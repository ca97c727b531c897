//! Where a series is read from: an HTTP endpoint or a local JSON file.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use crate::error::{DataError, Result};
use crate::series::Series;

/// The monthly air passengers counts, 1949-01 to 1960-12.
pub const AIR_PASSENGERS_URL: &str =
    "https://resources.djl.ai/test-models/mxnet/timeseries/air_passengers.json";

/// A location holding a `{start, target}` JSON document.
///
/// Fetching is a single blocking call with no retry; any failure is returned
/// as a fetch or parse error and is meant to halt the run.
///
/// # Example
///
/// ```rust
/// use deepar_data::SeriesSource;
///
/// let remote: SeriesSource = "https://example.com/series.json".parse().unwrap();
/// assert!(matches!(remote, SeriesSource::Url(_)));
///
/// let local: SeriesSource = "data/series.json".parse().unwrap();
/// assert!(matches!(local, SeriesSource::File(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesSource {
    /// Fetched with an HTTP GET.
    Url(String),
    /// Read from disk.
    File(PathBuf),
}

impl Default for SeriesSource {
    fn default() -> Self {
        Self::Url(AIR_PASSENGERS_URL.to_string())
    }
}

impl SeriesSource {
    /// Fetch and parse the series.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Fetch`] when the request or read fails and
    /// [`DataError::Parse`] when the payload has the wrong schema.
    pub fn fetch(&self) -> Result<Series> {
        let body = match self {
            Self::Url(url) => fetch_url(url)?,
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                DataError::Fetch(format!("failed to read {}: {}", path.display(), e))
            })?,
        };
        let series = Series::from_json(&body)?;
        tracing::info!(
            "Loaded {} observations starting {} from {}",
            series.len(),
            series.start(),
            self
        );
        Ok(series)
    }
}

fn fetch_url(url: &str) -> Result<String> {
    tracing::debug!("GET {}", url);
    let response = ureq::get(url)
        .call()
        .map_err(|e| DataError::Fetch(format!("failed to download {}: {}", url, e)))?;

    if response.status() != 200 {
        return Err(DataError::Fetch(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|e| DataError::Fetch(format!("failed to read body of {}: {}", url, e)))?;
    Ok(body)
}

impl std::str::FromStr for SeriesSource {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DataError::Fetch("empty series source".into()));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(Self::Url(s.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for SeriesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}
