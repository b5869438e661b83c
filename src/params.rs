//! Request parameters and the typed values parsed out of them
//!
//! Requests arrive as JSON documents. Free-form strings such as `"1991-2020"`
//! or `"MS"` are converted into [`Period`] and [`ResampleFrequency`] while
//! deserializing, so an invalid request is rejected before any engine runs.

use crate::errors::{ClimateStatsError, Result};
use crate::season::SeasonFilter;
pub use crate::statistics::operations::AggregationFunction;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Inclusive year range of interest, or the full span of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Period {
    All,
    Years { start: i32, end: i32 },
}

impl Period {
    /// Build an explicit year range.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::InvalidPeriodFormat`] if `start > end`.
    pub fn years(start: i32, end: i32) -> Result<Self> {
        if start > end {
            return Err(ClimateStatsError::InvalidPeriodFormat {
                value: format!("{start}-{end}"),
            });
        }
        Ok(Self::Years { start, end })
    }

    /// Resolve to concrete year bounds given the dates actually present.
    ///
    /// `All` becomes (year of first date, year of last date); `None` when
    /// `dates` is empty and the period is `All`.
    #[must_use]
    pub fn resolve(self, dates: &[NaiveDate]) -> Option<(i32, i32)> {
        match self {
            Self::Years { start, end } => Some((start, end)),
            Self::All => match (dates.first(), dates.last()) {
                (Some(first), Some(last)) => Some((first.year(), last.year())),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Years { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

impl FromStr for Period {
    type Err = ClimateStatsError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed == "all" {
            return Ok(Self::All);
        }
        let invalid = || ClimateStatsError::InvalidPeriodFormat {
            value: s.to_string(),
        };
        let (start, end) = trimmed.split_once('-').ok_or_else(invalid)?;
        let start = start.trim().parse::<i32>().map_err(|_| invalid())?;
        let end = end.trim().parse::<i32>().map_err(|_| invalid())?;
        Self::years(start, end).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = ClimateStatsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Calendar frequency for pre-resampling raw series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ResampleFrequency {
    /// `D`
    Daily,
    /// `MS`
    MonthStart,
    /// `QS`
    QuarterStart,
    /// `YS`
    YearStart,
}

impl ResampleFrequency {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::MonthStart => "MS",
            Self::QuarterStart => "QS",
            Self::YearStart => "YS",
        }
    }
}

impl FromStr for ResampleFrequency {
    type Err = ClimateStatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "D" => Ok(Self::Daily),
            "MS" => Ok(Self::MonthStart),
            "QS" => Ok(Self::QuarterStart),
            "YS" => Ok(Self::YearStart),
            other => Err(ClimateStatsError::UnknownResampleFrequency {
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ResampleFrequency {
    type Error = ClimateStatsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

fn default_all() -> Period {
    Period::All
}

fn default_year_2024() -> Period {
    Period::Years {
        start: 2024,
        end: 2024,
    }
}

fn default_annual_cycle_reference() -> Period {
    Period::Years {
        start: 1940,
        end: 2023,
    }
}

fn default_histogram_reference() -> Period {
    Period::Years {
        start: 1950,
        end: 1990,
    }
}

fn default_month_start() -> Option<ResampleFrequency> {
    Some(ResampleFrequency::MonthStart)
}

fn default_dataset() -> String {
    "ERA5".to_string()
}

fn default_region_set() -> String {
    "NUTS-0".to_string()
}

/// Split a `;`-separated request field into trimmed, non-empty parts.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parameters for a (possibly multi-variable) yearly time series.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeSeriesParams {
    pub dataset: String,
    pub region_set: String,
    pub region_name: String,
    /// One variable or several separated by `;`, e.g. `"tas;pr"`.
    pub variable: String,
    #[serde(default = "default_month_start")]
    pub resample_freq: Option<ResampleFrequency>,
    #[serde(default)]
    pub resample_func: AggregationFunction,
    #[serde(default = "default_all")]
    pub period: Period,
    #[serde(default)]
    pub season_filter: SeasonFilter,
    #[serde(default)]
    pub season_filter_func: AggregationFunction,
    #[serde(default)]
    pub anomaly: bool,
    #[serde(default)]
    pub reference_period: Option<Period>,
}

impl TimeSeriesParams {
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        split_list(&self.variable)
    }
}

/// Parameters for a multi-region climatological average.
#[derive(Debug, Clone, Deserialize)]
pub struct ClimatologyMapParams {
    pub dataset: String,
    pub region_set: String,
    /// One region or several separated by `;`.
    pub region_name: String,
    pub variable: String,
    #[serde(default)]
    pub resample_freq: Option<ResampleFrequency>,
    #[serde(default)]
    pub resample_func: AggregationFunction,
    #[serde(default = "default_all")]
    pub period: Period,
    #[serde(default)]
    pub season_filter: SeasonFilter,
    #[serde(default)]
    pub season_filter_func: AggregationFunction,
    #[serde(default)]
    pub anomaly: bool,
    #[serde(default)]
    pub reference_period: Option<Period>,
}

impl ClimatologyMapParams {
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        split_list(&self.region_name)
    }
}

/// Parameters for the day-of-year annual cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnualCycleParams {
    pub dataset: String,
    pub region_set: String,
    pub region_name: String,
    pub variable: String,
    #[serde(default = "default_year_2024")]
    pub period: Period,
    #[serde(default = "default_annual_cycle_reference")]
    pub reference_period: Period,
}

/// Parameters for top-5 extreme values.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtremeValuesParams {
    pub dataset: String,
    pub region_set: String,
    pub region_name: String,
    pub variable: String,
    #[serde(default = "default_year_2024")]
    pub period: Period,
    #[serde(default)]
    pub season_filter: SeasonFilter,
}

/// Parameters for the two-period histogram comparison.
#[derive(Debug, Clone, Deserialize)]
pub struct HistogramsParams {
    pub dataset: String,
    pub region_set: String,
    pub region_name: String,
    pub variable: String,
    #[serde(default = "default_all")]
    pub period: Period,
    #[serde(default = "default_histogram_reference")]
    pub reference_period: Period,
    #[serde(default)]
    pub season_filter: SeasonFilter,
}

/// Parameters for the multi-variable summary.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryStatsParams {
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_region_set")]
    pub region_set: String,
    pub region_name: String,
    #[serde(default = "default_year_2024")]
    pub period: Period,
    #[serde(default)]
    pub season_filter: SeasonFilter,
}
