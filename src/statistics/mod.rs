//! Statistic engines built on top of the temporal filter
//!
//! Every engine takes already-loaded arrays plus a validated request and
//! returns a flat, serializable result.
//!
//! # Organization
//!
//! - [`operations`]: reducers, quantiles, trend slope, axis reductions
//! - [`time_series`]: yearly (optionally anomaly) series for one region
//! - [`climatology`]: one climatological value per region
//! - [`annual_cycle`]: day-of-year profile against a reference period
//! - [`extremes`]: top and bottom five values
//! - [`histogram`]: two-period density comparison
//! - [`summary`]: multi-variable summary with trend and reference baseline

pub mod annual_cycle;
pub mod climatology;
pub mod extremes;
pub mod histogram;
pub mod operations;
pub mod summary;
pub mod time_series;

pub use annual_cycle::{get_annual_cycle, AnnualCycle};
pub use climatology::{get_climatology_map, ClimatologyMap};
pub use extremes::{get_extreme_values, ExtremeValues};
pub use histogram::{get_histograms, Histograms};
pub use operations::{AggregationFunction, NanPolicy, StatisticalReduction};
pub use summary::{get_summary_stats, SummaryStat, SummaryStats};
pub use time_series::{get_time_series, TimeSeries};

use crate::array::{LabeledArray, LabeledSeries};
use crate::errors::{ClimateStatsError, Result};
use crate::params::{Period, ResampleFrequency};
use crate::season::SeasonFilter;
use crate::temporal::{
    filter_by_period, resample_frequency, select_season_label, LabelFallback, TemporalFilter,
};
use operations::finite;
use serde::{Serialize, Serializer};

/// String-keyed map that serializes its entries in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Values as they appear in results: NaN and infinities become `null`.
pub(crate) fn to_output(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(finite).collect()
}

/// The only input array of a single-dataset operation.
pub(crate) fn single_input<'a>(
    arrays: &'a [LabeledArray],
    operation: &str,
) -> Result<&'a LabeledArray> {
    match arrays {
        [array] => Ok(array),
        [] => Err(ClimateStatsError::EmptySelection {
            what: format!("input arrays for {operation}"),
        }),
        _ => Err(ClimateStatsError::MultipleInputsUnsupported {
            operation: operation.to_string(),
            count: arrays.len(),
        }),
    }
}

/// Whether `array` holds `variable`, given either as `tas` or `tas_None`.
pub(crate) fn holds_variable(array: &LabeledArray, variable: &str) -> bool {
    array.name() == variable || array.base_variable() == variable
}

/// Check that the single input array of `operation` carries `variable`.
pub(crate) fn require_variable(array: &LabeledArray, variable: &str) -> Result<()> {
    if holds_variable(array, variable) {
        Ok(())
    } else {
        Err(ClimateStatsError::VariableNotFound {
            var: variable.to_string(),
        })
    }
}

/// Days inside period and season for one region.
///
/// Derived indices use their season column (falling back to `Annual`), raw
/// data goes through [`TemporalFilter::select`].
pub(crate) fn season_days(
    array: &LabeledArray,
    region: usize,
    period: Period,
    season: SeasonFilter,
) -> Result<LabeledSeries> {
    if array.is_categorical() {
        let selection = select_season_label(array, region, season, LabelFallback::Annual)?;
        Ok(filter_by_period(&selection.series, period))
    } else {
        TemporalFilter::selection(period, season).select(&array.series(region)?)
    }
}

/// How a raw series is reduced to one value per year.
#[derive(Debug, Clone, Copy)]
pub(crate) struct YearlyRecipe {
    pub resample_freq: Option<ResampleFrequency>,
    pub resample_func: AggregationFunction,
    pub season: SeasonFilter,
    pub season_func: AggregationFunction,
}

/// The region's source series before period filtering: the season column of
/// a derived index, or the (optionally resampled) raw data.
pub(crate) enum YearlySource {
    Precomputed(LabeledSeries),
    Raw(LabeledSeries),
}

impl YearlyRecipe {
    pub fn source(&self, array: &LabeledArray, region: usize) -> Result<YearlySource> {
        if array.is_categorical() {
            let selection =
                select_season_label(array, region, self.season, LabelFallback::Annual)?;
            return Ok(YearlySource::Precomputed(selection.series));
        }
        let raw = array.series(region)?;
        Ok(YearlySource::Raw(match self.resample_freq {
            Some(freq) => resample_frequency(&raw, freq, self.resample_func),
            None => raw,
        }))
    }

    /// Yearly values of `source` inside `period`.
    pub fn yearly(&self, source: &YearlySource, period: Period) -> Result<LabeledSeries> {
        match source {
            YearlySource::Precomputed(series) => Ok(filter_by_period(series, period)),
            YearlySource::Raw(series) => {
                let filter = TemporalFilter::new(period, self.season, self.season_func);
                Ok(filter.compute(series)?.1)
            }
        }
    }

    /// Yearly values inside `period`, minus the NaN-skipping mean of the
    /// yearly values inside `reference` when one is given.
    pub fn yearly_with_anomaly(
        &self,
        source: &YearlySource,
        period: Period,
        reference: Option<Period>,
    ) -> Result<LabeledSeries> {
        let yearly = self.yearly(source, period)?;
        match reference {
            None => Ok(yearly),
            Some(reference) => {
                let baseline = operations::nan_mean(self.yearly(source, reference)?.values());
                Ok(yearly.offset(baseline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_keeps_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("tasmax_mean", 1);
        map.insert("tas", 2);
        map.insert("tasmax_mean", 3);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["tasmax_mean", "tas"]);
        assert_eq!(map.get("tasmax_mean"), Some(&3));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"tasmax_mean":3,"tas":2}"#);
    }

    #[test]
    fn nan_becomes_null() {
        assert_eq!(to_output(&[1.5, f64::NAN]), vec![Some(1.5), None]);
    }
}
