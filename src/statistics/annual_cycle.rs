//! Day-of-year annual cycle against reference percentile bands
//!
//! Reference days are grouped by month and day, ignoring the year, so a
//! multi-year daily record collapses into a 365 or 366 point cycle. The
//! percentile and median bands are smoothed with a centred 5-day window that
//! wraps around the turn of the year.

use super::operations::{nan_max, nan_min, nan_quantile, NanPolicy};
use super::{require_variable, single_input, to_output};
use crate::array::LabeledArray;
use crate::errors::{ClimateStatsError, Result};
use crate::params::AnnualCycleParams;
use crate::statistics::operations::AggregationFunction;
use crate::temporal::filter_by_period;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const SMOOTHING_WINDOW: usize = 5;

/// Nine parallel arrays, one entry per day of the target period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualCycle {
    pub date: Vec<String>,
    pub value: Vec<Option<f64>>,
    pub percentile90: Vec<Option<f64>>,
    pub median: Vec<Option<f64>>,
    pub percentile10: Vec<Option<f64>>,
    pub min: Vec<Option<f64>>,
    pub max: Vec<Option<f64>>,
    pub higher_than_max: Vec<u8>,
    pub lower_than_min: Vec<u8>,
}

/// Reference statistics of one month-day.
#[derive(Debug, Clone, Copy)]
struct DayStats {
    percentile90: f64,
    median: f64,
    percentile10: f64,
    min: f64,
    max: f64,
}

/// Centred rolling mean over a circular sequence.
///
/// The last and first `window / 2` entries are copied to the opposite ends
/// before rolling and trimmed off afterwards, so the output has the length of
/// the input. Each window needs at least one non-missing value.
#[must_use]
pub fn circular_rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let pad = half.min(values.len());
    let mut extended = Vec::with_capacity(values.len() + 2 * pad);
    extended.extend_from_slice(&values[values.len() - pad..]);
    extended.extend_from_slice(values);
    extended.extend_from_slice(&values[..pad]);

    (pad..pad + values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(extended.len());
            AggregationFunction::Mean.reduce(&extended[lo..hi], NanPolicy::Skip)
        })
        .collect()
}

/// Compare each day of the target period with the reference climatology of
/// the same month-day.
///
/// # Errors
///
/// Returns an error for more than one input array, an unknown region or
/// variable, or a derived-index array (no daily data).
#[instrument(skip_all, fields(variable = %params.variable, region = %params.region_name))]
pub fn get_annual_cycle(arrays: &[LabeledArray], params: &AnnualCycleParams) -> Result<AnnualCycle> {
    info!("Calculating annual cycle");
    let array = single_input(arrays, "annual cycle calculation")?;
    require_variable(array, &params.variable)?;
    if array.is_categorical() {
        return Err(ClimateStatsError::CategoricalUnsupported {
            operation: "Annual cycle calculation".to_string(),
        });
    }

    let array = array.clone().ensure_float();
    let region = array.region_index(&params.region_name)?;
    let series = array.series(region)?;
    let target = filter_by_period(&series, params.period);
    let reference = filter_by_period(&series, params.reference_period);

    debug!(reference = %params.reference_period, "Calculating stats for reference period");
    let mut groups: BTreeMap<(u32, u32), Vec<f64>> = BTreeMap::new();
    for (date, value) in reference.iter() {
        groups.entry((date.month(), date.day())).or_default().push(value);
    }

    let keys: Vec<(u32, u32)> = groups.keys().copied().collect();
    let mut stats: Vec<DayStats> = groups
        .values()
        .map(|values| DayStats {
            percentile90: nan_quantile(values, 0.9),
            median: nan_quantile(values, 0.5),
            percentile10: nan_quantile(values, 0.1),
            min: nan_min(values),
            max: nan_max(values),
        })
        .collect();

    debug!("Applying 5-day rolling mean smoothing");
    let smooth = |pick: fn(&DayStats) -> f64| {
        let column: Vec<f64> = stats.iter().map(pick).collect();
        circular_rolling_mean(&column, SMOOTHING_WINDOW)
    };
    let p90 = smooth(|s| s.percentile90);
    let median = smooth(|s| s.median);
    let p10 = smooth(|s| s.percentile10);
    for (i, day) in stats.iter_mut().enumerate() {
        day.percentile90 = p90[i];
        day.median = median[i];
        day.percentile10 = p10[i];
    }

    let missing = DayStats {
        percentile90: f64::NAN,
        median: f64::NAN,
        percentile10: f64::NAN,
        min: f64::NAN,
        max: f64::NAN,
    };
    let joined: Vec<(f64, DayStats)> = target
        .iter()
        .map(|(date, value)| {
            let day = keys
                .binary_search(&(date.month(), date.day()))
                .map_or(missing, |i| stats[i]);
            (value, day)
        })
        .collect();

    let column = |pick: fn(&DayStats) -> f64| -> Vec<Option<f64>> {
        to_output(&joined.iter().map(|(_, s)| pick(s)).collect::<Vec<_>>())
    };

    let cycle = AnnualCycle {
        date: target.date_strings(),
        value: to_output(target.values()),
        percentile90: column(|s| s.percentile90),
        median: column(|s| s.median),
        percentile10: column(|s| s.percentile10),
        min: column(|s| s.min),
        max: column(|s| s.max),
        higher_than_max: joined.iter().map(|(v, s)| u8::from(*v > s.max)).collect(),
        lower_than_min: joined.iter().map(|(v, s)| u8::from(*v < s.min)).collect(),
    };
    info!(records = cycle.date.len(), "Annual cycle calculation complete");
    Ok(cycle)
}
