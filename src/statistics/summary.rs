//! Multi-variable climate summary
//!
//! For every catalogued (variable, aggregation) pair found in the input the
//! summary reports the period value, the 1991–2020 baseline with its
//! percentiles, the anomaly against that baseline and the linear trend per
//! decade since 1940. Pairs are computed on a bounded worker pool and a
//! failing pair only fills its own `error` field.

use super::operations::{finite, nan_max, nan_mean, nan_min, nan_quantile, ols_slope};
use super::OrderedMap;
use crate::array::{LabeledArray, LabeledSeries};
use crate::errors::{ClimateStatsError, Result};
use crate::params::{Period, SummaryStatsParams};
use crate::parallel::ParallelConfig;
use crate::season::SeasonFilter;
use crate::statistics::operations::AggregationFunction::{Max, Mean, Min, Sum};
use crate::statistics::operations::{AggregationFunction, NanPolicy};
use crate::temporal::{
    filter_by_period, resample, select_season_label, Bucketing, LabelFallback, TemporalFilter,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Fixed baseline of the summary statistics.
pub const REFERENCE_WINDOW: (i32, i32) = (1991, 2020);
/// Key under which baseline-derived values are reported.
pub const REFERENCE_KEY: &str = "1991_2020";
pub const TREND_START_YEAR: i32 = 1940;
pub const MIN_TREND_POINTS: usize = 10;

/// Recognised variables with their aggregations and labels, in report order.
pub const VARIABLE_CATALOG: &[(&str, &[(AggregationFunction, &str)])] = &[
    ("tas", &[(Mean, "mean temperature")]),
    (
        "tasmax",
        &[
            (Mean, "average maximum temperature"),
            (Max, "maximum temperature"),
        ],
    ),
    (
        "tasmin",
        &[
            (Mean, "average minimum temperature"),
            (Min, "minimum temperature"),
        ],
    ),
    (
        "pr",
        &[(Sum, "total precipitation"), (Max, "maximum precipitation")],
    ),
    ("fd", &[(Mean, "number of frost days")]),
    ("tr20", &[(Mean, "number of tropical nights (>20°C)")]),
    ("tr25", &[(Mean, "number of warm tropical nights (>25°C)")]),
    ("tx30", &[(Mean, "number of hot days (>30°C)")]),
    ("tx35", &[(Mean, "number of very hot days (>35°C)")]),
    ("tx40", &[(Mean, "number of extremely hot days (>40°C)")]),
    ("r1mm", &[(Mean, "number of wet days (≥1mm)")]),
    ("r20mm", &[(Mean, "number of heavy precipitation days (≥20mm)")]),
    ("r95ptot", &[(Mean, "amount of precipitation from very wet days")]),
    ("sfcWind", &[(Mean, "wind speed"), (Max, "maximum wind speed")]),
];

const COUNT_INDICES: [&str; 8] = ["fd", "tr20", "tr25", "tx30", "tx35", "tx40", "r1mm", "r20mm"];

/// Unit used when the array does not carry one.
#[must_use]
pub fn fallback_unit(variable: &str) -> &'static str {
    match variable {
        "tas" | "tasmax" | "tasmin" => "°C",
        "pr" => "mm",
        "sfcWind" => "km/h",
        v if COUNT_INDICES.contains(&v) => "days",
        _ => "",
    }
}

/// One entry of the summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryStat {
    pub variable: String,
    pub id: String,
    pub long_name: String,
    pub unit: String,
    pub value: Option<f64>,
    pub anomalies: OrderedMap<Option<f64>>,
    pub anomalies_as_perc: OrderedMap<Option<f64>>,
    pub ref_means: OrderedMap<Option<f64>>,
    pub ref_maxs: OrderedMap<Option<f64>>,
    pub ref_mins: OrderedMap<Option<f64>>,
    pub ref_percentiles: OrderedMap<OrderedMap<Option<f64>>>,
    pub percentile_ranks: OrderedMap<f64>,
    pub trend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary entries keyed by stat id, in catalog order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryStats {
    pub stats: OrderedMap<SummaryStat>,
}

/// Baseline statistics of a yearly series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStats {
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    /// Keyed `"10"`, `"90"`, `"95"`.
    pub percentiles: OrderedMap<Option<f64>>,
    /// Share of baseline values strictly below the target, 0–100.
    pub percentile_rank: Option<f64>,
}

/// Baseline statistics over [`REFERENCE_WINDOW`].
///
/// `None` when the series has no entries in the window.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn reference_stats(yearly: &LabeledSeries, target: Option<f64>) -> Option<ReferenceStats> {
    let window = yearly.slice_years(REFERENCE_WINDOW.0, REFERENCE_WINDOW.1);
    if window.is_empty() {
        return None;
    }
    let values = window.values();

    let mut percentiles = OrderedMap::new();
    for (key, q) in [("10", 0.1), ("90", 0.9), ("95", 0.95)] {
        percentiles.insert(key, finite(nan_quantile(values, q)));
    }

    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let percentile_rank = match target {
        Some(target) if !present.is_empty() => {
            let below = present.iter().filter(|v| **v < target).count();
            Some(below as f64 / present.len() as f64 * 100.0)
        }
        _ => None,
    };

    Some(ReferenceStats {
        mean: finite(nan_mean(values)),
        max: finite(nan_max(values)),
        min: finite(nan_min(values)),
        percentiles,
        percentile_rank,
    })
}

/// Least-squares trend per decade of the yearly series from `start_year` on.
///
/// Years are indexed from 0 at the first entry of the slice. `None` with
/// fewer than [`MIN_TREND_POINTS`] non-missing values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_trend(yearly: &LabeledSeries, start_year: i32) -> Option<f64> {
    let start = NaiveDate::from_ymd_opt(start_year, 1, 1)?;
    let end = yearly.dates().last().copied()?;
    let slice = yearly.slice_dates(start, end);

    let (x, y): (Vec<f64>, Vec<f64>) = slice
        .values()
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, v)| (i as f64, *v))
        .unzip();
    if y.len() < MIN_TREND_POINTS {
        debug!(points = y.len(), "Too few points for a trend");
        return None;
    }
    ols_slope(&x, &y).map(|slope| slope * 10.0)
}

/// Mean of the yearly values inside `period`, `None` if missing.
fn target_value(yearly: &LabeledSeries, period: Period) -> Option<f64> {
    finite(nan_mean(filter_by_period(yearly, period).values()))
}

/// Stat id: the variable alone, or `variable_aggregation` when it has several.
#[must_use]
pub fn stat_id(variable: &str, aggregation: AggregationFunction, aggregations: usize) -> String {
    if aggregations > 1 {
        format!("{variable}_{aggregation}")
    } else {
        variable.to_string()
    }
}

struct SummaryTask<'a> {
    variable: &'static str,
    aggregation: AggregationFunction,
    long_name: &'static str,
    id: String,
    unit: String,
    array: &'a LabeledArray,
    region: usize,
}

impl SummaryTask<'_> {
    fn header(&self) -> SummaryStat {
        SummaryStat {
            variable: self.variable.to_string(),
            id: self.id.clone(),
            long_name: self.long_name.to_string(),
            unit: self.unit.clone(),
            ..SummaryStat::default()
        }
    }

    /// One value per year over the whole record.
    fn yearly(&self, season: SeasonFilter) -> Result<LabeledSeries> {
        if self.array.is_categorical() {
            let selection =
                select_season_label(self.array, self.region, season, LabelFallback::Unavailable)?;
            Ok(resample(
                &selection.series,
                Bucketing::Yearly { anchor_month: 1 },
                AggregationFunction::Mean,
                NanPolicy::Skip,
            ))
        } else {
            let filter = TemporalFilter::new(Period::All, season, self.aggregation);
            Ok(filter.compute(&self.array.series(self.region)?)?.1)
        }
    }

    fn run(&self, params: &SummaryStatsParams) -> Result<SummaryStat> {
        let yearly = self.yearly(params.season_filter)?;
        let value = target_value(&yearly, params.period);
        let mut stat = SummaryStat {
            value,
            trend: calculate_trend(&yearly, TREND_START_YEAR),
            ..self.header()
        };

        if let Some(reference) = reference_stats(&yearly, value) {
            stat.ref_means.insert(REFERENCE_KEY, reference.mean);
            stat.ref_maxs.insert(REFERENCE_KEY, reference.max);
            stat.ref_mins.insert(REFERENCE_KEY, reference.min);
            stat.ref_percentiles
                .insert(REFERENCE_KEY, reference.percentiles);
            if let Some(rank) = reference.percentile_rank {
                stat.percentile_ranks.insert(REFERENCE_KEY, rank);
            }
            match (value, reference.mean) {
                (Some(target), Some(mean)) => {
                    stat.anomalies.insert(REFERENCE_KEY, Some(target - mean));
                    if mean != 0.0 {
                        stat.anomalies_as_perc
                            .insert(REFERENCE_KEY, Some((target - mean) / mean.abs() * 100.0));
                    }
                }
                _ => {
                    stat.anomalies.insert(REFERENCE_KEY, None);
                    stat.anomalies_as_perc.insert(REFERENCE_KEY, None);
                }
            }
        } else {
            debug!(variable = self.variable, "Reference window is empty");
        }
        Ok(stat)
    }
}

/// Locate the array of a catalogued variable, stored as `{variable}_None`.
fn find_array<'a>(arrays: &'a [LabeledArray], variable: &str) -> Option<&'a LabeledArray> {
    let internal = format!("{variable}_None");
    arrays
        .iter()
        .find(|a| a.name() == internal || a.name() == variable)
}

/// Build the summary for one region.
///
/// # Errors
///
/// Returns [`ClimateStatsError::NoVariablesResolved`] if no catalogued
/// variable is present, [`ClimateStatsError::RegionNotFound`] if a present
/// variable lacks the region, or a pool construction error.
#[instrument(skip_all, fields(region = %params.region_name, period = %params.period, season = %params.season_filter))]
pub fn get_summary_stats(
    arrays: &[LabeledArray],
    params: &SummaryStatsParams,
    parallel: &ParallelConfig,
) -> Result<SummaryStats> {
    info!("Generating structured summary");

    let prepared: Vec<(&'static str, &[(AggregationFunction, &'static str)], LabeledArray)> =
        VARIABLE_CATALOG
            .iter()
            .filter_map(|(variable, aggregations)| {
                find_array(arrays, variable)
                    .map(|array| (*variable, *aggregations, array.clone().ensure_float()))
            })
            .collect();

    let mut tasks = Vec::new();
    for &(variable, aggregations, ref array) in &prepared {
        let region = array.region_index(&params.region_name)?;
        let unit = array
            .units()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| fallback_unit(variable))
            .to_string();
        for &(aggregation, long_name) in aggregations.iter() {
            tasks.push(SummaryTask {
                variable,
                aggregation,
                long_name,
                id: stat_id(variable, aggregation, aggregations.len()),
                unit: unit.clone(),
                array,
                region,
            });
        }
    }
    if tasks.is_empty() {
        return Err(ClimateStatsError::NoVariablesResolved {
            region: params.region_name.clone(),
        });
    }

    debug!(tasks = tasks.len(), "Dispatching summary tasks");
    let pool = parallel.build_pool()?;
    let results: Vec<SummaryStat> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| {
                task.run(params).unwrap_or_else(|e| {
                    warn!(id = %task.id, error = %e, "Summary statistic failed");
                    SummaryStat {
                        error: Some(e.to_string()),
                        ..task.header()
                    }
                })
            })
            .collect()
    });

    let mut stats = OrderedMap::new();
    for stat in results {
        stats.insert(stat.id.clone(), stat);
    }
    info!(entries = stats.len(), "Summary complete");
    Ok(SummaryStats { stats })
}
