//! End-to-end tests of the statistic engines on in-memory arrays

use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate};
use climate_stats::array::{DurationUnit, LabeledArray, ValueKind};
use climate_stats::errors::ClimateStatsError;
use climate_stats::parallel::ParallelConfig;
use climate_stats::params::{
    AnnualCycleParams, ClimatologyMapParams, ExtremeValuesParams, HistogramsParams,
    SummaryStatsParams, TimeSeriesParams,
};
use climate_stats::season::SeasonLabel;
use climate_stats::statistics::{
    get_annual_cycle, get_climatology_map, get_extreme_values, get_histograms, get_summary_stats,
    get_time_series,
};
use ndarray::{Array2, Array3};
use serde::de::DeserializeOwned;
use serde_json::json;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn days(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}

fn months(first_year: i32, last_year: i32) -> Vec<NaiveDate> {
    (first_year..=last_year)
        .flat_map(|y| (1..=12).map(move |m| day(y, m, 1)))
        .collect()
}

/// One-region numeric array with values computed from the date.
fn single_region(
    name: &str,
    region: &str,
    time: Vec<NaiveDate>,
    value: impl Fn(NaiveDate) -> f64,
) -> LabeledArray {
    let values: Vec<f64> = time.iter().map(|d| value(*d)).collect();
    let matrix = Array2::from_shape_vec((time.len(), 1), values).unwrap();
    LabeledArray::numeric(name, time, vec![region.to_string()], matrix).unwrap()
}

fn params<T: DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}

/// Smooth seasonal cycle with a slow warming trend.
///
/// The phase depends on month and day only, so every year agrees on the
/// value of a calendar day apart from the trend.
fn seasonal(d: NaiveDate) -> f64 {
    let phase = f64::from((d.month() - 1) * 31 + d.day()) / 372.0 * std::f64::consts::TAU;
    15.0 - 10.0 * phase.cos() + 0.02 * f64::from(d.year() - 1950)
}

#[test]
fn annual_cycle_of_leap_year_has_full_bands() {
    let array = single_region(
        "tas_None",
        "Spain",
        days(day(1950, 1, 1), day(2024, 12, 31)),
        seasonal,
    );
    let cycle: AnnualCycleParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "Spain",
        "variable": "tas",
        "period": "2024-2024",
        "reference_period": "1950-2023",
    }));

    let result = get_annual_cycle(&[array], &cycle).unwrap();
    assert_eq!(result.date.len(), 366);
    assert_eq!(result.date[0], "2024-01-01");
    assert_eq!(result.date[59], "2024-02-29");
    for column in [
        &result.value,
        &result.percentile90,
        &result.median,
        &result.percentile10,
        &result.min,
        &result.max,
    ] {
        assert_eq!(column.len(), 366);
        assert!(column.iter().all(Option::is_some));
    }
    for i in 0..366 {
        assert!(result.percentile90[i].unwrap() >= result.percentile10[i].unwrap());
    }
    // The warming trend puts 2024 above every earlier year.
    assert!(result.higher_than_max.iter().all(|f| *f == 1));
    assert!(result.lower_than_min.iter().all(|f| *f == 0));
}

#[test]
fn annual_cycle_rejects_two_inputs() {
    let time = days(day(2020, 1, 1), day(2020, 12, 31));
    let arrays = [
        single_region("tas_None", "ES", time.clone(), seasonal),
        single_region("pr_None", "ES", time, |_| 1.0),
    ];
    let cycle: AnnualCycleParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tas",
    }));
    assert!(matches!(
        get_annual_cycle(&arrays, &cycle),
        Err(ClimateStatsError::MultipleInputsUnsupported { count: 2, .. })
    ));
}

#[test]
fn multi_variable_time_series_is_aligned() {
    let tas = single_region(
        "tas_None",
        "ES130",
        days(day(2000, 1, 1), day(2004, 12, 31)),
        seasonal,
    );
    let pr = single_region(
        "pr_None",
        "ES130",
        days(day(2001, 1, 1), day(2005, 12, 31)),
        |_| 2.0,
    );
    let request: TimeSeriesParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-3",
        "region_name": "ES130",
        "variable": "tas;pr",
        "resample_freq": "MS",
        "resample_func": "mean",
        "season_filter_func": "sum",
    }));
    assert_eq!(request.variables(), vec!["tas", "pr"]);

    let series = get_time_series(&[tas, pr], &request).unwrap();
    assert_eq!(series.value.len(), 2);
    assert_eq!(
        series.value.keys().collect::<Vec<_>>(),
        vec!["tas_None", "pr_None"]
    );
    assert_eq!(series.date.len(), 6);
    assert_eq!(series.date[0], "2000-01-01");
    for (_, values) in series.value.iter() {
        assert_eq!(values.len(), series.date.len());
    }

    let pr_values = series.value.get("pr_None").unwrap();
    assert_eq!(pr_values[0], None);
    // Twelve monthly means of 2.0 summed per year.
    assert_relative_eq!(pr_values[1].unwrap(), 24.0);
}

#[test]
fn duration_values_are_normalised_before_resampling() {
    let array = single_region(
        "fd_None",
        "ES",
        days(day(2020, 1, 1), day(2020, 1, 10)),
        |d| f64::from(d.day()) * 24.0,
    )
    .with_kind(ValueKind::Duration(DurationUnit::Hours));
    let request: TimeSeriesParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "fd",
        "resample_freq": "MS",
        "resample_func": "mean",
    }));

    let series = get_time_series(&[array], &request).unwrap();
    assert_eq!(series.date, vec!["2020-01-01"]);
    assert_relative_eq!(series.value.get("fd_None").unwrap()[0].unwrap(), 5.5);
}

#[test]
fn time_series_anomaly_needs_reference() {
    let array = single_region("tas_None", "ES", months(2000, 2005), |_| 10.0);
    let request: TimeSeriesParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tas",
        "anomaly": true,
    }));
    assert!(matches!(
        get_time_series(&[array], &request),
        Err(ClimateStatsError::MissingReferencePeriod { .. })
    ));
}

#[test]
fn climatology_map_keeps_requested_region_order() {
    let time = months(1991, 2000);
    let values: Vec<f64> = time
        .iter()
        .flat_map(|_| [1.0, 2.0, 3.0])
        .collect();
    let matrix = Array2::from_shape_vec((time.len(), 3), values).unwrap();
    let regions = vec!["AT".to_string(), "ES".to_string(), "FR".to_string()];
    let array = LabeledArray::numeric("tas_None", time, regions, matrix).unwrap();

    let request: ClimatologyMapParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "FR;AT",
        "variable": "tas_None",
        "season_filter": "06-08",
    }));
    let map = get_climatology_map(&[array], &request).unwrap();
    assert_eq!(map.region, vec!["FR", "AT"]);
    assert_relative_eq!(map.data[0].unwrap(), 3.0);
    assert_relative_eq!(map.data[1].unwrap(), 1.0);

    let unknown: ClimatologyMapParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "FR;PT",
        "variable": "tas",
    }));
    let array = LabeledArray::numeric(
        "tas_None",
        months(2000, 2000),
        vec!["FR".to_string()],
        Array2::zeros((12, 1)),
    )
    .unwrap();
    assert!(matches!(
        get_climatology_map(&[array], &unknown),
        Err(ClimateStatsError::RegionNotFound { .. })
    ));
}

#[test]
fn climatology_of_index_without_season_column_uses_annual() {
    let time = vec![day(2000, 1, 1), day(2001, 1, 1)];
    let fd = LabeledArray::categorical(
        "fd_None",
        time,
        vec![SeasonLabel::Annual],
        vec!["ES".to_string()],
        Array3::from_shape_vec((2, 1, 1), vec![12.0, 14.0]).unwrap(),
    )
    .unwrap();
    let request: ClimatologyMapParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "fd",
        "season_filter": "12-02",
    }));

    let map = get_climatology_map(&[fd], &request).unwrap();
    assert_eq!(map.data.len(), 1);
    assert_relative_eq!(map.data[0].unwrap(), 13.0);
}

#[test]
fn extremes_reject_years_beyond_the_calendar() {
    let array = single_region("tas_None", "ES", months(2000, 2001), |_| 1.0);
    let request: ExtremeValuesParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tas",
        "period": "2147483647-2147483647",
    }));
    assert!(matches!(
        get_extreme_values(&[array], &request),
        Err(ClimateStatsError::InvalidTime { .. })
    ));
}

#[test]
fn extremes_are_capped_and_sorted() {
    let array = single_region(
        "tasmax_None",
        "ES",
        days(day(2023, 1, 1), day(2024, 12, 31)),
        |d| f64::from(d.ordinal()),
    );
    let request: ExtremeValuesParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tasmax",
        "period": "2024-2024",
        "season_filter": "06-08",
    }));

    let extremes = get_extreme_values(&[array], &request).unwrap();
    assert_eq!(extremes.value_max.len(), 5);
    assert_eq!(extremes.value_min.len(), 5);
    assert_eq!(extremes.date_max[0], "2024-08-31");
    assert_eq!(extremes.date_min[4], "2024-06-01");
    let maxs: Vec<f64> = extremes.value_max.iter().map(|v| v.unwrap()).collect();
    assert!(maxs.windows(2).all(|w| w[0] >= w[1]));
    let mins: Vec<f64> = extremes.value_min.iter().map(|v| v.unwrap()).collect();
    assert!(mins.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn short_selection_gives_overlapping_extremes() {
    let array = single_region(
        "tas_None",
        "ES",
        days(day(2024, 3, 1), day(2024, 3, 7)),
        |d| f64::from(d.day()),
    );
    let request: ExtremeValuesParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tas",
        "period": "2024-2024",
    }));
    let extremes = get_extreme_values(&[array], &request).unwrap();
    assert_eq!(
        extremes.value_max,
        vec![Some(7.0), Some(6.0), Some(5.0), Some(4.0), Some(3.0)]
    );
    assert_eq!(
        extremes.value_min,
        vec![Some(5.0), Some(4.0), Some(3.0), Some(2.0), Some(1.0)]
    );
}

#[test]
fn histograms_share_bins_between_periods() {
    let array = single_region(
        "tas_None",
        "ES",
        days(day(1950, 1, 1), day(2024, 12, 31)),
        seasonal,
    );
    let request: HistogramsParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tas",
        "period": "2015-2024",
        "season_filter": "12-02",
    }));

    let histograms = get_histograms(&[array], &request).unwrap();
    assert!(!histograms.bins.is_empty());
    assert_eq!(histograms.value_period.len(), histograms.bins.len());
    assert_eq!(histograms.value_reference.len(), histograms.bins.len());
    assert!(histograms.bins.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(histograms.max_value_period.len(), 3);
    assert_eq!(histograms.max_date_reference.len(), 3);
    assert!(histograms
        .max_value_period
        .windows(2)
        .all(|w| w[0] >= w[1]));
}

#[test]
fn histogram_densities_integrate_to_one() {
    // Pooled minimum is June 1st 1950 with value 1.0, so the first edge is exact.
    let array = single_region(
        "tas_None",
        "ES",
        days(day(1950, 1, 1), day(2024, 12, 31)),
        |d| f64::from(d.day()) + 0.25 * f64::from(d.year() - 1950),
    );
    let request: HistogramsParams = params(json!({
        "dataset": "ERA5",
        "region_set": "NUTS-0",
        "region_name": "ES",
        "variable": "tas",
        "period": "2015-2024",
        "season_filter": "06-08",
    }));
    let histograms = get_histograms(&[array], &request).unwrap();

    let mut edges = vec![1.0];
    for center in &histograms.bins {
        let left = edges[edges.len() - 1];
        edges.push(2.0 * center - left);
    }
    assert_relative_eq!(edges[edges.len() - 1], 49.5, epsilon = 1e-9);

    for densities in [&histograms.value_period, &histograms.value_reference] {
        let integral: f64 = densities
            .iter()
            .zip(edges.windows(2))
            .map(|(density, edge)| density.unwrap() * (edge[1] - edge[0]))
            .sum();
        assert_relative_eq!(integral, 1.0, epsilon = 1e-9);
    }
}

fn summary_request(season: &str) -> SummaryStatsParams {
    params(json!({
        "region_name": "ES",
        "period": "2024-2024",
        "season_filter": season,
    }))
}

#[test]
fn summary_trend_needs_ten_years() {
    let short = single_region("tas_None", "ES", months(2016, 2024), |d| {
        f64::from(d.year() - 2000)
    });
    let summary = get_summary_stats(
        &[short],
        &summary_request("01-12"),
        &ParallelConfig::with_threads(2),
    )
    .unwrap();
    let tas = summary.stats.get("tas").unwrap();
    assert_eq!(tas.trend, None);
    assert_relative_eq!(tas.value.unwrap(), 24.0);
    assert!(tas.ref_means.is_empty());
    assert_eq!(tas.unit, "°C");

    let long = single_region("tas_None", "ES", months(1991, 2024), |d| {
        f64::from(d.year() - 2000)
    });
    let summary = get_summary_stats(
        &[long],
        &summary_request("01-12"),
        &ParallelConfig::with_threads(2),
    )
    .unwrap();
    let tas = summary.stats.get("tas").unwrap();
    // One degree per year is ten per decade.
    assert_relative_eq!(tas.trend.unwrap(), 10.0, epsilon = 1e-9);
    assert_relative_eq!(tas.ref_means.get("1991_2020").unwrap().unwrap(), 5.5);
    assert_relative_eq!(tas.anomalies.get("1991_2020").unwrap().unwrap(), 18.5);
}

#[test]
fn summary_isolates_unavailable_index_filter() {
    let tas = single_region("tas_None", "ES", months(2000, 2024), |_| 12.0);

    let time: Vec<NaiveDate> = (2000..=2024).map(|y| day(y, 1, 1)).collect();
    let labels = vec![SeasonLabel::Annual, SeasonLabel::JunAug];
    let fd = LabeledArray::categorical(
        "fd_None",
        time.clone(),
        labels,
        vec!["ES".to_string()],
        Array3::from_elem((time.len(), 2, 1), 4.0),
    )
    .unwrap();

    let summary = get_summary_stats(
        &[tas, fd],
        &summary_request("04-09"),
        &ParallelConfig::with_threads(2),
    )
    .unwrap();
    assert_eq!(summary.stats.keys().collect::<Vec<_>>(), vec!["tas", "fd"]);

    let fd = summary.stats.get("fd").unwrap();
    assert_eq!(
        fd.error.as_deref(),
        Some("Filter 04-09 not available for index fd")
    );
    assert_eq!(fd.value, None);

    let tas = summary.stats.get("tas").unwrap();
    assert!(tas.error.is_none());
    assert_relative_eq!(tas.value.unwrap(), 12.0);
}

#[test]
fn summary_without_known_variables_fails() {
    let other = single_region("foo_None", "ES", months(2000, 2024), |_| 1.0);
    assert!(matches!(
        get_summary_stats(
            &[other],
            &summary_request("01-12"),
            &ParallelConfig::default()
        ),
        Err(ClimateStatsError::NoVariablesResolved { .. })
    ));
}
