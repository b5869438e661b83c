//! Yearly time series for one region, one or several variables

use super::{to_output, OrderedMap, YearlyRecipe};
use crate::array::{align_series, LabeledArray, DATE_FORMAT};
use crate::errors::{ClimateStatsError, Result};
use crate::params::TimeSeriesParams;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Dates shared by every variable, and one value list per variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub date: Vec<String>,
    pub value: OrderedMap<Vec<Option<f64>>>,
}

/// Compute the yearly series of every input array for the requested region.
///
/// Arrays are outer-joined on their dates: a variable without a value for a
/// date reports `null` there.
///
/// # Errors
///
/// Returns an error if no arrays are given, the region is missing, or an
/// anomaly is requested without a reference period.
#[instrument(skip_all, fields(variable = %params.variable, region = %params.region_name))]
pub fn get_time_series(arrays: &[LabeledArray], params: &TimeSeriesParams) -> Result<TimeSeries> {
    info!("Calculating time series");
    if arrays.is_empty() {
        return Err(ClimateStatsError::VariableNotFound {
            var: params.variable.clone(),
        });
    }
    let reference = if params.anomaly {
        let reference = params
            .reference_period
            .ok_or_else(|| ClimateStatsError::MissingReferencePeriod {
                operation: "time series".to_string(),
            })?;
        info!(reference = %reference, "Calculating anomaly");
        Some(reference)
    } else {
        None
    };

    let recipe = YearlyRecipe {
        resample_freq: params.resample_freq,
        resample_func: params.resample_func,
        season: params.season_filter,
        season_func: params.season_filter_func,
    };

    let mut names = Vec::with_capacity(arrays.len());
    let mut yearly = Vec::with_capacity(arrays.len());
    for array in arrays {
        let array = array.clone().ensure_float();
        let region = array.region_index(&params.region_name)?;
        let source = recipe.source(&array, region)?;
        let series = recipe.yearly_with_anomaly(&source, params.period, reference)?;
        debug!(variable = array.name(), points = series.len(), "Yearly series ready");
        names.push(array.name().to_string());
        yearly.push(series);
    }

    let (dates, matrix) = align_series(&yearly);
    let mut value = OrderedMap::new();
    for (name, column) in names.into_iter().zip(matrix.columns()) {
        value.insert(name, to_output(&column.to_vec()));
    }

    info!(points = dates.len(), "Time series calculation complete");
    Ok(TimeSeries {
        date: dates
            .iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array2;

    fn monthly_array(name: &str, years: std::ops::RangeInclusive<i32>) -> LabeledArray {
        let time: Vec<NaiveDate> = years
            .flat_map(|y| (1..=12).map(move |m| NaiveDate::from_ymd_opt(y, m, 1).unwrap()))
            .collect();
        let values = Array2::from_shape_fn((time.len(), 1), |(i, _)| (i % 12) as f64);
        LabeledArray::numeric(name, time, vec!["ES130".to_string()], values).unwrap()
    }

    fn params(json: &str) -> TimeSeriesParams {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn anomaly_needs_reference() {
        let arrays = [monthly_array("tas_None", 2000..=2002)];
        let p = params(
            r#"{"dataset":"ERA5","region_set":"NUTS-3","region_name":"ES130","variable":"tas","anomaly":true}"#,
        );
        assert!(matches!(
            get_time_series(&arrays, &p),
            Err(ClimateStatsError::MissingReferencePeriod { .. })
        ));
    }

    #[test]
    fn anomaly_against_own_period_is_zero() {
        let arrays = [monthly_array("tas_None", 2000..=2002)];
        let p = params(
            r#"{"dataset":"ERA5","region_set":"NUTS-3","region_name":"ES130","variable":"tas",
                "anomaly":true,"reference_period":"2000-2002"}"#,
        );
        let series = get_time_series(&arrays, &p).unwrap();
        assert_eq!(series.date, vec!["2000-01-01", "2001-01-01", "2002-01-01"]);
        for value in series.value.get("tas_None").unwrap() {
            assert!(value.unwrap().abs() < 1e-12);
        }
    }

    #[test]
    fn unknown_region_is_an_error() {
        let arrays = [monthly_array("tas_None", 2000..=2000)];
        let p = params(r#"{"dataset":"d","region_set":"r","region_name":"FR","variable":"tas"}"#);
        assert!(matches!(
            get_time_series(&arrays, &p),
            Err(ClimateStatsError::RegionNotFound { .. })
        ));
    }
}
