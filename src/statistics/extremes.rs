//! Top five highest and lowest values of a selection

use super::{require_variable, season_days, single_input, to_output};
use crate::array::{LabeledArray, DATE_FORMAT};
use crate::errors::Result;
use crate::params::ExtremeValuesParams;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info, instrument};

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremeValues {
    pub date_min: Vec<String>,
    pub value_min: Vec<Option<f64>>,
    pub date_max: Vec<String>,
    pub value_max: Vec<Option<f64>>,
}

/// Descending order with missing values last; ties keep date order.
pub(crate) fn sort_descending(points: &mut [(NaiveDate, f64)]) {
    points.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (false, false) => b.1.total_cmp(&a.1),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    });
}

/// The five largest values and the last five of the same descending order.
///
/// The minimum list is the tail of the descending sort, so it runs from the
/// fifth smallest down to the smallest. With fewer than ten points the two
/// lists share entries.
///
/// # Errors
///
/// Returns an error for more than one input array or an unknown region or
/// variable.
#[instrument(skip_all, fields(variable = %params.variable, region = %params.region_name))]
pub fn get_extreme_values(
    arrays: &[LabeledArray],
    params: &ExtremeValuesParams,
) -> Result<ExtremeValues> {
    info!("Retrieving extreme values");
    let array = single_input(arrays, "extreme values")?;
    require_variable(array, &params.variable)?;
    let array = array.clone().ensure_float();
    let region = array.region_index(&params.region_name)?;

    let selected = season_days(&array, region, params.period, params.season_filter)?;
    let mut points: Vec<(NaiveDate, f64)> = selected.iter().collect();
    sort_descending(&mut points);

    debug!(points = points.len(), "Selecting top 5 max and min values");
    let maxs = &points[..TOP_N.min(points.len())];
    let mins = &points[points.len().saturating_sub(TOP_N)..];

    let dates = |part: &[(NaiveDate, f64)]| -> Vec<String> {
        part.iter()
            .map(|(d, _)| d.format(DATE_FORMAT).to_string())
            .collect()
    };
    let values = |part: &[(NaiveDate, f64)]| -> Vec<Option<f64>> {
        to_output(&part.iter().map(|(_, v)| *v).collect::<Vec<_>>())
    };

    Ok(ExtremeValues {
        date_min: dates(mins),
        value_min: values(mins),
        date_max: dates(maxs),
        value_max: values(maxs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_sort_last() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let mut points = vec![(day(1), 2.0), (day(2), f64::NAN), (day(3), 5.0), (day(4), 2.0)];
        sort_descending(&mut points);
        assert_eq!(points[0], (day(3), 5.0));
        assert_eq!(points[1], (day(1), 2.0));
        assert_eq!(points[2], (day(4), 2.0));
        assert!(points[3].1.is_nan());
    }
}
