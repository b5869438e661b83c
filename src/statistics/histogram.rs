//! Density histograms of a period against a reference period
//!
//! Both periods share one set of bin edges derived from their pooled values
//! with the "auto" rule: the smaller of the Freedman–Diaconis and Sturges
//! widths, or Sturges alone when the interquartile range is zero. Edges are
//! rounded to one decimal before counting.

use super::operations::quantile_sorted;
use super::{require_variable, season_days, single_input, to_output};
use crate::array::{LabeledArray, LabeledSeries, DATE_FORMAT};
use crate::errors::{ClimateStatsError, Result};
use crate::params::HistogramsParams;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};

const TOP_N: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histograms {
    /// Bin centers
    pub bins: Vec<f64>,
    pub value_period: Vec<Option<f64>>,
    pub value_reference: Vec<Option<f64>>,
    pub max_value_period: Vec<f64>,
    pub max_value_reference: Vec<f64>,
    pub max_date_period: Vec<String>,
    pub max_date_reference: Vec<String>,
}

/// Bin edges for `values` using the "auto" width rule.
///
/// `values` must be finite; `None` when it is empty.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn histogram_bin_edges_auto(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    let ptp = max - min;

    let sturges = ptp / (n.log2() + 1.0);
    let iqr = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);
    let fd = 2.0 * iqr * n.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };

    let (first, last) = if ptp == 0.0 {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let bins = if width > 0.0 {
        (((last - first) / width).ceil() as usize).max(1)
    } else {
        1
    };

    let step = (last - first) / bins as f64;
    Some(
        (0..=bins)
            .map(|i| if i == bins { last } else { first + step * i as f64 })
            .collect(),
    )
}

/// Round to one decimal, ties to even.
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Density of `values` over `edges`: counts divided by the in-range total
/// and the bin width.
///
/// Bins are half-open except the last, which includes its right edge;
/// values outside the edges are not counted.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn density_histogram(values: &[f64], edges: &[f64]) -> Vec<f64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let bins = edges.len() - 1;
    let (first, last) = (edges[0], edges[bins]);
    let mut counts = vec![0_usize; bins];
    for &value in values {
        if !(first..=last).contains(&value) {
            continue;
        }
        let idx = if value == last {
            bins - 1
        } else {
            edges.partition_point(|e| *e <= value) - 1
        };
        counts[idx.min(bins - 1)] += 1;
    }

    let total: usize = counts.iter().sum();
    counts
        .iter()
        .zip(edges.windows(2))
        .map(|(&count, edge)| count as f64 / (total as f64 * (edge[1] - edge[0])))
        .collect()
}

/// Largest values with their dates, largest first.
fn top_values(points: &[(NaiveDate, f64)]) -> (Vec<f64>, Vec<String>) {
    let mut ascending = points.to_vec();
    ascending.sort_by(|a, b| a.1.total_cmp(&b.1));
    ascending
        .iter()
        .rev()
        .take(TOP_N)
        .map(|(d, v)| (*v, d.format(DATE_FORMAT).to_string()))
        .unzip()
}

fn finite_points(series: &LabeledSeries) -> Vec<(NaiveDate, f64)> {
    series.iter().filter(|(_, v)| v.is_finite()).collect()
}

/// Compare the value distribution of the period with the reference period.
///
/// # Errors
///
/// Returns an error for more than one input array, an unknown region or
/// variable, or when neither period has any values.
#[instrument(skip_all, fields(variable = %params.variable, region = %params.region_name))]
pub fn get_histograms(arrays: &[LabeledArray], params: &HistogramsParams) -> Result<Histograms> {
    info!("Calculating histograms");
    let array = single_input(arrays, "histograms")?;
    require_variable(array, &params.variable)?;
    let mut array = array.clone().ensure_float();
    array.transform_units();
    let region = array.region_index(&params.region_name)?;

    let period = finite_points(&season_days(&array, region, params.period, params.season_filter)?);
    let reference = finite_points(&season_days(
        &array,
        region,
        params.reference_period,
        params.season_filter,
    )?);
    debug!(
        period = period.len(),
        reference = reference.len(),
        "Filtered data points"
    );

    let combined: Vec<f64> = period.iter().chain(&reference).map(|(_, v)| *v).collect();
    let edges: Vec<f64> = histogram_bin_edges_auto(&combined)
        .ok_or_else(|| ClimateStatsError::EmptySelection {
            what: format!("{} for histograms", params.variable),
        })?
        .into_iter()
        .map(round_one_decimal)
        .collect();
    let centers: Vec<f64> = edges.windows(2).map(|e| 0.5 * (e[0] + e[1])).collect();

    let values = |points: &[(NaiveDate, f64)]| points.iter().map(|(_, v)| *v).collect::<Vec<_>>();
    let value_period = density_histogram(&values(&period), &edges);
    let value_reference = density_histogram(&values(&reference), &edges);

    let (max_value_period, max_date_period) = top_values(&period);
    let (max_value_reference, max_date_reference) = top_values(&reference);

    info!(bins = centers.len(), "Histogram calculation complete");
    Ok(Histograms {
        bins: centers,
        value_period: to_output(&value_period),
        value_reference: to_output(&value_reference),
        max_value_period,
        max_value_reference,
        max_date_period,
        max_date_reference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn auto_edges_for_uniform_data() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let edges = histogram_bin_edges_auto(&values).unwrap();
        // Sturges: 99 / (log2(100) + 1) = 12.95, FD: 2 * 49.5 * 100^(-1/3) = 21.33
        assert_eq!(edges.len(), 9);
        assert_abs_diff_eq!(edges[0], 0.0);
        assert_abs_diff_eq!(edges[8], 99.0);
    }

    #[test]
    fn degenerate_range_is_widened() {
        let edges = histogram_bin_edges_auto(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(edges, vec![2.5, 3.5]);
        assert!(histogram_bin_edges_auto(&[]).is_none());
    }

    #[test]
    fn density_integrates_to_one() {
        let edges = [0.0, 0.5, 1.5, 3.0];
        let values = [0.1, 0.2, 0.7, 1.5, 2.9, 3.0, 5.0];
        let density = density_histogram(&values, &edges);
        let integral: f64 = density
            .iter()
            .zip(edges.windows(2))
            .map(|(d, e)| d * (e[1] - e[0]))
            .sum();
        assert_abs_diff_eq!(integral, 1.0, epsilon = 1e-12);
        // 1.5 opens the last bin, 3.0 closes it, 5.0 is out of range.
        assert_abs_diff_eq!(density[2], 3.0 / (6.0 * 1.5), epsilon = 1e-12);
    }

    #[test]
    fn rounding_ties_to_even() {
        assert_abs_diff_eq!(round_one_decimal(0.25), 0.2);
        assert_abs_diff_eq!(round_one_decimal(-1.04), -1.0);
        assert_abs_diff_eq!(round_one_decimal(2.36), 2.4);
    }

    #[test]
    fn top_three_largest_first() {
        let day = |d| NaiveDate::from_ymd_opt(2020, 7, d).unwrap();
        let points = vec![(day(1), 30.0), (day(2), 35.0), (day(3), 28.0), (day(4), 33.0)];
        let (values, dates) = top_values(&points);
        assert_eq!(values, vec![35.0, 33.0, 30.0]);
        assert_eq!(dates, vec!["2020-07-02", "2020-07-04", "2020-07-01"]);
    }
}
