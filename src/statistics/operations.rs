//! Core statistical operations and traits
//!
//! Aggregations are a closed set dispatched through an explicit table, so an
//! unknown name is rejected while the request is parsed. Every reducer works
//! on `f64` slices; how missing values are treated is chosen per call site
//! through [`NanPolicy`].

use crate::errors::{ClimateStatsError, Result};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Supported aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum AggregationFunction {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Maximum value
    Max,
    /// Minimum value
    Min,
    /// Population standard deviation
    Std,
    /// Median (linear interpolation)
    Median,
    /// Sum of values
    Sum,
}

type Reducer = fn(&[f64]) -> f64;

/// Name and reducer of every aggregation. Reducers receive a non-empty slice
/// without NaN values.
static DISPATCH: [(AggregationFunction, &str, Reducer); 6] = [
    (AggregationFunction::Mean, "mean", mean_of),
    (AggregationFunction::Max, "max", max_of),
    (AggregationFunction::Min, "min", min_of),
    (AggregationFunction::Std, "std", std_of),
    (AggregationFunction::Median, "median", median_of),
    (AggregationFunction::Sum, "sum", sum_of),
];

/// How missing values inside a reduction window are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NanPolicy {
    /// Any NaN (or an empty window) makes the result NaN.
    Propagate,
    /// NaN values are dropped first; an empty remainder gives `0` for `sum`
    /// and NaN for everything else.
    Skip,
}

impl AggregationFunction {
    /// Get the string representation of the aggregation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    fn entry(self) -> &'static (AggregationFunction, &'static str, Reducer) {
        // DISPATCH lists every variant, in declaration order
        &DISPATCH[self as usize]
    }

    /// Reduce `values` to one number.
    #[must_use]
    pub fn reduce(self, values: &[f64], policy: NanPolicy) -> f64 {
        let reducer = self.entry().2;
        match policy {
            NanPolicy::Propagate => {
                if values.is_empty() || values.iter().any(|v| v.is_nan()) {
                    f64::NAN
                } else {
                    reducer(values)
                }
            }
            NanPolicy::Skip => {
                let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
                if present.is_empty() {
                    if self == Self::Sum {
                        0.0
                    } else {
                        f64::NAN
                    }
                } else {
                    reducer(&present)
                }
            }
        }
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationFunction {
    type Err = ClimateStatsError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        DISPATCH
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(agg, _, _)| *agg)
            .ok_or_else(|| ClimateStatsError::UnknownAggregation {
                name: name.to_string(),
            })
    }
}

impl TryFrom<String> for AggregationFunction {
    type Error = ClimateStatsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

fn sum_of(values: &[f64]) -> f64 {
    values.iter().sum()
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(values: &[f64]) -> f64 {
    sum_of(values) / values.len() as f64
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

#[allow(clippy::cast_precision_loss)]
fn std_of(values: &[f64]) -> f64 {
    let mean = mean_of(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, 0.5)
}

/// Quantile of already sorted, NaN-free data using linear interpolation
/// between closest ranks. NaN for empty input.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Quantile ignoring NaN values.
#[must_use]
pub fn nan_quantile(values: &[f64], q: f64) -> f64 {
    let mut present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    present.sort_by(f64::total_cmp);
    quantile_sorted(&present, q)
}

#[must_use]
pub fn nan_mean(values: &[f64]) -> f64 {
    AggregationFunction::Mean.reduce(values, NanPolicy::Skip)
}

#[must_use]
pub fn nan_max(values: &[f64]) -> f64 {
    AggregationFunction::Max.reduce(values, NanPolicy::Skip)
}

#[must_use]
pub fn nan_min(values: &[f64]) -> f64 {
    AggregationFunction::Min.reduce(values, NanPolicy::Skip)
}

/// Ordinary least-squares slope of `(x, y)` pairs.
///
/// `None` with fewer than two points or when every `x` is identical.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ols_slope(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        sxy += (xi - mean_x) * (yi - mean_y);
        sxx += (xi - mean_x).powi(2);
    }
    if sxx == 0.0 {
        None
    } else {
        Some(sxy / sxx)
    }
}

/// `Some(value)` for finite numbers, `None` for NaN and infinities.
#[must_use]
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Trait for arrays that can be reduced along one axis
pub trait StatisticalReduction {
    /// Reduce every lane along `axis` with `aggregation`.
    ///
    /// Lanes are processed in parallel; the result keeps the order of the
    /// remaining axis.
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is out of bounds for the array
    fn reduce_along_axis(
        &self,
        axis: usize,
        aggregation: AggregationFunction,
        policy: NanPolicy,
    ) -> Result<Array1<f64>>;

    /// NaN-skipping mean along `axis`.
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is out of bounds for the array
    fn nan_mean_axis(&self, axis: usize) -> Result<Array1<f64>> {
        self.reduce_along_axis(axis, AggregationFunction::Mean, NanPolicy::Skip)
    }
}

impl StatisticalReduction for Array2<f64> {
    fn reduce_along_axis(
        &self,
        axis: usize,
        aggregation: AggregationFunction,
        policy: NanPolicy,
    ) -> Result<Array1<f64>> {
        if axis >= self.ndim() {
            return Err(ClimateStatsError::Generic(format!(
                "Axis {axis} is out of bounds for array with {} dimensions",
                self.ndim()
            )));
        }
        let kept = Axis(1 - axis);
        let reduced: Vec<f64> = self
            .axis_iter(kept)
            .into_par_iter()
            .map(|lane| {
                let values: Vec<f64> = lane.iter().copied().collect();
                aggregation.reduce(&values, policy)
            })
            .collect();
        Ok(Array1::from(reduced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn names_round_trip_through_dispatch_table() {
        for (agg, name, _) in DISPATCH {
            assert_eq!(agg.as_str(), name);
            assert_eq!(name.parse::<AggregationFunction>().unwrap(), agg);
        }
        assert!(matches!(
            "mode".parse::<AggregationFunction>(),
            Err(ClimateStatsError::UnknownAggregation { .. })
        ));
        assert_eq!(AggregationFunction::default(), AggregationFunction::Mean);
    }

    #[test]
    fn reducers_on_clean_data() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let p = NanPolicy::Propagate;
        assert_relative_eq!(AggregationFunction::Mean.reduce(&values, p), 5.0);
        assert_relative_eq!(AggregationFunction::Std.reduce(&values, p), 2.0);
        assert_relative_eq!(AggregationFunction::Median.reduce(&values, p), 4.5);
        assert_relative_eq!(AggregationFunction::Sum.reduce(&values, p), 40.0);
        assert_relative_eq!(AggregationFunction::Max.reduce(&values, p), 9.0);
        assert_relative_eq!(AggregationFunction::Min.reduce(&values, p), 2.0);
    }

    #[test]
    fn nan_policies() {
        let values = [1.0, f64::NAN, 3.0];
        assert!(AggregationFunction::Mean
            .reduce(&values, NanPolicy::Propagate)
            .is_nan());
        assert_relative_eq!(AggregationFunction::Mean.reduce(&values, NanPolicy::Skip), 2.0);

        let missing = [f64::NAN, f64::NAN];
        assert!(AggregationFunction::Sum
            .reduce(&missing, NanPolicy::Propagate)
            .is_nan());
        assert_eq!(AggregationFunction::Sum.reduce(&missing, NanPolicy::Skip), 0.0);
        assert!(AggregationFunction::Max.reduce(&missing, NanPolicy::Skip).is_nan());
        assert!(AggregationFunction::Mean.reduce(&[], NanPolicy::Propagate).is_nan());
    }

    #[test]
    fn linear_quantiles() {
        let values = [f64::NAN, 4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(nan_quantile(&values, 0.5), 2.5);
        assert_relative_eq!(nan_quantile(&values, 0.9), 3.7);
        assert_relative_eq!(nan_quantile(&values, 0.0), 1.0);
        assert_relative_eq!(nan_quantile(&values, 1.0), 4.0);
        assert!(nan_quantile(&[f64::NAN], 0.5).is_nan());
    }

    #[test]
    fn slope_of_a_line() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.3 * v + 1.0).collect();
        assert_relative_eq!(ols_slope(&x, &y).unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!(ols_slope(&[1.0], &[2.0]), None);
        assert_eq!(ols_slope(&[1.0, 1.0], &[2.0, 3.0]), None);
    }

    #[test]
    fn axis_reduction_skips_missing() {
        let data = array![[1.0, f64::NAN], [3.0, f64::NAN], [5.0, 2.0]];
        let means = data.nan_mean_axis(0).unwrap();
        assert_eq!(means.len(), 2);
        assert_relative_eq!(means[0], 3.0);
        assert_relative_eq!(means[1], 2.0);

        let sums = data
            .reduce_along_axis(1, AggregationFunction::Sum, NanPolicy::Propagate)
            .unwrap();
        assert_eq!(sums.len(), 3);
        assert!(sums[0].is_nan());
        assert_relative_eq!(sums[2], 7.0);

        assert!(data.nan_mean_axis(2).is_err());
    }
}
