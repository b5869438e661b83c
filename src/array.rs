//! Labeled climate arrays as handed over by the loader
//!
//! A [`LabeledArray`] holds one variable for many regions along a time axis,
//! either as plain `(time, region)` values or, for derived indices, as
//! `(time, season label, region)` values where off-season cells are NaN.
//! Engines pull single-region [`LabeledSeries`] out of it.

use crate::errors::{ClimateStatsError, Result};
use crate::season::SeasonLabel;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Array3, Axis};
use std::collections::BTreeSet;
use tracing::info;

/// Date format used in every result.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage unit of duration-typed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Nanoseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    /// How many of this unit make up one day.
    #[must_use]
    pub const fn per_day(self) -> f64 {
        match self {
            Self::Nanoseconds => 86_400.0e9,
            Self::Seconds => 86_400.0,
            Self::Minutes => 1_440.0,
            Self::Hours => 24.0,
            Self::Days => 1.0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "nanoseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    /// Recognise a bare CF time unit (`"days"`, `"hours"`, ...).
    #[must_use]
    pub fn from_units(units: &str) -> Option<Self> {
        match units.trim().to_ascii_lowercase().as_str() {
            "nanoseconds" | "ns" => Some(Self::Nanoseconds),
            "seconds" | "second" | "s" => Some(Self::Seconds),
            "minutes" | "minute" | "min" => Some(Self::Minutes),
            "hours" | "hour" | "h" => Some(Self::Hours),
            "days" | "day" | "d" => Some(Self::Days),
            _ => None,
        }
    }
}

/// How the raw numbers of an array are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    Float,
    /// Durations stored in `unit`; must be normalised with
    /// [`LabeledArray::ensure_float`] before any arithmetic.
    Duration(DurationUnit),
}

/// Ordered `(date, value)` pairs for one region and variable.
///
/// Dates are non-decreasing; every constructor that takes external input
/// checks that they are strictly increasing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl LabeledSeries {
    /// Build a series, checking lengths and strict date ordering.
    ///
    /// # Errors
    ///
    /// Returns an error if lengths differ or dates are not strictly increasing.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ClimateStatsError::Generic(format!(
                "Series has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ClimateStatsError::InvalidTime {
                reason: format!("timestamps not strictly increasing at {}", pair[1]),
            });
        }
        Ok(Self { dates, values })
    }

    /// Build from pieces that are already known to be ordered.
    pub(crate) fn from_ordered(dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        Self { dates, values }
    }

    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Points whose date lies in `[start, end]`, in order.
    #[must_use]
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        if lo >= hi {
            return Self::default();
        }
        Self {
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        }
    }

    /// Points whose year lies in `[start_year, end_year]`.
    #[must_use]
    pub fn slice_years(&self, start_year: i32, end_year: i32) -> Self {
        match (
            NaiveDate::from_ymd_opt(start_year, 1, 1),
            NaiveDate::from_ymd_opt(end_year, 12, 31),
        ) {
            (Some(start), Some(end)) => self.slice_dates(start, end),
            _ => Self::default(),
        }
    }

    /// The series without NaN values.
    #[must_use]
    pub fn drop_nan(&self) -> Self {
        let (dates, values) = self.iter().filter(|(_, v)| !v.is_nan()).unzip();
        Self { dates, values }
    }

    /// Subtract a constant from every value.
    #[must_use]
    pub fn offset(&self, by: f64) -> Self {
        Self {
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| v - by).collect(),
        }
    }

    /// Dates rendered as `YYYY-MM-DD`.
    #[must_use]
    pub fn date_strings(&self) -> Vec<String> {
        self.dates
            .iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect()
    }
}

/// Outer-join several series on their dates.
///
/// Returns the sorted union of dates and a `(date, series)` matrix where a
/// series without a value for a date holds NaN.
#[must_use]
pub fn align_series(series: &[LabeledSeries]) -> (Vec<NaiveDate>, Array2<f64>) {
    let dates: Vec<NaiveDate> = series
        .iter()
        .flat_map(|s| s.dates().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut matrix = Array2::from_elem((dates.len(), series.len()), f64::NAN);
    for (col, s) in series.iter().enumerate() {
        for (date, value) in s.iter() {
            if let Ok(row) = dates.binary_search(&date) {
                matrix[[row, col]] = value;
            }
        }
    }
    (dates, matrix)
}

/// Values of a labeled array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    /// `(time, region)`
    Numeric(Array2<f64>),
    /// `(time, season label, region)`
    Categorical {
        labels: Vec<SeasonLabel>,
        values: Array3<f64>,
    },
}

/// One variable over time and regions, as produced by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    name: String,
    time: Vec<NaiveDate>,
    regions: Vec<String>,
    values: ArrayValues,
    kind: ValueKind,
    units: Option<String>,
}

impl LabeledArray {
    /// A `(time, region)` array of raw daily/monthly/yearly values.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape does not match the coordinates or the
    /// time coordinate is not strictly increasing.
    pub fn numeric(
        name: impl Into<String>,
        time: Vec<NaiveDate>,
        regions: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self> {
        check_time(&time)?;
        if values.dim() != (time.len(), regions.len()) {
            return Err(ClimateStatsError::Generic(format!(
                "Array shape {:?} does not match (time={}, region={})",
                values.dim(),
                time.len(),
                regions.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            time,
            regions,
            values: ArrayValues::Numeric(values),
            kind: ValueKind::Float,
            units: None,
        })
    }

    /// A `(time, season label, region)` array of a derived index.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape does not match the coordinates or the
    /// time coordinate is not strictly increasing.
    pub fn categorical(
        name: impl Into<String>,
        time: Vec<NaiveDate>,
        labels: Vec<SeasonLabel>,
        regions: Vec<String>,
        values: Array3<f64>,
    ) -> Result<Self> {
        check_time(&time)?;
        if values.dim() != (time.len(), labels.len(), regions.len()) {
            return Err(ClimateStatsError::Generic(format!(
                "Array shape {:?} does not match (time={}, season={}, region={})",
                values.dim(),
                time.len(),
                labels.len(),
                regions.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            time,
            regions,
            values: ArrayValues::Categorical { labels, values },
            kind: ValueKind::Float,
            units: None,
        })
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable name without its level suffix: `tas_None` -> `tas`.
    #[must_use]
    pub fn base_variable(&self) -> &str {
        self.name
            .rsplit_once('_')
            .map_or(self.name.as_str(), |(base, _)| base)
    }

    #[must_use]
    pub fn time(&self) -> &[NaiveDate] {
        &self.time
    }

    #[must_use]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    #[must_use]
    pub fn values(&self) -> &ArrayValues {
        &self.values
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    #[must_use]
    pub fn is_categorical(&self) -> bool {
        matches!(self.values, ArrayValues::Categorical { .. })
    }

    #[must_use]
    pub fn season_labels(&self) -> Option<&[SeasonLabel]> {
        match &self.values {
            ArrayValues::Categorical { labels, .. } => Some(labels),
            ArrayValues::Numeric(_) => None,
        }
    }

    /// Position of `region` on the region coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::RegionNotFound`] if it is absent.
    pub fn region_index(&self, region: &str) -> Result<usize> {
        self.regions
            .iter()
            .position(|r| r == region)
            .ok_or_else(|| ClimateStatsError::RegionNotFound {
                region: region.to_string(),
            })
    }

    /// The raw series of one region of a numeric array.
    ///
    /// # Errors
    ///
    /// Returns an error for categorical arrays or out-of-range regions.
    pub fn series(&self, region: usize) -> Result<LabeledSeries> {
        match &self.values {
            ArrayValues::Numeric(values) => {
                if region >= values.ncols() {
                    return Err(ClimateStatsError::Generic(format!(
                        "Region index {region} out of bounds for '{}'",
                        self.name
                    )));
                }
                Ok(LabeledSeries::from_ordered(
                    self.time.clone(),
                    values.column(region).to_vec(),
                ))
            }
            ArrayValues::Categorical { .. } => Err(ClimateStatsError::CategoricalUnsupported {
                operation: "raw series extraction".to_string(),
            }),
        }
    }

    /// The column of one season label for one region, missing values included.
    ///
    /// `None` if the array is numeric or does not carry `label`.
    #[must_use]
    pub fn label_series(&self, region: usize, label: SeasonLabel) -> Option<LabeledSeries> {
        let ArrayValues::Categorical { labels, values } = &self.values else {
            return None;
        };
        let label_idx = labels.iter().position(|l| *l == label)?;
        if region >= values.len_of(Axis(2)) {
            return None;
        }
        let column: Array1<f64> = values
            .index_axis(Axis(1), label_idx)
            .column(region)
            .to_owned();
        Some(LabeledSeries::from_ordered(self.time.clone(), column.to_vec()))
    }

    /// Normalise duration-typed values to float days.
    ///
    /// Float arrays are returned unchanged.
    #[must_use]
    pub fn ensure_float(mut self) -> Self {
        if let ValueKind::Duration(unit) = self.kind {
            info!(
                variable = %self.name,
                "Transforming duration values to float days"
            );
            let per_day = unit.per_day();
            match &mut self.values {
                ArrayValues::Numeric(values) => values.mapv_inplace(|v| v / per_day),
                ArrayValues::Categorical { values, .. } => values.mapv_inplace(|v| v / per_day),
            }
            self.kind = ValueKind::Float;
        }
        self
    }

    /// Convert surface wind from m/s to km/h.
    ///
    /// Only `sfcWind` arrays are touched, and only once: an array already
    /// labelled `km/h` is left as is.
    pub fn transform_units(&mut self) {
        if self.base_variable() != "sfcWind" && self.name != "sfcWind" {
            return;
        }
        if self.units.as_deref() == Some("km/h") {
            return;
        }
        info!(variable = %self.name, "Transforming units from m/s to km/h");
        match &mut self.values {
            ArrayValues::Numeric(values) => values.mapv_inplace(|v| v * 3.6),
            ArrayValues::Categorical { values, .. } => values.mapv_inplace(|v| v * 3.6),
        }
        self.units = Some("km/h".to_string());
    }
}

fn check_time(time: &[NaiveDate]) -> Result<()> {
    match time.windows(2).find(|w| w[0] >= w[1]) {
        Some(pair) => Err(ClimateStatsError::InvalidTime {
            reason: format!("timestamps not strictly increasing at {}", pair[1]),
        }),
        None => Ok(()),
    }
}
