//! Calendar-aware period and season selection, and anchor-based resampling
//!
//! [`TemporalFilter`] is the shared front half of most engines: it cuts a raw
//! series down to the requested years and season, then reduces it to one
//! value per year. Season windows are computed by [`season_bounds`] as
//! absolute dates, so a wrapping season such as `12-02` labelled with year
//! `y` covers December of `y - 1` through the end of February of `y`.
//!
//! Derived indices skip all of this: their season is already a column of the
//! array, picked by [`select_season_label`].

use crate::array::{LabeledArray, LabeledSeries};
use crate::errors::{ClimateStatsError, Result};
use crate::params::{Period, ResampleFrequency};
use crate::season::{map_season, SeasonFilter, SeasonLabel};
use crate::statistics::operations::{AggregationFunction, NanPolicy};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

/// Last calendar day of `month` in `year`, leap years included.
#[must_use]
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        year.checked_add(1).map(|y| (y, 1))
    } else {
        Some((year, month + 1))
    };
    next.and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

/// Absolute first and last day of the season labelled with `year`.
///
/// # Errors
///
/// Returns [`ClimateStatsError::InvalidTime`] if the dates fall outside the
/// representable calendar.
pub fn season_bounds(year: i32, season: SeasonFilter) -> Result<(NaiveDate, NaiveDate)> {
    let start_year = if season.wraps() {
        year.checked_sub(1)
    } else {
        Some(year)
    };
    let start = start_year.and_then(|y| NaiveDate::from_ymd_opt(y, season.start_month(), 1));
    let end = NaiveDate::from_ymd_opt(
        year,
        season.end_month(),
        last_day_of_month(year, season.end_month()),
    );
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ClimateStatsError::InvalidTime {
            reason: format!("season {season} out of calendar range for year {year}"),
        }),
    }
}

/// Bucket layout for [`resample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucketing {
    Daily,
    Monthly,
    Quarterly,
    /// Year-long buckets starting on the first day of `anchor_month`.
    Yearly { anchor_month: u32 },
}

impl Bucketing {
    /// Start of the bucket holding `date`.
    fn bucket_start(self, date: NaiveDate) -> Option<NaiveDate> {
        let (year, month) = (date.year(), date.month());
        match self {
            Self::Daily => Some(date),
            Self::Monthly => NaiveDate::from_ymd_opt(year, month, 1),
            Self::Quarterly => NaiveDate::from_ymd_opt(year, (month - 1) / 3 * 3 + 1, 1),
            Self::Yearly { anchor_month } => {
                let anchor_year = if month >= anchor_month { year } else { year - 1 };
                NaiveDate::from_ymd_opt(anchor_year, anchor_month, 1)
            }
        }
    }

    /// Start of the bucket following the one starting at `start`.
    fn next_start(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Daily => start.succ_opt(),
            Self::Monthly => start.checked_add_months(chrono::Months::new(1)),
            Self::Quarterly => start.checked_add_months(chrono::Months::new(3)),
            Self::Yearly { .. } => start.checked_add_months(chrono::Months::new(12)),
        }
    }
}

impl From<ResampleFrequency> for Bucketing {
    fn from(freq: ResampleFrequency) -> Self {
        match freq {
            ResampleFrequency::Daily => Self::Daily,
            ResampleFrequency::MonthStart => Self::Monthly,
            ResampleFrequency::QuarterStart => Self::Quarterly,
            ResampleFrequency::YearStart => Self::Yearly { anchor_month: 1 },
        }
    }
}

/// Reduce `series` into calendar buckets labelled by their start date.
///
/// Every bucket between the first and the last observation is emitted; a
/// bucket without observations is NaN.
#[must_use]
pub fn resample(
    series: &LabeledSeries,
    bucketing: Bucketing,
    aggregation: AggregationFunction,
    policy: NanPolicy,
) -> LabeledSeries {
    let (Some(first), Some(last)) = (series.dates().first(), series.dates().last()) else {
        return LabeledSeries::default();
    };
    let (Some(mut start), Some(last_start)) =
        (bucketing.bucket_start(*first), bucketing.bucket_start(*last))
    else {
        return LabeledSeries::default();
    };

    let dates = series.dates();
    let values = series.values();
    let mut out_dates = Vec::new();
    let mut out_values = Vec::new();
    let mut cursor = 0;

    while start <= last_start {
        let next = bucketing.next_start(start);
        let from = cursor;
        while cursor < dates.len() && next.map_or(true, |n| dates[cursor] < n) {
            cursor += 1;
        }
        out_dates.push(start);
        out_values.push(aggregation.reduce(&values[from..cursor], policy));
        match next {
            Some(n) => start = n,
            None => break,
        }
    }

    LabeledSeries::from_ordered(out_dates, out_values)
}

/// Pre-resample a raw series to a request frequency.
///
/// Missing values are skipped inside each bucket.
#[must_use]
pub fn resample_frequency(
    series: &LabeledSeries,
    freq: ResampleFrequency,
    aggregation: AggregationFunction,
) -> LabeledSeries {
    debug!(freq = freq.code(), agg = %aggregation, "Resampling series");
    resample(series, freq.into(), aggregation, NanPolicy::Skip)
}

/// Period, season and per-season reducer applied to a raw series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalFilter {
    period: Period,
    season: SeasonFilter,
    aggregation: AggregationFunction,
}

impl TemporalFilter {
    #[must_use]
    pub const fn new(period: Period, season: SeasonFilter, aggregation: AggregationFunction) -> Self {
        Self {
            period,
            season,
            aggregation,
        }
    }

    /// Filter used for selection only; aggregation defaults to mean.
    #[must_use]
    pub fn selection(period: Period, season: SeasonFilter) -> Self {
        Self::new(period, season, AggregationFunction::default())
    }

    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }

    #[must_use]
    pub const fn season(&self) -> SeasonFilter {
        self.season
    }

    /// The days of `series` inside the season of every year of the period.
    ///
    /// # Errors
    ///
    /// Returns an error if a season window cannot be represented as dates.
    pub fn select(&self, series: &LabeledSeries) -> Result<LabeledSeries> {
        let Some((start_year, end_year)) = self.period.resolve(series.dates()) else {
            return Ok(LabeledSeries::default());
        };

        let mut dates = Vec::new();
        let mut values = Vec::new();
        for year in start_year..=end_year {
            let (from, to) = season_bounds(year, self.season)?;
            let slice = series.slice_dates(from, to);
            dates.extend_from_slice(slice.dates());
            values.extend_from_slice(slice.values());
        }
        debug!(
            period = %self.period,
            season = %self.season,
            kept = dates.len(),
            total = series.len(),
            "Selected season days"
        );
        Ok(LabeledSeries::from_ordered(dates, values))
    }

    /// One value per season, labelled with January 1st of its season year.
    ///
    /// Buckets start on the first day of the season's start month; missing
    /// values propagate into the bucket result.
    #[must_use]
    pub fn aggregate(&self, selected: &LabeledSeries) -> LabeledSeries {
        let anchored = resample(
            selected,
            Bucketing::Yearly {
                anchor_month: self.season.start_month(),
            },
            self.aggregation,
            NanPolicy::Propagate,
        );
        let shift = i32::from(self.season.wraps());

        let (dates, values): (Vec<_>, Vec<_>) = anchored
            .iter()
            .filter_map(|(date, value)| {
                NaiveDate::from_ymd_opt(date.year() + shift, 1, 1).map(|d| (d, value))
            })
            .unzip();
        LabeledSeries::from_ordered(dates, values)
    }

    /// [`select`](Self::select) followed by [`aggregate`](Self::aggregate).
    ///
    /// # Errors
    ///
    /// Returns an error if selection fails.
    pub fn compute(&self, series: &LabeledSeries) -> Result<(LabeledSeries, LabeledSeries)> {
        let selected = self.select(series)?;
        let yearly = self.aggregate(&selected);
        Ok((selected, yearly))
    }
}

/// Years of `series` inside `period`; `All` returns a copy.
#[must_use]
pub fn filter_by_period(series: &LabeledSeries, period: Period) -> LabeledSeries {
    match period {
        Period::All => series.clone(),
        Period::Years { start, end } => series.slice_years(start, end),
    }
}

/// What to do when a season filter has no precomputed column in the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFallback {
    /// Use [`SeasonLabel::Annual`] and record the fallback.
    Annual,
    /// Fail with [`ClimateStatsError::FilterUnavailableForIndex`].
    Unavailable,
}

/// A season column taken from a derived-index array.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSelection {
    pub label: SeasonLabel,
    /// Non-missing values of the column.
    pub series: LabeledSeries,
}

/// Pick the season column of a derived index for one region and drop
/// missing rows, which removes the off-season timestamps.
///
/// # Errors
///
/// Returns [`ClimateStatsError::FilterUnavailableForIndex`] when the season
/// has no column and `fallback` is [`LabelFallback::Unavailable`] (or the
/// array lacks even `Annual`), or [`ClimateStatsError::CategoricalUnsupported`] for numeric arrays.
pub fn select_season_label(
    array: &LabeledArray,
    region: usize,
    season: SeasonFilter,
    fallback: LabelFallback,
) -> Result<CategoricalSelection> {
    if !array.is_categorical() {
        return Err(ClimateStatsError::CategoricalUnsupported {
            operation: "season label selection on raw data".to_string(),
        });
    }
    let unavailable = || ClimateStatsError::FilterUnavailableForIndex {
        season: season.code(),
        variable: array.base_variable().to_string(),
    };

    let stored = array.season_labels().unwrap_or_default();
    let label = match (map_season(season), fallback) {
        (Some(label), _) if stored.contains(&label) => label,
        (_, LabelFallback::Annual) => {
            warn!(
                season = %season,
                variable = array.name(),
                "Season not found in precomputed labels, falling back to Annual"
            );
            SeasonLabel::Annual
        }
        (_, LabelFallback::Unavailable) => return Err(unavailable()),
    };

    let column = array.label_series(region, label).ok_or_else(unavailable)?;
    Ok(CategoricalSelection {
        label,
        series: column.drop_nan(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(from: NaiveDate, to: NaiveDate, value: impl Fn(NaiveDate) -> f64) -> LabeledSeries {
        let dates: Vec<NaiveDate> = from.iter_days().take_while(|d| *d <= to).collect();
        let values = dates.iter().map(|d| value(*d)).collect();
        LabeledSeries::new(dates, values).unwrap()
    }

    #[test]
    fn month_lengths() {
        assert_eq!(last_day_of_month(2000, 2), 29);
        assert_eq!(last_day_of_month(1900, 2), 28);
        assert_eq!(last_day_of_month(2023, 12), 31);
        assert_eq!(last_day_of_month(2023, 4), 30);
    }

    #[test]
    fn wrapping_bounds_start_in_previous_year() {
        let djf = SeasonFilter::new(12, 2).unwrap();
        assert_eq!(season_bounds(2001, djf).unwrap(), (day(2000, 12, 1), day(2001, 2, 28)));
        assert_eq!(season_bounds(2004, djf).unwrap(), (day(2003, 12, 1), day(2004, 2, 29)));
        let mam = SeasonFilter::new(3, 5).unwrap();
        assert_eq!(season_bounds(2001, mam).unwrap(), (day(2001, 3, 1), day(2001, 5, 31)));
    }

    #[test]
    fn select_keeps_only_season_days() {
        let series = daily(day(2000, 1, 1), day(2001, 12, 31), |_| 1.0);
        let filter = TemporalFilter::selection(Period::years(2001, 2001).unwrap(), "01-03".parse().unwrap());
        let selected = filter.select(&series).unwrap();
        assert_eq!(selected.len(), 90);
        assert!(selected
            .dates()
            .iter()
            .all(|d| d.year() == 2001 && (1..=3).contains(&d.month())));
    }

    #[test]
    fn select_wrapping_season() {
        let series = daily(day(2000, 1, 1), day(2001, 12, 31), |_| 1.0);
        let filter = TemporalFilter::selection(Period::years(2001, 2001).unwrap(), "12-02".parse().unwrap());
        let selected = filter.select(&series).unwrap();
        assert_eq!(selected.len(), 90);
        assert_eq!(selected.dates().first(), Some(&day(2000, 12, 1)));
        assert_eq!(selected.dates().last(), Some(&day(2001, 2, 28)));
    }

    #[test]
    fn yearly_sum_over_full_years() {
        let series = daily(day(2000, 1, 1), day(2002, 12, 31), |_| 1.0);
        let filter = TemporalFilter::new(Period::All, SeasonFilter::annual(), AggregationFunction::Sum);
        let (_, yearly) = filter.compute(&series).unwrap();
        assert_eq!(yearly.values(), &[366.0, 365.0, 365.0]);
        assert_eq!(yearly.dates(), &[day(2000, 1, 1), day(2001, 1, 1), day(2002, 1, 1)]);
    }

    #[test]
    fn wrapping_season_is_labelled_with_its_end_year() {
        // Each DJF day carries the year of the following January.
        let series = daily(day(2000, 12, 1), day(2002, 2, 28), |d| {
            f64::from(if d.month() == 12 { d.year() + 1 } else { d.year() })
        });
        let filter = TemporalFilter::new(
            Period::years(2001, 2002).unwrap(),
            "12-02".parse().unwrap(),
            AggregationFunction::Mean,
        );
        let (_, yearly) = filter.compute(&series).unwrap();
        assert_eq!(yearly.dates(), &[day(2001, 1, 1), day(2002, 1, 1)]);
        assert_relative_eq!(yearly.values()[0], 2001.0);
        assert_relative_eq!(yearly.values()[1], 2002.0);
    }

    #[test]
    fn missing_values_propagate_into_buckets() {
        let series = daily(day(2000, 1, 1), day(2001, 12, 31), |d| {
            if d == day(2000, 6, 1) {
                f64::NAN
            } else {
                2.0
            }
        });
        let filter = TemporalFilter::new(Period::All, SeasonFilter::annual(), AggregationFunction::Max);
        let (_, yearly) = filter.compute(&series).unwrap();
        assert!(yearly.values()[0].is_nan());
        assert_relative_eq!(yearly.values()[1], 2.0);
    }

    #[test]
    fn resample_emits_empty_buckets() {
        let series = LabeledSeries::new(
            vec![day(2000, 1, 10), day(2000, 1, 20), day(2000, 3, 5)],
            vec![1.0, 3.0, 5.0],
        )
        .unwrap();
        let monthly = resample_frequency(&series, ResampleFrequency::MonthStart, AggregationFunction::Mean);
        assert_eq!(monthly.dates(), &[day(2000, 1, 1), day(2000, 2, 1), day(2000, 3, 1)]);
        assert_relative_eq!(monthly.values()[0], 2.0);
        assert!(monthly.values()[1].is_nan());

        let quarterly = resample_frequency(&series, ResampleFrequency::QuarterStart, AggregationFunction::Sum);
        assert_eq!(quarterly.dates(), &[day(2000, 1, 1)]);
        assert_relative_eq!(quarterly.values()[0], 9.0);
    }

    #[test]
    fn season_bounds_at_calendar_edge_is_an_error() {
        assert_eq!(last_day_of_month(i32::MAX, 12), 31);
        assert!(matches!(
            season_bounds(i32::MAX, SeasonFilter::annual()),
            Err(ClimateStatsError::InvalidTime { .. })
        ));
        assert!(matches!(
            season_bounds(i32::MIN, "12-02".parse().unwrap()),
            Err(ClimateStatsError::InvalidTime { .. })
        ));
    }

    fn winter_index() -> LabeledArray {
        let time = vec![day(2000, 1, 1), day(2001, 1, 1)];
        let values = ndarray::Array3::from_shape_vec((2, 1, 1), vec![12.0, 14.0]).unwrap();
        LabeledArray::categorical("fd_None", time, vec![SeasonLabel::Annual], vec!["ES".to_string()], values)
            .unwrap()
    }

    #[test]
    fn season_without_stored_column_falls_back_to_annual() {
        let array = winter_index();
        let djf: SeasonFilter = "12-02".parse().unwrap();

        let selection = select_season_label(&array, 0, djf, LabelFallback::Annual).unwrap();
        assert_eq!(selection.label, SeasonLabel::Annual);
        assert_eq!(selection.series.values(), &[12.0, 14.0]);

        let unlisted = select_season_label(&array, 0, "04-09".parse().unwrap(), LabelFallback::Annual).unwrap();
        assert_eq!(unlisted.label, SeasonLabel::Annual);

        let err = select_season_label(&array, 0, djf, LabelFallback::Unavailable).unwrap_err();
        assert_eq!(err.to_string(), "Filter 12-02 not available for index fd");
    }

    #[test]
    fn period_filter_all_is_identity() {
        let series = daily(day(2000, 1, 1), day(2000, 1, 10), |d| f64::from(d.day()));
        assert_eq!(filter_by_period(&series, Period::All), series);
        assert!(filter_by_period(&series, Period::years(1990, 1995).unwrap()).is_empty());
    }
}
