//! Season filters and the fixed season-label table for derived indices
//!
//! A [`SeasonFilter`] is a month range (`"MM-MM"`) that may wrap the calendar
//! year boundary. Derived indices are stored with a categorical season-label
//! dimension instead of daily data, so a filter has to be translated into one
//! of the precomputed [`SeasonLabel`]s through [`map_season`].

use crate::errors::{ClimateStatsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive month range, both ends in 1..=12.
///
/// When `start_month > end_month` the season wraps the year boundary,
/// e.g. `12-02` covers December, January and February.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct SeasonFilter {
    start_month: u32,
    end_month: u32,
}

impl SeasonFilter {
    /// Build a filter from explicit months.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::InvalidSeasonFormat`] if either month is outside 1..=12.
    pub fn new(start_month: u32, end_month: u32) -> Result<Self> {
        if !(1..=12).contains(&start_month) || !(1..=12).contains(&end_month) {
            return Err(ClimateStatsError::InvalidSeasonFormat {
                value: format!("{start_month:02}-{end_month:02}"),
            });
        }
        Ok(Self {
            start_month,
            end_month,
        })
    }

    /// The whole calendar year, `01-12`.
    #[must_use]
    pub const fn annual() -> Self {
        Self {
            start_month: 1,
            end_month: 12,
        }
    }

    #[must_use]
    pub const fn start_month(self) -> u32 {
        self.start_month
    }

    #[must_use]
    pub const fn end_month(self) -> u32 {
        self.end_month
    }

    /// True when the season crosses from one calendar year into the next.
    #[must_use]
    pub const fn wraps(self) -> bool {
        self.start_month > self.end_month
    }

    /// Whether `month` (1..=12) falls inside the season.
    #[must_use]
    pub fn contains_month(self, month: u32) -> bool {
        if self.wraps() {
            month >= self.start_month || month <= self.end_month
        } else {
            (self.start_month..=self.end_month).contains(&month)
        }
    }

    /// The canonical `"MM-MM"` code.
    #[must_use]
    pub fn code(self) -> String {
        format!("{:02}-{:02}", self.start_month, self.end_month)
    }
}

impl Default for SeasonFilter {
    fn default() -> Self {
        Self::annual()
    }
}

impl fmt::Display for SeasonFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for SeasonFilter {
    type Err = ClimateStatsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ClimateStatsError::InvalidSeasonFormat {
            value: s.to_string(),
        };
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start_month = start.trim().parse::<u32>().map_err(|_| invalid())?;
        let end_month = end.trim().parse::<u32>().map_err(|_| invalid())?;
        Self::new(start_month, end_month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for SeasonFilter {
    type Error = ClimateStatsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Precomputed season label carried by derived-index arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeasonLabel {
    Annual,
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
    DecFeb,
    MarMay,
    JunAug,
    SepNov,
}

impl SeasonLabel {
    /// Every label, in storage order.
    pub const ALL: [SeasonLabel; 17] = [
        Self::Annual,
        Self::Jan,
        Self::Feb,
        Self::Mar,
        Self::Apr,
        Self::May,
        Self::Jun,
        Self::Jul,
        Self::Aug,
        Self::Sep,
        Self::Oct,
        Self::Nov,
        Self::Dec,
        Self::DecFeb,
        Self::MarMay,
        Self::JunAug,
        Self::SepNov,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Annual => "Annual",
            Self::Jan => "Jan",
            Self::Feb => "Feb",
            Self::Mar => "Mar",
            Self::Apr => "Apr",
            Self::May => "May",
            Self::Jun => "Jun",
            Self::Jul => "Jul",
            Self::Aug => "Aug",
            Self::Sep => "Sep",
            Self::Oct => "Oct",
            Self::Nov => "Nov",
            Self::Dec => "Dec",
            Self::DecFeb => "DecFeb",
            Self::MarMay => "MarMay",
            Self::JunAug => "JunAug",
            Self::SepNov => "SepNov",
        }
    }
}

impl fmt::Display for SeasonLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonLabel {
    type Err = ClimateStatsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s.trim())
            .ok_or_else(|| ClimateStatsError::Generic(format!("Unknown season label '{s}'")))
    }
}

/// Month ranges with a precomputed label.
const SEASON_TABLE: [((u32, u32), SeasonLabel); 17] = [
    ((1, 12), SeasonLabel::Annual),
    ((1, 1), SeasonLabel::Jan),
    ((2, 2), SeasonLabel::Feb),
    ((3, 3), SeasonLabel::Mar),
    ((4, 4), SeasonLabel::Apr),
    ((5, 5), SeasonLabel::May),
    ((6, 6), SeasonLabel::Jun),
    ((7, 7), SeasonLabel::Jul),
    ((8, 8), SeasonLabel::Aug),
    ((9, 9), SeasonLabel::Sep),
    ((10, 10), SeasonLabel::Oct),
    ((11, 11), SeasonLabel::Nov),
    ((12, 12), SeasonLabel::Dec),
    ((12, 2), SeasonLabel::DecFeb),
    ((3, 5), SeasonLabel::MarMay),
    ((6, 8), SeasonLabel::JunAug),
    ((9, 11), SeasonLabel::SepNov),
];

/// Translate a season filter into its precomputed label.
///
/// Returns `None` for month ranges without a label (e.g. `04-09`); callers
/// decide whether that means falling back to [`SeasonLabel::Annual`] or
/// reporting the filter as unavailable.
#[must_use]
pub fn map_season(filter: SeasonFilter) -> Option<SeasonLabel> {
    SEASON_TABLE
        .iter()
        .find(|((start, end), _)| *start == filter.start_month && *end == filter.end_month)
        .map(|(_, label)| *label)
}
