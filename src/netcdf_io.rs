//! NetCDF storage of labeled arrays
//!
//! One file holds one variable. The layout is:
//!
//! - a `time` variable with CF units `"<unit> since YYYY-MM-DD"`,
//! - a root attribute `regions` listing region names separated by `;`,
//! - for derived indices, a root attribute `season_labels` (same format),
//! - the data variable named after the variable (`tas`, `fd`, ...) with
//!   dimensions `(time, region)` or `(time, season, region)`.
//!
//! [`NetCdfLoader`] reads this layout behind the [`DatasetLoader`] trait and
//! [`NetCDFWriter`] produces it.

use crate::array::{ArrayValues, DurationUnit, LabeledArray, ValueKind, DATE_FORMAT};
use crate::data_source::{DatasetCatalog, DatasetKey, DatasetLoader};
use crate::errors::{ClimateStatsError, Result};
use crate::season::SeasonLabel;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};
use ndarray::{Array1, Array2, Array3};
use netcdf::{create, AttributeValue, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, fmt};
use tracing::{debug, info, instrument};

const TIME_VAR: &str = "time";
const REGIONS_ATTR: &str = "regions";
const SEASON_LABELS_ATTR: &str = "season_labels";
const FILL_VALUE: f64 = -9999.0;
const LIST_SEPARATOR: char = ';';

/// Unit of a CF time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeStep {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeStep {
    const fn seconds(self) -> f64 {
        match self {
            Self::Days => 86_400.0,
            Self::Hours => 3_600.0,
            Self::Minutes => 60.0,
            Self::Seconds => 1.0,
        }
    }
}

/// Parsed `"<unit> since YYYY-MM-DD[ HH:MM:SS]"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    step: TimeStep,
    base: NaiveDate,
}

impl TimeUnits {
    /// Parse CF time units. Only the date part of the reference is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::InvalidTime`] for anything else.
    pub fn parse(units: &str) -> Result<Self> {
        let parts: Vec<&str> = units.trim().splitn(3, ' ').collect();
        if parts.len() < 3 || parts[1] != "since" {
            return Err(ClimateStatsError::InvalidTime {
                reason: format!("unexpected time units format: '{units}'"),
            });
        }
        let step = match parts[0].to_ascii_lowercase().as_str() {
            "days" | "day" => TimeStep::Days,
            "hours" | "hour" => TimeStep::Hours,
            "minutes" | "minute" => TimeStep::Minutes,
            "seconds" | "second" => TimeStep::Seconds,
            other => {
                return Err(ClimateStatsError::InvalidTime {
                    reason: format!("unsupported time step '{other}'"),
                })
            }
        };

        let date_str = parts[2].trim().get(..10).unwrap_or(parts[2].trim());
        let base = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
            ClimateStatsError::InvalidTime {
                reason: format!("failed to parse base date '{date_str}': {e}"),
            }
        })?;
        Ok(Self { step, base })
    }

    /// Calendar dates of `offsets`; sub-day parts are truncated.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::InvalidTime`] for non-finite offsets or
    /// dates out of range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_dates(&self, offsets: &[f64]) -> Result<Vec<NaiveDate>> {
        offsets
            .iter()
            .map(|&offset| {
                let seconds = offset * self.step.seconds();
                if !seconds.is_finite() {
                    return Err(ClimateStatsError::InvalidTime {
                        reason: format!("non-finite time offset {offset}"),
                    });
                }
                TimeDelta::try_seconds(seconds.floor() as i64)
                    .and_then(|delta| self.base.checked_add_signed(delta))
                    .ok_or_else(|| ClimateStatsError::InvalidTime {
                        reason: format!("date overflow adding {offset} to '{self}'"),
                    })
            })
            .collect()
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self.step {
            TimeStep::Days => "days",
            TimeStep::Hours => "hours",
            TimeStep::Minutes => "minutes",
            TimeStep::Seconds => "seconds",
        };
        write!(f, "{step} since {}", self.base.format(DATE_FORMAT))
    }
}

fn string_attribute(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(parts) => Some(parts.join(&LIST_SEPARATOR.to_string())),
        _ => None,
    }
}

fn numeric_attribute(value: AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        _ => None,
    }
}

fn root_list(file: &File, name: &str) -> Result<Option<Vec<String>>> {
    let Some(attr) = file.attribute(name) else {
        return Ok(None);
    };
    let raw = string_attribute(attr.value()?).ok_or_else(|| {
        ClimateStatsError::Generic(format!("Attribute '{name}' is not a string"))
    })?;
    Ok(Some(
        raw.split(LIST_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

/// Read the array stored for `key` at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or does not follow the
/// single-variable layout.
#[instrument(skip(key), fields(key = %key))]
pub fn read_labeled_array(path: &Path, key: &DatasetKey) -> Result<LabeledArray> {
    if !path.exists() {
        return Err(ClimateStatsError::DatasetNotFound {
            key: key.to_string(),
        });
    }
    let file = netcdf::open(path)?;

    let time_var = file
        .variable(TIME_VAR)
        .ok_or_else(|| ClimateStatsError::VariableNotFound {
            var: TIME_VAR.to_string(),
        })?;
    let units = time_var
        .attribute("units")
        .map(|a| a.value())
        .transpose()?
        .and_then(string_attribute)
        .ok_or_else(|| ClimateStatsError::InvalidTime {
            reason: "time variable has no string 'units' attribute".to_string(),
        })?;
    let time = TimeUnits::parse(&units)?.to_dates(&time_var.get_values::<f64, _>(..)?)?;

    let regions = root_list(&file, REGIONS_ATTR)?.ok_or_else(|| {
        ClimateStatsError::Generic(format!("Missing root attribute '{REGIONS_ATTR}'"))
    })?;
    let labels = root_list(&file, SEASON_LABELS_ATTR)?
        .map(|labels| {
            labels
                .iter()
                .map(|l| l.parse::<SeasonLabel>())
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    let array_name = key.array_name();
    let var = file
        .variable(&key.variable)
        .or_else(|| file.variable(&array_name))
        .ok_or_else(|| ClimateStatsError::VariableNotFound {
            var: key.variable.clone(),
        })?;

    let fill = var
        .attribute("_FillValue")
        .and_then(|a| a.value().ok())
        .and_then(numeric_attribute);
    let mut data = var.get_values::<f64, _>(..)?;
    if let Some(fill) = fill {
        for v in data.iter_mut().filter(|v| **v == fill) {
            *v = f64::NAN;
        }
    }
    debug!(
        values = data.len(),
        times = time.len(),
        regions = regions.len(),
        "Read data variable"
    );

    let array = match labels {
        Some(labels) => {
            let shape = (time.len(), labels.len(), regions.len());
            LabeledArray::categorical(
                array_name,
                time,
                labels,
                regions,
                Array3::from_shape_vec(shape, data)?,
            )?
        }
        None => {
            let shape = (time.len(), regions.len());
            LabeledArray::numeric(array_name, time, regions, Array2::from_shape_vec(shape, data)?)?
        }
    };

    let data_units = var
        .attribute("units")
        .and_then(|a| a.value().ok())
        .and_then(string_attribute);
    let mut array = match data_units {
        Some(units) => match DurationUnit::from_units(&units) {
            Some(unit) => array.with_kind(ValueKind::Duration(unit)),
            None => array.with_units(units),
        },
        None => array,
    };
    array.transform_units();
    Ok(array)
}

/// Loader over the NetCDF files of a [`DatasetCatalog`].
#[derive(Debug, Clone)]
pub struct NetCdfLoader {
    catalog: Arc<DatasetCatalog>,
}

impl NetCdfLoader {
    #[must_use]
    pub fn new(catalog: Arc<DatasetCatalog>) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }
}

#[async_trait]
impl DatasetLoader for NetCdfLoader {
    async fn load(&self, key: &DatasetKey) -> Result<LabeledArray> {
        let path = self
            .catalog
            .path(key)
            .map(Path::to_path_buf)
            .ok_or_else(|| ClimateStatsError::DatasetNotFound {
                key: key.to_string(),
            })?;
        info!(key = %key, file = %path.display(), "Loading dataset");

        let key = key.clone();
        tokio::task::spawn_blocking(move || read_labeled_array(&path, &key))
            .await
            .map_err(|e| ClimateStatsError::Generic(format!("Dataset load task failed: {e}")))?
    }
}

/// Writes labeled arrays in the layout [`read_labeled_array`] expects.
///
/// Used to prepare dataset directories (and the crate's test fixtures);
/// statistic results are never written through it.
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write `array`, replacing any existing file.
    ///
    /// The stored variable takes the base name of the array (`tas` for
    /// `tas_None`); missing values are written as `_FillValue`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(&self, array: &LabeledArray) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        let mut file = create(self.output_path)?;

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .ok_or_else(|| ClimateStatsError::Generic("invalid epoch".to_string()))?;
        #[allow(clippy::cast_precision_loss)]
        let offsets: Array1<f64> = array
            .time()
            .iter()
            .map(|d| (*d - epoch).num_days() as f64)
            .collect();

        file.add_dimension(TIME_VAR, array.time().len())?;
        file.add_dimension("region", array.regions().len())?;
        file.add_attribute(REGIONS_ATTR, array.regions().join(";"))?;

        let dims: Vec<&str> = match array.values() {
            ArrayValues::Numeric(_) => vec![TIME_VAR, "region"],
            ArrayValues::Categorical { labels, .. } => {
                file.add_dimension("season", labels.len())?;
                let joined = labels
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(";");
                file.add_attribute(SEASON_LABELS_ATTR, joined)?;
                vec![TIME_VAR, "season", "region"]
            }
        };

        {
            let mut time_var = file.add_variable::<f64>(TIME_VAR, &[TIME_VAR])?;
            time_var.put_attribute("units", "days since 1970-01-01")?;
            time_var.put_attribute("calendar", "standard")?;
            time_var.put(offsets.view(), ..)?;
        }

        {
            let mut data_var = file.add_variable::<f64>(array.base_variable(), &dims)?;
            data_var.put_attribute("_FillValue", FILL_VALUE)?;
            let units = match (array.kind(), array.units()) {
                (ValueKind::Duration(unit), _) => Some(unit.as_str()),
                (ValueKind::Float, units) => units,
            };
            if let Some(units) = units {
                data_var.put_attribute("units", units)?;
            }
            let fill = |v: f64| if v.is_nan() { FILL_VALUE } else { v };
            match array.values() {
                ArrayValues::Numeric(values) => data_var.put(values.mapv(fill).view(), ..)?,
                ArrayValues::Categorical { values, .. } => {
                    data_var.put(values.mapv(fill).view(), ..)?;
                }
            }
        }

        file.add_attribute(
            "history",
            format!("Created by climstats on {}", Utc::now().to_rfc3339()),
        )?;
        info!(
            variable = %array.name(),
            file = %self.output_path.display(),
            "Wrote dataset"
        );
        Ok(())
    }
}

/// Write `array` into `dir` under the file name of `key`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_dataset(dir: &Path, key: &DatasetKey, array: &LabeledArray) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", key.file_stem(), crate::data_source::DATASET_EXTENSION));
    NetCDFWriter::new(&path).write(array)?;
    Ok(path)
}
