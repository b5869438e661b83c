//! Centralized error handling for climate_stats
//!
//! Every engine returns [`Result`], so request-level failures carry a typed
//! reason that the caller (CLI or service boundary) can report. Conditions
//! the engines recover from on their own (unknown season label, too few
//! points for a trend, an empty reference window) are not represented here:
//! they are logged and reflected in the returned values instead.

use std::fmt;

/// Main error type for climate_stats operations
#[derive(Debug)]
pub enum ClimateStatsError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// JSON (de)serialization errors for requests and results
    JsonError(serde_json::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Period string is neither `all` nor `start-end` with numeric years
    InvalidPeriodFormat { value: String },

    /// Season string is not `MM-MM` with months in 1..=12
    InvalidSeasonFormat { value: String },

    /// Aggregation name outside {mean, max, min, std, median, sum}
    UnknownAggregation { name: String },

    /// Resampling frequency code not recognised
    UnknownResampleFrequency { value: String },

    /// An operation that works on exactly one input array received several
    MultipleInputsUnsupported { operation: String, count: usize },

    /// A derived index does not provide the requested season
    FilterUnavailableForIndex { season: String, variable: String },

    /// None of the catalogued variables exist in the input arrays
    NoVariablesResolved { region: String },

    /// Variable not present in the loaded arrays
    VariableNotFound { var: String },

    /// Region not present on the region coordinate
    RegionNotFound { region: String },

    /// Operation cannot run on a season-labelled (derived index) array
    CategoricalUnsupported { operation: String },

    /// Anomaly requested without a reference period
    MissingReferencePeriod { operation: String },

    /// Filtering left nothing to compute on
    EmptySelection { what: String },

    /// Loader could not find a dataset for the given key
    DatasetNotFound { key: String },

    /// Time coordinate could not be decoded
    InvalidTime { reason: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error for anything else
    Generic(String),
}

impl fmt::Display for ClimateStatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetCDFError(e) => write!(f, "NetCDF error: {e}"),
            Self::IoError(e) => write!(f, "I/O error: {e}"),
            Self::JsonError(e) => write!(f, "JSON error: {e}"),
            Self::ArrayError(e) => write!(f, "Array error: {e}"),
            Self::InvalidPeriodFormat { value } => {
                write!(f, "Invalid period '{value}': expected 'all' or 'YYYY-YYYY'")
            }
            Self::InvalidSeasonFormat { value } => {
                write!(f, "Invalid season filter '{value}': expected 'MM-MM' with months 01..12")
            }
            Self::UnknownAggregation { name } => write!(
                f,
                "Unknown aggregation '{name}': expected one of mean, max, min, std, median, sum"
            ),
            Self::UnknownResampleFrequency { value } => {
                write!(f, "Unknown resample frequency '{value}': expected D, MS, QS or YS")
            }
            Self::MultipleInputsUnsupported { operation, count } => write!(
                f,
                "Multiple datasets not supported for {operation} (received {count})"
            ),
            Self::FilterUnavailableForIndex { season, variable } => {
                write!(f, "Filter {season} not available for index {variable}")
            }
            Self::NoVariablesResolved { region } => {
                write!(f, "No known variables found in the input arrays for region '{region}'")
            }
            Self::VariableNotFound { var } => write!(f, "Variable '{var}' not found in input"),
            Self::RegionNotFound { region } => write!(f, "Region '{region}' not found in input"),
            Self::CategoricalUnsupported { operation } => {
                write!(f, "{operation} is not possible for season-labelled indices")
            }
            Self::MissingReferencePeriod { operation } => {
                write!(f, "{operation} requested an anomaly but no reference period was given")
            }
            Self::EmptySelection { what } => write!(f, "No data left after filtering {what}"),
            Self::DatasetNotFound { key } => write!(f, "Dataset not found for '{key}'"),
            Self::InvalidTime { reason } => write!(f, "Invalid time coordinate: {reason}"),
            Self::ThreadPoolError(msg) => write!(f, "Thread pool error: {msg}"),
            Self::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ClimateStatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NetCDFError(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::JsonError(e) => Some(e),
            Self::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for ClimateStatsError {
    fn from(error: netcdf::Error) -> Self {
        Self::NetCDFError(error)
    }
}

impl From<std::io::Error> for ClimateStatsError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error)
    }
}

impl From<serde_json::Error> for ClimateStatsError {
    fn from(error: serde_json::Error) -> Self {
        Self::JsonError(error)
    }
}

impl From<ndarray::ShapeError> for ClimateStatsError {
    fn from(error: ndarray::ShapeError) -> Self {
        Self::ArrayError(error)
    }
}

impl From<String> for ClimateStatsError {
    fn from(error: String) -> Self {
        Self::Generic(error)
    }
}

impl From<&str> for ClimateStatsError {
    fn from(error: &str) -> Self {
        Self::Generic(error.to_string())
    }
}

/// Result type alias for climate_stats operations
pub type Result<T> = std::result::Result<T, ClimateStatsError>;
