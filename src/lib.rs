//! climate_stats: calendar-aware temporal statistics for regional climate data
//!
//! Climate variables are stored per region along a daily, monthly or yearly
//! time axis. This library turns them into the statistics a climate portal
//! shows: yearly series, seasonal climatologies, anomalies against a
//! reference period, day-of-year annual cycles, extremes, histograms and a
//! per-variable summary.
//!
//! ## Key Features
//!
//! - **Season filters**: month ranges such as `06-08` or wrapping ones such as
//!   `12-02`, mapped onto the precomputed season labels of derived indices
//! - **Temporal aggregation**: resampling and season-anchored yearly reduction
//!   with mean, max, min, std, median and sum
//! - **Parallel summaries**: per-variable summary tasks on a bounded Rayon pool
//! - **NetCDF datasets**: one variable per file, loaded concurrently
//!
//! ## Module Organization
//!
//! - [`season`]: season filters and their precomputed labels
//! - [`params`]: periods and typed request parameters
//! - [`array`]: labeled arrays and single-region series
//! - [`temporal`]: season selection, resampling and yearly aggregation
//! - [`statistics`]: the statistic engines and their reducers
//! - [`data_source`] and [`netcdf_io`]: dataset discovery and loading
//! - [`parallel`]: worker pool configuration
//! - [`config`], [`logging`] and [`cli`]: the `climstats` front end
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use climate_stats::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let catalog = Arc::new(DatasetCatalog::scan("/data/climate")?);
//! let keys = catalog.resolve(Some("tas_None"), "ERA5", "NUTS-0")?;
//! let arrays = NetCdfLoader::new(Arc::clone(&catalog)).load_many(&keys).await?;
//!
//! let params: ExtremeValuesParams = serde_json::from_str(
//!     r#"{"dataset": "ERA5", "region_set": "NUTS-0", "region_name": "ES",
//!         "variable": "tas_None", "period": "1991-2020", "season_filter": "06-08"}"#,
//! )?;
//! let extremes = get_extreme_values(&arrays, &params)?;
//! println!("{}", serde_json::to_string_pretty(&extremes)?);
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod cli;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod logging;
pub mod netcdf_io;
pub mod parallel;
pub mod params;
pub mod season;
pub mod statistics;
pub mod temporal;

pub use errors::{ClimateStatsError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::array::{LabeledArray, LabeledSeries, ValueKind};
    pub use crate::data_source::{DatasetCatalog, DatasetKey, DatasetLoader};
    pub use crate::errors::{ClimateStatsError, Result};
    pub use crate::netcdf_io::{NetCDFWriter, NetCdfLoader};
    pub use crate::parallel::ParallelConfig;
    pub use crate::params::{
        AnnualCycleParams, ClimatologyMapParams, ExtremeValuesParams, HistogramsParams, Period,
        ResampleFrequency, SummaryStatsParams, TimeSeriesParams,
    };
    pub use crate::season::{SeasonFilter, SeasonLabel};
    pub use crate::statistics::{
        get_annual_cycle, get_climatology_map, get_extreme_values, get_histograms,
        get_summary_stats, get_time_series, AggregationFunction, StatisticalReduction,
    };
}
