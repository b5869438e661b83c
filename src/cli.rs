//! Defines the `climstats` command line and dispatches each command to its
//! statistic.

use crate::config::{read_params, AppConfig, DATA_DIR_ENV};
use crate::data_source::{DatasetCatalog, DatasetKey, DatasetLoader};
use crate::errors::Result;
use crate::netcdf_io::NetCdfLoader;
use crate::params::{
    AnnualCycleParams, ClimatologyMapParams, ExtremeValuesParams, HistogramsParams,
    SummaryStatsParams, TimeSeriesParams,
};
use crate::statistics::{
    get_annual_cycle, get_climatology_map, get_extreme_values, get_histograms, get_summary_stats,
    get_time_series,
};
use crate::array::LabeledArray;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Temporal statistics for regional climate time series.
#[derive(Parser, Debug)]
#[command(
    name = "climstats",
    version,
    about = "Seasonal, anomaly, annual-cycle, extreme and summary statistics over regional climate datasets"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding `{variable}_{level}_{dataset}_{region_set}.nc` files.
    #[arg(long, global = true, env = DATA_DIR_ENV, default_value = ".")]
    pub data_dir: PathBuf,

    /// Number of threads for the summary statistics. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    #[must_use]
    pub fn config(&self) -> AppConfig {
        AppConfig::new(&self.data_dir)
            .with_threads(self.threads)
            .with_verbosity(self.verbose)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the datasets found in the data directory.
    Catalog(OutputArgs),
    /// Yearly series of one or more variables for one region.
    TimeSeries(RequestArgs),
    /// Climatological average of one variable per region.
    ClimatologyMap(RequestArgs),
    /// Day-of-year cycle of a period against reference bands.
    AnnualCycle(RequestArgs),
    /// Five highest and lowest seasonal values.
    ExtremeValues(RequestArgs),
    /// Value distribution of a period against a reference period.
    Histograms(RequestArgs),
    /// Per-variable summary of every available variable for one region.
    SummaryStats(RequestArgs),
}

impl Command {
    /// Where the result goes; stdout when unset.
    #[must_use]
    pub fn output(&self) -> Option<&Path> {
        match self {
            Self::Catalog(args) => args.output.as_deref(),
            Self::TimeSeries(args)
            | Self::ClimatologyMap(args)
            | Self::AnnualCycle(args)
            | Self::ExtremeValues(args)
            | Self::Histograms(args)
            | Self::SummaryStats(args) => args.output.as_deref(),
        }
    }
}

/// Arguments for the `catalog` subcommand.
#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments shared by the statistic subcommands.
#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// JSON request document.
    #[arg(short, long)]
    pub params: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

async fn load(
    catalog: &Arc<DatasetCatalog>,
    variables: Option<&str>,
    dataset: &str,
    region_set: &str,
) -> Result<Vec<LabeledArray>> {
    let keys = catalog.resolve(variables, dataset, region_set)?;
    info!(count = keys.len(), "Loading datasets");
    NetCdfLoader::new(Arc::clone(catalog)).load_many(&keys).await
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Run `command` against the datasets of `config` and render the result
/// as pretty JSON.
///
/// # Errors
///
/// Returns the first failure of request parsing, loading or computing.
pub async fn execute(command: &Command, config: &AppConfig) -> Result<String> {
    let catalog = Arc::new(DatasetCatalog::scan(&config.data_dir)?);

    match command {
        Command::Catalog(_) => to_json(&catalog.keys().collect::<Vec<&DatasetKey>>()),
        Command::TimeSeries(args) => {
            let params: TimeSeriesParams = read_params(&args.params)?;
            let arrays = load(
                &catalog,
                Some(&params.variable),
                &params.dataset,
                &params.region_set,
            )
            .await?;
            to_json(&get_time_series(&arrays, &params)?)
        }
        Command::ClimatologyMap(args) => {
            let params: ClimatologyMapParams = read_params(&args.params)?;
            let arrays = load(
                &catalog,
                Some(&params.variable),
                &params.dataset,
                &params.region_set,
            )
            .await?;
            to_json(&get_climatology_map(&arrays, &params)?)
        }
        Command::AnnualCycle(args) => {
            let params: AnnualCycleParams = read_params(&args.params)?;
            let arrays = load(
                &catalog,
                Some(&params.variable),
                &params.dataset,
                &params.region_set,
            )
            .await?;
            to_json(&get_annual_cycle(&arrays, &params)?)
        }
        Command::ExtremeValues(args) => {
            let params: ExtremeValuesParams = read_params(&args.params)?;
            let arrays = load(
                &catalog,
                Some(&params.variable),
                &params.dataset,
                &params.region_set,
            )
            .await?;
            to_json(&get_extreme_values(&arrays, &params)?)
        }
        Command::Histograms(args) => {
            let params: HistogramsParams = read_params(&args.params)?;
            let arrays = load(
                &catalog,
                Some(&params.variable),
                &params.dataset,
                &params.region_set,
            )
            .await?;
            to_json(&get_histograms(&arrays, &params)?)
        }
        Command::SummaryStats(args) => {
            let params: SummaryStatsParams = read_params(&args.params)?;
            let arrays = load(&catalog, None, &params.dataset, &params.region_set).await?;
            to_json(&get_summary_stats(&arrays, &params, &config.parallel())?)
        }
    }
}
