//! Climatological average per region

use super::operations::StatisticalReduction;
use super::{require_variable, single_input, to_output, YearlyRecipe};
use crate::array::{align_series, LabeledArray};
use crate::errors::{ClimateStatsError, Result};
use crate::params::ClimatologyMapParams;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Region names and their climatological values, in the same order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimatologyMap {
    pub region: Vec<String>,
    pub data: Vec<Option<f64>>,
}

/// Average the yearly series of each requested region over the period,
/// optionally as an anomaly against the reference period.
///
/// Regions are reported in the order they were requested.
///
/// # Errors
///
/// Returns an error for more than one input array, unknown regions or
/// variables, or an anomaly request without a reference period.
#[instrument(skip_all, fields(variable = %params.variable, regions = %params.region_name))]
pub fn get_climatology_map(
    arrays: &[LabeledArray],
    params: &ClimatologyMapParams,
) -> Result<ClimatologyMap> {
    info!("Calculating climatology map");
    let array = single_input(arrays, "climatology map")?;
    require_variable(array, &params.variable)?;

    let reference = match (params.anomaly, params.reference_period) {
        (false, _) => None,
        (true, Some(reference)) => {
            info!(reference = %reference, "Calculating anomaly");
            Some(reference)
        }
        (true, None) => {
            return Err(ClimateStatsError::MissingReferencePeriod {
                operation: "climatology map".to_string(),
            })
        }
    };

    let mut array = array.clone().ensure_float();
    array.transform_units();

    let regions = params.regions();
    debug!(count = regions.len(), "Selecting regions");
    let recipe = YearlyRecipe {
        resample_freq: params.resample_freq,
        resample_func: params.resample_func,
        season: params.season_filter,
        season_func: params.season_filter_func,
    };

    let yearly = regions
        .iter()
        .map(|region| {
            let idx = array.region_index(region)?;
            let source = recipe.source(&array, idx)?;
            recipe.yearly_with_anomaly(&source, params.period, reference)
        })
        .collect::<Result<Vec<_>>>()?;

    let (dates, matrix) = align_series(&yearly);
    debug!(points = dates.len(), "Final data points after filtering");
    let means = matrix.nan_mean_axis(0)?;

    info!(regions = regions.len(), "Climatology map calculation complete");
    Ok(ClimatologyMap {
        region: regions,
        data: to_output(&means.to_vec()),
    })
}
