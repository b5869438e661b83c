//! Dataset discovery and the loader abstraction
//!
//! Datasets are stored one variable per file and addressed by a
//! [`DatasetKey`] of `(variable, level, dataset, region set)`. The
//! [`DatasetCatalog`] maps keys to files; it is built once at start-up and
//! handed to a loader, so discovery never happens lazily inside a request.

use crate::array::LabeledArray;
use crate::errors::{ClimateStatsError, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Level used for variables without a vertical level.
pub const NO_LEVEL: &str = "None";

/// File extension of stored datasets.
pub const DATASET_EXTENSION: &str = "nc";

/// Base variables and derived indices, in the order a request without
/// explicit variables loads them.
pub const ALL_AVAILABLE_VARIABLES: [&str; 14] = [
    "pr_None",
    "sfcWind_None",
    "tas_None",
    "tasmax_None",
    "tasmin_None",
    "fd_None",
    "r1mm_None",
    "r20mm_None",
    "r95ptot_None",
    "tr20_None",
    "tr25_None",
    "tx30_None",
    "tx35_None",
    "tx40_None",
];

/// Address of one stored variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DatasetKey {
    pub variable: String,
    pub level: String,
    pub dataset: String,
    pub region_set: String,
}

impl DatasetKey {
    #[must_use]
    pub fn new(
        variable: impl Into<String>,
        level: impl Into<String>,
        dataset: impl Into<String>,
        region_set: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            level: level.into(),
            dataset: dataset.into(),
            region_set: region_set.into(),
        }
    }

    /// Key for a requested variable name such as `tas_None` or `tas`.
    ///
    /// A name without a level suffix gets level `None`.
    #[must_use]
    pub fn from_variable(name: &str, dataset: &str, region_set: &str) -> Self {
        let (variable, level) = name.trim().rsplit_once('_').unwrap_or((name.trim(), NO_LEVEL));
        Self::new(variable, level, dataset, region_set)
    }

    /// Name of the loaded array, `{variable}_{level}`.
    #[must_use]
    pub fn array_name(&self) -> String {
        format!("{}_{}", self.variable, self.level)
    }

    /// File name without extension.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.variable, self.level, self.dataset, self.region_set
        )
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

impl FromStr for DatasetKey {
    type Err = ClimateStatsError;

    /// Parse a file stem of exactly four `_`-separated parts.
    fn from_str(s: &str) -> Result<Self> {
        match s.split('_').collect::<Vec<_>>().as_slice() {
            [variable, level, dataset, region_set] => {
                Ok(Self::new(*variable, *level, *dataset, *region_set))
            }
            _ => Err(ClimateStatsError::Generic(format!(
                "'{s}' is not a variable_level_dataset_regionset name"
            ))),
        }
    }
}

/// Index of the datasets found under one directory.
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    root: PathBuf,
    entries: BTreeMap<DatasetKey, PathBuf>,
}

impl DatasetCatalog {
    /// Scan `root` for `{variable}_{level}_{dataset}_{region_set}.nc` files.
    ///
    /// Files that do not follow the naming scheme are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        info!(dir = %root.display(), "Scanning directory for datasets");

        let mut entries = BTreeMap::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATASET_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<DatasetKey>() {
                Ok(key) => {
                    debug!(key = %key, "Found dataset");
                    entries.insert(key, path);
                }
                Err(_) => debug!(file = %path.display(), "Skipping unrecognised file"),
            }
        }

        info!(count = entries.len(), "Built dataset catalog");
        Ok(Self { root, entries })
    }

    /// Catalog over explicit entries.
    #[must_use]
    pub fn from_entries(root: PathBuf, entries: impl IntoIterator<Item = (DatasetKey, PathBuf)>) -> Self {
        Self {
            root,
            entries: entries.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path(&self, key: &DatasetKey) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DatasetKey> {
        self.entries.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys to load for a request.
    ///
    /// Named variables (`;`-separated) map directly to keys. Without names,
    /// the known variables present for the dataset and region set are used
    /// in [`ALL_AVAILABLE_VARIABLES`] order, or else everything present.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::DatasetNotFound`] when nothing is left to load.
    pub fn resolve(
        &self,
        variables: Option<&str>,
        dataset: &str,
        region_set: &str,
    ) -> Result<Vec<DatasetKey>> {
        let named: Vec<DatasetKey> = variables
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| DatasetKey::from_variable(v, dataset, region_set))
                    .collect()
            })
            .unwrap_or_default();
        if !named.is_empty() {
            return Ok(named);
        }

        let present: Vec<&DatasetKey> = self
            .entries
            .keys()
            .filter(|k| k.dataset == dataset && k.region_set == region_set)
            .collect();
        let known: Vec<DatasetKey> = ALL_AVAILABLE_VARIABLES
            .iter()
            .filter_map(|name| present.iter().find(|k| k.array_name() == *name))
            .map(|k| (*k).clone())
            .collect();
        let keys = if known.is_empty() {
            present.into_iter().cloned().collect()
        } else {
            known
        };

        if keys.is_empty() {
            return Err(ClimateStatsError::DatasetNotFound {
                key: format!("dataset={dataset}, region_set={region_set}"),
            });
        }
        Ok(keys)
    }
}

/// Loads labeled arrays for dataset keys.
#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Load one variable.
    async fn load(&self, key: &DatasetKey) -> Result<LabeledArray>;

    /// Load several variables concurrently, in key order.
    ///
    /// Keys without a dataset are skipped with a warning; any other failure
    /// aborts the whole load.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::DatasetNotFound`] if no key could be
    /// loaded, or the first load failure.
    async fn load_many(&self, keys: &[DatasetKey]) -> Result<Vec<LabeledArray>> {
        let loads = keys.iter().map(|key| async move {
            match self.load(key).await {
                Ok(array) => Ok(Some(array)),
                Err(ClimateStatsError::DatasetNotFound { .. }) => {
                    warn!(key = %key, "Dataset not found, skipping");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        });
        let arrays: Vec<LabeledArray> = try_join_all(loads).await?.into_iter().flatten().collect();

        if arrays.is_empty() {
            return Err(ClimateStatsError::DatasetNotFound {
                key: keys
                    .iter()
                    .map(DatasetKey::to_string)
                    .collect::<Vec<_>>()
                    .join(";"),
            });
        }
        Ok(arrays)
    }
}
