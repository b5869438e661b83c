//! Runtime configuration assembled from command-line arguments and the
//! environment.

use crate::errors::{ClimateStatsError, Result};
use crate::parallel::ParallelConfig;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the dataset directory.
pub const DATA_DIR_ENV: &str = "CLIMATE_DATA_DIR";

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the `{variable}_{level}_{dataset}_{region_set}.nc` files.
    pub data_dir: PathBuf,
    /// Worker count for the summary pool; all cores when unset.
    pub threads: Option<usize>,
    /// `-v` count.
    pub verbosity: u8,
}

impl AppConfig {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            threads: None,
            verbosity: 0,
        }
    }

    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn parallel(&self) -> ParallelConfig {
        ParallelConfig::new(self.threads)
    }

    /// Check that the data directory exists and the thread count is usable.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !self.data_dir.is_dir() {
            return Err(ClimateStatsError::Generic(format!(
                "Data directory '{}' does not exist (set --data-dir or {DATA_DIR_ENV})",
                self.data_dir.display()
            )));
        }
        if self.threads == Some(0) {
            return Err(ClimateStatsError::Generic(
                "Thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a JSON request document into its typed parameters.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a field is malformed.
pub fn read_params<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
