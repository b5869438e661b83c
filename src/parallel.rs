//! Parallel processing configuration and management
//!
//! Engines never touch the global Rayon pool. Work that fans out (the
//! per-variable tasks of the summary statistics) runs on a pool built from a
//! [`ParallelConfig`], so its size is bounded by configuration.

use crate::errors::{ClimateStatsError, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

/// Configuration for parallel processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParallelConfig {
    /// Worker count; `None` uses every available core.
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    #[must_use]
    pub const fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses a specific number of threads
    #[must_use]
    pub const fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Create a configuration that uses all available CPU cores
    #[must_use]
    pub fn all_cores() -> Self {
        Self::with_threads(num_cpus::get())
    }

    /// Number of workers a pool built from this configuration will have.
    #[must_use]
    pub fn resolved_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Build a dedicated thread pool of [`resolved_threads`](Self::resolved_threads) workers.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateStatsError::ThreadPoolError`] if the pool cannot be created.
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let threads = self.resolved_threads();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("climstats-worker-{i}"))
            .build()
            .map_err(|e| {
                ClimateStatsError::ThreadPoolError(format!(
                    "Failed to initialize thread pool with {threads} threads: {e}"
                ))
            })?;
        debug!(threads, "Built worker pool");
        Ok(pool)
    }
}

/// Get information about the parallel processing environment
#[must_use]
pub fn get_parallel_info(config: &ParallelConfig) -> ParallelInfo {
    ParallelInfo {
        configured_threads: config.resolved_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelInfo {
    pub configured_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    /// Log parallel processing information
    pub fn log(&self) {
        info!(
            configured_threads = self.configured_threads,
            available_cores = self.available_cores,
            available_parallelism = self.available_parallelism,
            "Parallel processing configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_thread_count() {
        let config = ParallelConfig::with_threads(3);
        assert_eq!(config.resolved_threads(), 3);
        let pool = config.build_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn default_uses_all_cores() {
        let config = ParallelConfig::default();
        assert_eq!(config.resolved_threads(), num_cpus::get().max(1));
        assert_eq!(ParallelConfig::all_cores().resolved_threads(), num_cpus::get());
    }

    #[test]
    fn zero_threads_is_clamped() {
        assert_eq!(ParallelConfig::with_threads(0).resolved_threads(), 1);
    }

    #[test]
    fn info_reports_configuration() {
        let info = get_parallel_info(&ParallelConfig::with_threads(2));
        assert_eq!(info.configured_threads, 2);
        assert!(info.available_parallelism >= 1);
    }
}
