//! Configuration for Mantle
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::sync::Arc;

use crate::matter::{MatterValue, SliceRegistry, DEFAULT_AUTHOR};

/// Main configuration for a Mantle instance
#[derive(Debug, Clone)]
pub struct MantleConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Folder holding one file per region
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── p.<key>.ttp      (region files, key = packed region x/z)
    ///     └── p.<key>.ttp.tmp  (in-flight write, renamed on success)
    pub data_dir: PathBuf,

    /// Blocks per column; y outside `0..world_height` is a miss
    pub world_height: usize,

    // -------------------------------------------------------------------------
    // Concurrency Configuration
    // -------------------------------------------------------------------------
    /// Dispatch batch I/O to the worker pool; false runs every job inline
    pub multicore: bool,

    /// Worker threads for batch I/O (0 = one per CPU)
    pub io_threads: usize,

    /// Guard region loads with per-region locks; false for single-threaded use
    pub lock_regions: bool,

    // -------------------------------------------------------------------------
    // Matter Configuration
    // -------------------------------------------------------------------------
    /// Author stamped into every section header
    pub author: String,

    /// Value types the engine can store and read back
    pub registry: Arc<SliceRegistry>,
}

impl Default for MantleConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./mantle_data"),
            world_height: 256,
            multicore: true,
            io_threads: 0,
            lock_regions: true,
            author: DEFAULT_AUTHOR.to_string(),
            registry: Arc::new(SliceRegistry::default()),
        }
    }
}

impl MantleConfig {
    /// Create a new config builder
    pub fn builder() -> MantleConfigBuilder {
        MantleConfigBuilder::default()
    }
}

/// Builder for MantleConfig
#[derive(Default)]
pub struct MantleConfigBuilder {
    config: MantleConfig,
}

impl MantleConfigBuilder {
    /// Set the folder that holds region files
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the world height in blocks
    pub fn world_height(mut self, height: usize) -> Self {
        self.config.world_height = height;
        self
    }

    /// Enable or disable parallel batch I/O
    pub fn multicore(mut self, enabled: bool) -> Self {
        self.config.multicore = enabled;
        self
    }

    /// Set the number of batch I/O threads
    pub fn io_threads(mut self, threads: usize) -> Self {
        self.config.io_threads = threads;
        self
    }

    /// Enable or disable per-region locking
    pub fn lock_regions(mut self, enabled: bool) -> Self {
        self.config.lock_regions = enabled;
        self
    }

    /// Set the author written into section headers
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = author.into();
        self
    }

    /// Replace the whole slice registry
    pub fn registry(mut self, registry: SliceRegistry) -> Self {
        self.config.registry = Arc::new(registry);
        self
    }

    /// Register one more value type on top of the current registry
    pub fn register<T: MatterValue>(mut self) -> Self {
        Arc::make_mut(&mut self.config.registry).register::<T>();
        self
    }

    pub fn build(self) -> MantleConfig {
        self.config
    }
}
