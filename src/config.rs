//! Configuration for tdbstore
//!
//! Tunables for the engine's RAM usage. Device geometry is not configured
//! here: it always comes from the block device itself.

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // RAM Index Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of the RAM index (number of keys).
    /// The table doubles whenever an insert would exceed it.
    pub initial_max_keys: usize,

    // -------------------------------------------------------------------------
    // I/O Configuration
    // -------------------------------------------------------------------------
    /// Size of the scratch buffer used to stream record payloads
    /// (checksum verification, GC copies, incremental-set staging).
    /// Rounded up to the device program size when used.
    pub work_buf_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_max_keys: 16,
            work_buf_size: 64,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the initial RAM index capacity
    pub fn initial_max_keys(mut self, count: usize) -> Self {
        self.config.initial_max_keys = count;
        self
    }

    /// Set the scratch buffer size (in bytes)
    pub fn work_buf_size(mut self, size: usize) -> Self {
        self.config.work_buf_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
