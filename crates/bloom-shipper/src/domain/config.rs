//! Shipper configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use bloom_shipper::domain::ShipperConfigBuilder;
//!
//! let config = ShipperConfigBuilder::new()
//!     .workers_count(16)
//!     .max_tasks_enqueued_per_tenant(1_000)
//!     .build()
//!     .expect("Valid config");
//! ```

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::ShipperError;

/// Default number of concurrent block downloads across all tenants
pub const DEFAULT_WORKERS_COUNT: usize = 100;

/// Default upper bound on blocks requested by one tenant in a single fetch
pub const DEFAULT_MAX_TASKS_ENQUEUED_PER_TENANT: usize = 10_000;

/// Block downloading queue settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadingQueueConfig {
    /// Concurrent downloads shared by every tenant
    pub workers_count: usize,
    /// Maximum blocks a tenant may request in one fetch
    pub max_tasks_enqueued_per_tenant: usize,
}

impl Default for DownloadingQueueConfig {
    fn default() -> Self {
        Self {
            workers_count: DEFAULT_WORKERS_COUNT,
            max_tasks_enqueued_per_tenant: DEFAULT_MAX_TASKS_ENQUEUED_PER_TENANT,
        }
    }
}

/// Bloom shipper configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipperConfig {
    #[serde(default)]
    pub blocks_downloading_queue: DownloadingQueueConfig,
}

impl ShipperConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BLOOM_SHIPPER_WORKERS_COUNT`: concurrent downloads (default: 100)
    /// - `BLOOM_SHIPPER_MAX_TASKS_PER_TENANT`: blocks per fetch (default: 10000)
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            blocks_downloading_queue: DownloadingQueueConfig {
                workers_count: env_usize("BLOOM_SHIPPER_WORKERS_COUNT")
                    .unwrap_or(DEFAULT_WORKERS_COUNT),
                max_tasks_enqueued_per_tenant: env_usize("BLOOM_SHIPPER_MAX_TASKS_PER_TENANT")
                    .unwrap_or(DEFAULT_MAX_TASKS_ENQUEUED_PER_TENANT),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ShipperError> {
        let queue = &self.blocks_downloading_queue;
        if queue.workers_count == 0 {
            return Err(ShipperError::InvalidConfig(
                "workers_count cannot be 0".to_string(),
            ));
        }
        if queue.max_tasks_enqueued_per_tenant == 0 {
            return Err(ShipperError::InvalidConfig(
                "max_tasks_enqueued_per_tenant cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

/// Fluent builder for [`ShipperConfig`]
#[derive(Default)]
pub struct ShipperConfigBuilder {
    workers_count: Option<usize>,
    max_tasks_enqueued_per_tenant: Option<usize>,
}

impl ShipperConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers_count(mut self, count: usize) -> Self {
        self.workers_count = Some(count);
        self
    }

    pub fn max_tasks_enqueued_per_tenant(mut self, max: usize) -> Self {
        self.max_tasks_enqueued_per_tenant = Some(max);
        self
    }

    /// Build the config, validating all parameters
    pub fn build(self) -> Result<ShipperConfig, ShipperError> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> ShipperConfig {
        let defaults = DownloadingQueueConfig::default();

        ShipperConfig {
            blocks_downloading_queue: DownloadingQueueConfig {
                workers_count: self.workers_count.unwrap_or(defaults.workers_count),
                max_tasks_enqueued_per_tenant: self
                    .max_tasks_enqueued_per_tenant
                    .unwrap_or(defaults.max_tasks_enqueued_per_tenant),
            },
        }
    }
}
