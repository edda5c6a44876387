//! Static per-tenant limits

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::ports::Limits;

/// Default download parallelism with per-tenant overrides
pub struct StaticLimits {
    default_parallelism: usize,
    overrides: RwLock<HashMap<String, usize>>,
}

impl StaticLimits {
    pub fn new(default_parallelism: usize) -> Self {
        Self {
            default_parallelism,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_override(self, tenant_id: impl Into<String>, parallelism: usize) -> Self {
        self.set_override(tenant_id, parallelism);
        self
    }

    pub fn set_override(&self, tenant_id: impl Into<String>, parallelism: usize) {
        self.overrides.write().insert(tenant_id.into(), parallelism);
    }
}

impl Default for StaticLimits {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Limits for StaticLimits {
    fn blocks_downloading_parallelism(&self, tenant_id: &str) -> usize {
        self.overrides
            .read()
            .get(tenant_id)
            .copied()
            .unwrap_or(self.default_parallelism)
    }
}
