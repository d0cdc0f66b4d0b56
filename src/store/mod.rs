pub mod activities;
pub mod models;
pub mod queries;

use crate::config::QueryConfig;

pub use self::activities::ActivityLog;
pub use self::queries::QueryStore;

/// Page size bounds for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default: usize,
    pub max: usize,
}

impl ListLimits {
    /// Missing or zero limits fall back to the default; anything above the
    /// maximum is capped.
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(0) | None => self.default,
            Some(n) => n,
        }
        .min(self.max)
    }
}

impl Default for ListLimits {
    fn default() -> Self {
        Self { default: 20, max: 100 }
    }
}

impl From<&QueryConfig> for ListLimits {
    fn from(config: &QueryConfig) -> Self {
        Self {
            default: config.default_list_limit,
            max: config.max_list_limit,
        }
    }
}
