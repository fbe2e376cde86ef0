//! Configuration types for the diff engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default number of changed hosts at which host diffs run in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Diff engine configuration.
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Keep unchanged keys in diff results
    pub include_unchanged: bool,
    /// Descend into changed hosts and services for field-level detail
    pub descend: bool,
    /// Changed-host count at which host diffs are computed in parallel
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_unchanged: false,
            descend: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that never leaves the calling thread
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.include_unchanged);
        assert!(config.descend);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("include_unchanged: true\n").unwrap();
        assert!(config.include_unchanged);
        assert!(config.descend);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }
}
