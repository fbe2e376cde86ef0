//! Engine configuration.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scan_diff::config::{load_or_default, EngineConfig};
//!
//! // Use defaults
//! let config = EngineConfig::default();
//!
//! // Load from an explicit or discovered file
//! let (config, loaded_from) = load_or_default(None);
//! ```
//!
//! # Configuration File
//!
//! Place a `.scan-diff.yaml` file in the working directory or in
//! `~/.config/scan-diff/`:
//!
//! ```yaml
//! include_unchanged: false
//! descend: true
//! parallel_threshold: 64
//! ```

mod file;
mod types;
mod validation;

pub use file::{
    discover_config_file, generate_example_config, load_config_file, load_or_default,
    ConfigFileError,
};
pub use types::{EngineConfig, DEFAULT_PARALLEL_THRESHOLD};
pub use validation::{ConfigError, Validatable};

/// JSON Schema for [`EngineConfig`], for editor completion of config files.
pub fn generate_json_schema() -> crate::error::Result<String> {
    let schema = schemars::schema_for!(EngineConfig);
    Ok(serde_json::to_string_pretty(&schema)?)
}
