//! Configuration file loading and discovery.

use super::types::EngineConfig;
use super::validation::{ConfigError, Validatable};
use crate::error::ScanDiffError;
use std::path::{Path, PathBuf};

/// Config file names searched in each candidate directory.
const CONFIG_FILE_NAMES: &[&str] = &[
    ".scan-diff.yaml",
    ".scan-diff.yml",
    "scan-diff.yaml",
    "scan-diff.yml",
];

/// Discover a config file by searching standard locations.
///
/// Search order:
/// 1. Explicit path if provided and present
/// 2. Current directory
/// 3. User config directory (`~/.config/scan-diff/` on Linux)
#[must_use]
pub fn discover_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(path) = find_config_in_dir(&cwd) {
            return Some(path);
        }
    }

    dirs::config_dir().and_then(|dir| find_config_in_dir(&dir.join("scan-diff")))
}

fn find_config_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Error type for config file operations.
#[derive(Debug)]
pub enum ConfigFileError {
    /// File not found
    NotFound(PathBuf),
    /// IO error reading file
    Io(std::io::Error),
    /// YAML parsing error
    Parse(serde_yaml::Error),
    /// Parsed but failed validation
    Invalid(Vec<ConfigError>),
}

impl std::fmt::Display for ConfigFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            Self::Io(e) => write!(f, "Failed to read config file: {e}"),
            Self::Parse(e) => write!(f, "Failed to parse config file: {e}"),
            Self::Invalid(errors) => {
                let joined = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "Invalid config: {joined}")
            }
        }
    }
}

impl std::error::Error for ConfigFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) | Self::Invalid(_) => None,
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigFileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigFileError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err)
    }
}

impl From<ConfigFileError> for ScanDiffError {
    fn from(err: ConfigFileError) -> Self {
        match err {
            ConfigFileError::Io(e) => e.into(),
            other => Self::config(other.to_string()),
        }
    }
}

/// Load and validate an `EngineConfig` from a YAML file.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigFileError> {
    if !path.exists() {
        return Err(ConfigFileError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_yaml::from_str(&content)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigFileError::Invalid(errors));
    }

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load config from discovered file, or return default.
#[must_use]
pub fn load_or_default(explicit_path: Option<&Path>) -> (EngineConfig, Option<PathBuf>) {
    discover_config_file(explicit_path).map_or_else(
        || (EngineConfig::default(), None),
        |path| match load_config_file(&path) {
            Ok(config) => (config, Some(path)),
            Err(e) => {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                (EngineConfig::default(), None)
            }
        },
    )
}

/// Commented example config file.
#[must_use]
pub fn generate_example_config() -> String {
    format!(
        r"# scan-diff configuration

# Keep unchanged hosts, services and fields in diff results
include_unchanged: false

# Descend into changed hosts and services for field-level detail
descend: true

# Number of changed hosts at which host diffs run in parallel
parallel_threshold: {}
",
        super::types::DEFAULT_PARALLEL_THRESHOLD
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_dir() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(".scan-diff.yaml");
        std::fs::write(&config_path, "descend: false\n").unwrap();

        assert_eq!(find_config_in_dir(tmp.path()), Some(config_path));
    }

    #[test]
    fn test_find_config_in_dir_not_found() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(find_config_in_dir(tmp.path()), None);
    }

    #[test]
    fn test_load_config_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "include_unchanged: true\nparallel_threshold: 8\n",
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert!(config.include_unchanged);
        assert!(config.descend);
        assert_eq!(config.parallel_threshold, 8);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config_file(Path::new("/nonexistent/scan-diff.yaml"));
        assert!(matches!(result, Err(ConfigFileError::NotFound(_))));
    }

    #[test]
    fn test_load_config_file_invalid() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.yaml");
        std::fs::write(&config_path, "parallel_threshold: 0\n").unwrap();

        let err = load_config_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigFileError::Invalid(ref errors) if errors.len() == 1));

        let converted: ScanDiffError = err.into();
        assert!(matches!(converted, ScanDiffError::Config(_)));
    }

    #[test]
    fn test_load_config_file_parse_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.yaml");
        std::fs::write(&config_path, "parallel_threshold: many\n").unwrap();

        assert!(matches!(
            load_config_file(&config_path),
            Err(ConfigFileError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("broken.yaml");
        std::fs::write(&config_path, "descend: [").unwrap();

        let (config, loaded_from) = load_or_default(Some(&config_path));
        assert_eq!(config, EngineConfig::default());
        assert!(loaded_from.is_none());
    }

    #[test]
    fn test_example_config_parses() {
        let config: EngineConfig = serde_yaml::from_str(&generate_example_config()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_discover_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("custom.yaml");
        std::fs::write(&config_path, "descend: true\n").unwrap();

        assert_eq!(discover_config_file(Some(&config_path)), Some(config_path));
    }
}
