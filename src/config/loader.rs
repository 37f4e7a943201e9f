//! Configuration file loading and parsing.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, error, warn};

use super::model::AppConfig;
use crate::error::ConfigError;
use crate::validation::{report, validate_config, SystemCapabilities};

/// Loads the configuration file from disk and parses it.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    // An empty file is a valid "all defaults" config.
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    let config: AppConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(config)
}

/// Loads the configuration file if one was given, defaults otherwise.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            debug!("No configuration file given, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Loads and validates the configuration.
///
/// Encoder availability is only checked when `capabilities` is given.
pub fn load_and_validate(
    path: Option<&Path>,
    capabilities: Option<&SystemCapabilities>,
) -> Result<AppConfig> {
    let config = load(path).context("Failed to load configuration")?;

    let result = validate_config(&config, capabilities);

    for issue in result.warnings() {
        warn!(
            path = %issue.path,
            message = %issue.message,
            suggestion = ?issue.suggestion,
            "Config validation warning"
        );
    }

    let error_count = result.error_count();
    if error_count > 0 {
        error!("{}", report::format_report(&result));
        anyhow::bail!(ConfigError::ValidationFailed { error_count });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::Quality;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_fills_defaults() {
        let file = write_config(
            r#"
encoding:
  container: mkv
  quality:
    high: 16
defaults:
  segment_length_seconds: 60
  quality: high
"#,
        );

        let config = load_from_path(file.path()).unwrap();

        assert_eq!(config.encoding.container, "mkv");
        assert_eq!(config.encoding.quality.high, 16);
        assert_eq!(config.encoding.quality.medium, 23);
        assert_eq!(config.defaults.segment_length_seconds, 60);
        assert_eq!(config.defaults.quality, Quality::High);
        assert!(config.defaults.keep_audio);
        assert_eq!(config.tools.ffmpeg, "ffmpeg");
    }

    #[test]
    fn empty_file_is_defaults() {
        let file = write_config("\n");

        let config = load_from_path(file.path()).unwrap();

        assert_eq!(config.defaults.segment_length_seconds, 150);
    }

    #[test]
    fn no_path_is_defaults() {
        let config = load(None).unwrap();

        assert_eq!(config.timeouts.encode_seconds, 300);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_from_path(Path::new("/definitely/not/here.yaml")).unwrap_err();

        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let file = write_config("defaults: [unclosed");

        let err = load_from_path(file.path()).unwrap_err();

        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = write_config("defaults:\n  segment_length_seconds: 0\n");

        let err = load_and_validate(Some(file.path()), None).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ValidationFailed { error_count: 1 })
        ));
    }
}
