//! Loading the rule model from a settings file, or synthesizing the
//! zero-configuration default.

pub mod types;

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, KubecheckError, Result};
use types::{ChartSource, Rule, Settings, TestConfig, TestSet};

/// Directory under the run root holding kubecheck configuration.
pub const SETTINGS_DIR: &str = ".kubecheck";

/// The settings file name inside [`SETTINGS_DIR`].
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Report format used when an output dir is configured without a format.
pub const DEFAULT_FORMAT: &str = "tap";

/// The settings path used when none is given on the command line.
pub fn default_settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_DIR).join(SETTINGS_FILE_NAME)
}

/// Load settings from `path` if it exists, otherwise synthesize a single
/// chart rule pointing at `charts_dir`.
///
/// When an output dir is configured without a format, the format defaults
/// to [`DEFAULT_FORMAT`] with a warning naming the settings file.
pub fn load_settings(path: &Path, charts_dir: &Path, recurse: bool) -> Result<Settings> {
    let mut settings = if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| KubecheckError::io(path, e))?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!("loaded settings file {}", path.display());
        settings
    } else {
        default_settings(charts_dir, recurse)
    };

    if settings.spec.output_dir.is_some() && settings.spec.format.is_none() {
        warn!(
            "no spec.format is specified in {} so defaulting to '{}'",
            path.display(),
            DEFAULT_FORMAT
        );
        settings.spec.format = Some(DEFAULT_FORMAT.to_string());
    }
    Ok(settings)
}

/// The zero-configuration default: one chart rule with schema validation
/// and the security audit enabled at their built-in versions.
pub fn default_settings(charts_dir: &Path, recurse: bool) -> Settings {
    let mut settings = Settings::default();
    settings.spec.rules.push(Rule {
        charts: Some(ChartSource {
            dir: charts_dir.to_path_buf(),
            recurse,
        }),
        resources: None,
        tests: TestSet {
            schema_validate: Some(TestConfig::default()),
            security_audit: Some(TestConfig::default()),
            ..Default::default()
        },
    });
    settings
}
