// SPDX-License-Identifier: Apache-2.0

//! Scan settings.
//!
//! Provides layered configuration from files and environment variables.
//! Uses XDG-compliant paths with environment variable support.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `SKYAUDIT_`)
//! 2. Config file: `~/.config/skyaudit/config.toml`
//! 3. Built-in defaults
//!
//! # Examples
//!
//! ```toml
//! regions = ["us-east-1", "eu-west-1"]
//! govcloud = false
//! concurrency = 8
//!
//! [checks]
//! database_diagnostic_settings = "SQLInsights,Errors,Timeouts"
//! ```
//!
//! ```bash
//! # Restrict fan-out via environment variable
//! SKYAUDIT_CONCURRENCY=4 skyaudit
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ScanError;

/// Default number of regions or resources processed concurrently by one check.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Settings surface shared by every check.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Explicit region allow-list. `None` scans the whole catalog.
    pub regions: Option<Vec<String>>,
    /// Select the government cloud catalogs instead of the commercial ones.
    pub govcloud: bool,
    /// Fan-out limit for region and resource branches.
    ///
    /// Applied at each nesting level: a check that fans out over regions and
    /// then over resources within a region may have up to
    /// `concurrency * concurrency` resource branches in flight.
    pub concurrency: usize,
    /// Check tunables keyed by tunable name.
    pub checks: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            regions: None,
            govcloud: false,
            concurrency: DEFAULT_CONCURRENCY,
            checks: HashMap::new(),
        }
    }
}

impl Settings {
    /// Effective fan-out limit; never zero.
    #[must_use]
    pub fn fan_out(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Raw value of a check tunable, if configured.
    #[must_use]
    pub fn tunable(&self, key: &str) -> Option<&str> {
        self.checks.get(key).map(String::as_str)
    }

    /// Returns a copy with the given tunable set.
    #[must_use]
    pub fn with_tunable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.checks.insert(key.into(), value.into());
        self
    }

    /// Returns a copy restricted to the given regions.
    #[must_use]
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }
}

/// Returns the skyaudit configuration directory.
///
/// Respects the `XDG_CONFIG_HOME` environment variable if set,
/// otherwise defaults to `~/.config/skyaudit`.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return Some(PathBuf::from(xdg_config).join("skyaudit"));
    }
    dirs::home_dir().map(|home| home.join(".config").join("skyaudit"))
}

/// Returns the path to the configuration file.
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Load settings from the default config file and the environment.
///
/// # Errors
///
/// Returns `ScanError::Config` if the config file exists but is invalid.
pub fn load_config() -> Result<Settings, ScanError> {
    match config_file_path() {
        Some(path) => load_config_from(&path),
        None => build(None),
    }
}

/// Load settings from a specific file, then apply environment overrides.
///
/// A missing file is not an error.
///
/// # Errors
///
/// Returns `ScanError::Config` if the file exists but is invalid.
pub fn load_config_from(path: &Path) -> Result<Settings, ScanError> {
    build(Some(path))
}

fn build(path: Option<&Path>) -> Result<Settings, ScanError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(false));
    }

    let config = builder
        .add_source(
            Environment::with_prefix("SKYAUDIT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("regions")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    tracing::debug!(
        govcloud = settings.govcloud,
        concurrency = settings.concurrency,
        "Loaded scan settings"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_load_config_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_config_from(&dir.path().join("missing.toml")).expect("defaults");

        assert!(settings.regions.is_none());
        assert!(!settings.govcloud);
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert!(settings.checks.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        writeln!(
            file,
            r#"
regions = ["us-east-1", "eu-west-1"]
govcloud = true
concurrency = 3

[checks]
database_diagnostic_settings = "audit"
"#
        )
        .expect("write");

        let settings = load_config_from(file.path()).expect("load");
        assert_eq!(
            settings.regions,
            Some(vec!["us-east-1".to_string(), "eu-west-1".to_string()])
        );
        assert!(settings.govcloud);
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.tunable("database_diagnostic_settings"), Some("audit"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "concurrency = 3").expect("write");

        // SAFETY: serialised with the other env-touching tests.
        unsafe { std::env::set_var("SKYAUDIT_CONCURRENCY", "7") };
        let settings = load_config_from(file.path());
        unsafe { std::env::remove_var("SKYAUDIT_CONCURRENCY") };

        assert_eq!(settings.expect("load").concurrency, 7);
    }

    #[test]
    #[serial]
    fn test_env_nested_tunable_and_region_list() {
        let dir = tempfile::tempdir().expect("tempdir");

        // SAFETY: serialised with the other env-touching tests.
        unsafe {
            std::env::set_var("SKYAUDIT_REGIONS", "us-east-1,eu-west-1");
            std::env::set_var("SKYAUDIT_CHECKS__DATABASE_DIAGNOSTIC_SETTINGS", "audit");
        }
        let settings = load_config_from(&dir.path().join("missing.toml"));
        unsafe {
            std::env::remove_var("SKYAUDIT_REGIONS");
            std::env::remove_var("SKYAUDIT_CHECKS__DATABASE_DIAGNOSTIC_SETTINGS");
        }

        let settings = settings.expect("load");
        assert_eq!(
            settings.regions,
            Some(vec!["us-east-1".to_string(), "eu-west-1".to_string()])
        );
        assert_eq!(settings.tunable("database_diagnostic_settings"), Some("audit"));
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "concurrency = \"many\"").expect("write");

        let err = load_config_from(file.path()).unwrap_err();
        assert!(matches!(err, ScanError::Config { .. }));
    }

    #[test]
    fn test_fan_out_never_zero() {
        let settings = Settings {
            concurrency: 0,
            ..Settings::default()
        };
        assert_eq!(settings.fan_out(), 1);
    }

    #[test]
    fn test_builders() {
        let settings = Settings::default()
            .with_regions(["us-west-2"])
            .with_tunable("k", "v");
        assert_eq!(settings.regions, Some(vec!["us-west-2".to_string()]));
        assert_eq!(settings.tunable("k"), Some("v"));
        assert_eq!(settings.tunable("missing"), None);
    }
}
