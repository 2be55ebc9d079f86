//! Settings discovery for CLI use.
//!
//! Layering: built-in defaults, then `kiln.toml` (or the `kiln` field of
//! `package.json`), then `KILN_<SECTION>__<KEY>` environment variables.
//!
//! The file is parsed with order-preserving maps because the proxy table is
//! matched in declaration order. Only the environment layer goes through
//! figment.

use std::fs;
use std::path::{Path, PathBuf};

use figment::providers::Env;
use figment::Figment;
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::settings::ProjectConfig;
use crate::value::{merge_values, ConfigValue};

pub const SETTINGS_FILE: &str = "kiln.toml";
pub const PACKAGE_FIELD: &str = "kiln";
pub const ENV_PREFIX: &str = "KILN_";

const SECTIONS: [&str; 4] = ["dev", "build", "test", "bundler"];

pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a settings file in the root directory.
    ///
    /// Searches in this order:
    /// 1. kiln.toml
    /// 2. package.json (kiln field)
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(SETTINGS_FILE);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed: Value = serde_json::from_str(&content).ok()?;
        parsed
            .get(PACKAGE_FIELD)
            .is_some_and(|field| !field.is_null())
            .then_some(pkg_path)
    }

    /// Load settings; a project without a settings file gets the defaults.
    pub fn load(&self) -> Result<ProjectConfig> {
        let file_layer = match self.find() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                read_layer(&path)?
            }
            None => {
                tracing::debug!(root = %self.root.display(), "no settings file, using defaults");
                ConfigValue::empty()
            }
        };
        finish(merge_values(&file_layer, &env_layer()?))
    }

    /// Load settings from an explicit file.
    pub fn load_from(&self, path: &Path) -> Result<ProjectConfig> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        finish(merge_values(&read_layer(path)?, &env_layer()?))
    }
}

/// Discover and load settings for the project at `root`.
pub fn discover(root: &Path) -> Result<ProjectConfig> {
    ConfigDiscovery::new(root).load()
}

fn read_layer(path: &Path) -> Result<ConfigValue> {
    let content = fs::read_to_string(path)?;

    if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
        let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
            field: "package.json".to_string(),
            hint: Some(format!("Invalid JSON: {e}")),
        })?;
        return match parsed.get(PACKAGE_FIELD) {
            Some(Value::Null) | None => Err(ConfigError::InvalidValue {
                field: PACKAGE_FIELD.to_string(),
                hint: Some("Add a 'kiln' object to your package.json".to_string()),
            }),
            Some(value) => Ok(ConfigValue::from(value.clone())),
        };
    }

    let value: Value = toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: SETTINGS_FILE.to_string(),
        hint: Some(format!("Invalid TOML syntax: {e}")),
    })?;
    Ok(ConfigValue::from(value))
}

fn env_layer() -> Result<ConfigValue> {
    let provider = Env::prefixed(ENV_PREFIX)
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            SECTIONS
                .iter()
                .any(|section| key.starts_with(&format!("{section}__")))
        })
        .split("__")
        .lowercase(false);

    let value: Value = Figment::from(provider)
        .extract()
        .map_err(|e| ConfigError::InvalidValue {
            field: "environment".to_string(),
            hint: Some(e.to_string()),
        })?;
    Ok(normalize_keys(ConfigValue::from(value), 0))
}

/// `DEV__ASSETS_PUBLIC_PATH` → `dev.assetsPublicPath`. Keys below a field
/// belong to user maps like `dev.env` and keep their spelling.
fn normalize_keys(value: ConfigValue, depth: usize) -> ConfigValue {
    match value {
        ConfigValue::Mapping(map) if depth < 2 => ConfigValue::Mapping(
            map.into_iter()
                .map(|(key, value)| {
                    (camelize(&key.to_ascii_lowercase()), normalize_keys(value, depth + 1))
                })
                .collect(),
        ),
        other => other,
    }
}

fn camelize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn finish(value: ConfigValue) -> Result<ProjectConfig> {
    serde_json::from_value(Value::from(value)).map_err(|e| ConfigError::InvalidValue {
        field: "settings".to_string(),
        hint: Some(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn camelize_converts_snake_keys() {
        assert_eq!(camelize("assets_public_path"), "assetsPublicPath");
        assert_eq!(camelize("port"), "port");
        assert_eq!(camelize("_leading"), "leading");
    }

    #[test]
    #[serial]
    fn find_returns_none_when_no_settings() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    #[serial]
    fn package_json_without_field_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
        let discovery = ConfigDiscovery::new(dir.path());
        assert!(discovery.find().is_none());
        assert_eq!(discovery.load().unwrap(), ProjectConfig::default());
    }

    #[test]
    #[serial]
    fn load_from_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ConfigDiscovery::new(dir.path()).load_from(&missing),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    #[serial]
    fn invalid_toml_reports_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "[dev\nport = ").unwrap();
        let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("kiln.toml"));
    }
}
