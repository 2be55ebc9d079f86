//! Environment overlays and the deep merge that applies them.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::base::{base_config, define_options, style_options, APP_ENTRY_NAME};
use crate::descriptor::{plugin_names as plugins, ConfigDescriptor, Entry};
use crate::environment::Environment;
use crate::error::{ConfigError, Result};
use crate::loaders::style_rule_list;
use crate::settings::ProjectConfig;
use crate::value::{merge_values, ConfigValue};

/// Client module prepended to every dev entry so pages subscribe to hot updates.
pub const HOT_CLIENT_ENTRY: &str = "./build/dev-client";

/// A partial descriptor. Always a mapping at the top level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overlay(ConfigValue);

impl Overlay {
    pub fn new(value: ConfigValue) -> Result<Self> {
        if value.is_mapping() {
            Ok(Self(value))
        } else {
            Err(ConfigError::OverlayNotMapping { found: value.kind() })
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Self::new(ConfigValue::from(value))
    }

    pub fn empty() -> Self {
        Self(ConfigValue::empty())
    }

    /// Fold `next` on top of this overlay.
    pub fn then(&self, next: &Overlay) -> Overlay {
        Overlay(merge_values(&self.0, &next.0))
    }

    pub fn as_value(&self) -> &ConfigValue {
        &self.0
    }
}

/// Apply `overlay` to `base`, producing a new descriptor.
pub fn merge(base: &ConfigDescriptor, overlay: &Overlay) -> Result<ConfigDescriptor> {
    let merged = merge_values(&base.to_value()?, overlay.as_value());
    ConfigDescriptor::from_value(merged)
}

/// Builds the named per-environment descriptors for one project.
#[derive(Debug, Clone)]
pub struct ConfigMerger<'a> {
    project: &'a ProjectConfig,
    root: PathBuf,
}

impl<'a> ConfigMerger<'a> {
    pub fn new(project: &'a ProjectConfig, root: impl AsRef<Path>) -> Self {
        Self {
            project,
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self, environment: Environment) -> ConfigDescriptor {
        base_config(self.project, environment, &self.root)
    }

    pub fn dev_overlay(&self) -> Result<Overlay> {
        let environment = Environment::Development;
        let dev = &self.project.dev;
        let base = self.base(environment);

        // Replaces the app entry wholesale; a string base cannot concatenate
        let mut app = vec![HOT_CLIENT_ENTRY.to_string()];
        if let Some(entry) = base.entry.get(APP_ENTRY_NAME) {
            app.extend(entry.modules().into_iter().map(str::to_string));
        }

        Overlay::from_json(json!({
            "entry": { APP_ENTRY_NAME: Entry::Many(app) },
            "output": { "publicPathTemplate": dev.assets_public_path },
            "rules": style_rule_list(&style_options(self.project, environment)),
            "devtool": "cheap-module-eval-source-map",
            "plugins": [
                { "name": plugins::DEFINE, "options": define_options(&dev.env) },
                { "name": plugins::HOT_MODULE_REPLACEMENT },
                { "name": plugins::NO_EMIT_ON_ERRORS },
                {
                    "name": plugins::HTML,
                    "options": { "filename": "index.html", "template": "index.html", "inject": true }
                },
                { "name": plugins::FRIENDLY_ERRORS },
            ],
        }))
    }

    /// `build.index` relative to `assetsRoot`, so the page lands in the
    /// bundler's output tree like every other asset.
    fn html_filename(&self) -> String {
        let build = &self.project.build;
        let relative = build
            .index
            .strip_prefix(&build.assets_root)
            .ok()
            .filter(|rest| !rest.as_os_str().is_empty())
            .or_else(|| build.index.file_name().map(Path::new))
            .unwrap_or_else(|| Path::new("index.html"));
        relative.to_string_lossy().replace('\\', "/")
    }

    pub fn prod_overlay(&self) -> Result<Overlay> {
        let environment = Environment::Production;
        let build = &self.project.build;
        let policy = self.project.path_policy();
        let assets = |relative: &str| policy.assets_path(relative, false);

        let devtool = if build.production_source_map {
            Value::from("source-map")
        } else {
            Value::Null
        };

        let mut plugin_list = vec![
            json!({ "name": plugins::DEFINE, "options": define_options(&build.env) }),
            json!({
                "name": plugins::MINIFY_JS,
                "options": { "compress": { "warnings": false }, "sourceMap": true }
            }),
            json!({
                "name": plugins::EXTRACT_CSS,
                "options": { "filename": assets("css/[name].[contenthash].css") }
            }),
            json!({
                "name": plugins::OPTIMIZE_CSS,
                "options": { "cssProcessorOptions": { "safe": true } }
            }),
            json!({
                "name": plugins::HTML,
                "options": {
                    "filename": self.html_filename(),
                    "template": "index.html",
                    "inject": true,
                    "minify": {
                        "removeComments": true,
                        "collapseWhitespace": true,
                        "removeAttributeQuotes": true,
                    },
                    "chunksSortMode": "dependency",
                }
            }),
            json!({
                "name": plugins::SPLIT_CHUNKS,
                "options": { "name": "vendor", "test": r"\.js$", "from": "node_modules" }
            }),
            json!({
                "name": plugins::SPLIT_CHUNKS,
                "options": { "name": "manifest", "chunks": ["vendor"] }
            }),
            json!({
                "name": plugins::COPY_STATIC,
                "options": {
                    "from": self.root.join(&self.project.dev.static_dir),
                    "to": build.assets_sub_directory,
                    "ignore": [".*"],
                }
            }),
        ];

        if build.production_gzip {
            let extensions = build.production_gzip_extensions.join("|");
            plugin_list.push(json!({
                "name": plugins::COMPRESSION,
                "options": {
                    "asset": "[path].gz[query]",
                    "algorithm": "gzip",
                    "test": format!(r"\.({extensions})$"),
                    "threshold": 10240,
                    "minRatio": 0.8,
                }
            }));
        }

        if build.bundle_analyzer_report {
            plugin_list.push(json!({
                "name": plugins::BUNDLE_REPORT,
                "options": { "filename": "report.json" }
            }));
        }

        Overlay::from_json(json!({
            "output": {
                "dir": self.root.join(&build.assets_root),
                "filenameTemplate": assets("js/[name].[chunkhash].js"),
                "chunkFilenameTemplate": assets("js/[id].[chunkhash].js"),
                "publicPathTemplate": build.assets_public_path,
            },
            "rules": style_rule_list(&style_options(self.project, environment)),
            "devtool": devtool,
            "plugins": plugin_list,
        }))
    }

    pub fn test_overlay(&self) -> Result<Overlay> {
        let environment = Environment::Testing;
        Overlay::from_json(json!({
            "rules": style_rule_list(&style_options(self.project, environment)),
            "devtool": "inline-source-map",
            "plugins": [
                { "name": plugins::DEFINE, "options": define_options(&self.project.test.env) },
            ],
        }))
    }

    pub fn dev_config(&self) -> Result<ConfigDescriptor> {
        merge(&self.base(Environment::Development), &self.dev_overlay()?)
    }

    pub fn prod_config(&self) -> Result<ConfigDescriptor> {
        merge(&self.base(Environment::Production), &self.prod_overlay()?)
    }

    pub fn test_config(&self) -> Result<ConfigDescriptor> {
        merge(&self.base(Environment::Testing), &self.test_overlay()?)
    }

    pub fn config_for(&self, environment: Environment) -> Result<ConfigDescriptor> {
        tracing::debug!(%environment, "composing descriptor");
        match environment {
            Environment::Development => self.dev_config(),
            Environment::Production => self.prod_config(),
            Environment::Testing => self.test_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_must_be_a_mapping() {
        let err = Overlay::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OverlayNotMapping { found: "sequence" }
        ));
    }

    #[test]
    fn prod_html_entry_is_relative_to_assets_root() {
        let mut project = ProjectConfig::default();
        let filename = |project: &ProjectConfig| {
            let prod = ConfigMerger::new(project, "/project").prod_config().unwrap();
            prod.plugin(plugins::HTML).unwrap().options["filename"].clone()
        };
        assert_eq!(filename(&project), json!("index.html"));

        project.build.index = PathBuf::from("dist/pages/app.html");
        assert_eq!(filename(&project), json!("pages/app.html"));

        project.build.index = PathBuf::from("/elsewhere/main.html");
        assert_eq!(filename(&project), json!("main.html"));
    }

    #[test]
    fn merge_with_empty_overlay_is_identity() {
        let project = ProjectConfig::default();
        let merger = ConfigMerger::new(&project, "/project");
        let base = merger.base(Environment::Production);
        assert_eq!(merge(&base, &Overlay::empty()).unwrap(), base);
    }

    #[test]
    fn merged_result_must_still_be_a_descriptor() {
        let project = ProjectConfig::default();
        let base = ConfigMerger::new(&project, "/project").base(Environment::Development);
        let overlay = Overlay::from_json(json!({ "output": { "dir": 42 } })).unwrap();
        assert!(matches!(
            merge(&base, &overlay),
            Err(ConfigError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn dev_entry_gets_hot_client_first() {
        let project = ProjectConfig::default();
        let dev = ConfigMerger::new(&project, "/project").dev_config().unwrap();
        assert_eq!(
            dev.entry["app"],
            Entry::Many(vec![HOT_CLIENT_ENTRY.into(), "./src/main.js".into()])
        );
    }
}
