//! The bundling descriptor handed to the bundler.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::pipeline::PipelineRule;
use crate::value::ConfigValue;

/// Well-known plugin names. Anything else is passed through to the bundler
/// untouched.
pub mod plugin_names {
    pub const DEFINE: &str = "define";
    pub const HOT_MODULE_REPLACEMENT: &str = "hot-module-replacement";
    pub const NO_EMIT_ON_ERRORS: &str = "no-emit-on-errors";
    pub const HTML: &str = "html";
    pub const FRIENDLY_ERRORS: &str = "friendly-errors";
    pub const MINIFY_JS: &str = "minify-js";
    pub const EXTRACT_CSS: &str = "extract-css";
    pub const OPTIMIZE_CSS: &str = "optimize-css";
    pub const SPLIT_CHUNKS: &str = "split-chunks";
    pub const COPY_STATIC: &str = "copy-static";
    pub const COMPRESSION: &str = "compression";
    pub const BUNDLE_REPORT: &str = "bundle-report";
}

/// A single entry or an ordered list of modules bundled together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Single(String),
    Many(Vec<String>),
}

impl Entry {
    pub fn modules(&self) -> Vec<&str> {
        match self {
            Entry::Single(module) => vec![module.as_str()],
            Entry::Many(modules) => modules.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    pub dir: PathBuf,

    pub filename_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_filename_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub aliases: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl PluginSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: Value::Null,
        }
    }

    pub fn with_options(name: &str, options: Value) -> Self {
        Self {
            name: name.to_string(),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    pub entry: IndexMap<String, Entry>,

    pub output: OutputOptions,

    #[serde(default)]
    pub resolve: ResolveOptions,

    #[serde(default)]
    pub rules: Vec<PipelineRule>,

    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtool: Option<String>,
}

impl ConfigDescriptor {
    pub fn to_value(&self) -> Result<ConfigValue> {
        serde_json::to_value(self)
            .map(ConfigValue::from)
            .map_err(|e| ConfigError::InvalidDescriptor {
                message: e.to_string(),
            })
    }

    pub fn from_value(value: ConfigValue) -> Result<Self> {
        serde_json::from_value(Value::from(value)).map_err(|e| ConfigError::InvalidDescriptor {
            message: e.to_string(),
        })
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginSpec> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn plugins_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PluginSpec> {
        self.plugins.iter().filter(move |p| p.name == name)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }
}
