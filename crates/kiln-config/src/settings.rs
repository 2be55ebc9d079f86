//! Project settings read from `kiln.toml` or the `kiln` field of `package.json`.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::environment::{Environment, NODE_ENV};
use crate::paths::PathPolicy;
use crate::proxy::ProxyEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub dev: DevSettings,
    pub build: BuildSettings,
    pub test: TestSettings,
    pub bundler: BundlerSettings,
}

impl ProjectConfig {
    pub fn path_policy(&self) -> PathPolicy {
        PathPolicy::new(
            self.dev.assets_sub_directory.clone(),
            self.build.assets_sub_directory.clone(),
        )
    }

    /// Compile-time constants injected for `environment`.
    pub fn env_for(&self, environment: Environment) -> &IndexMap<String, String> {
        match environment {
            Environment::Development => &self.dev.env,
            Environment::Production => &self.build.env,
            Environment::Testing => &self.test.env,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevSettings {
    pub env: IndexMap<String, String>,
    pub port: u16,
    pub auto_open_browser: bool,
    pub assets_sub_directory: String,
    pub assets_public_path: String,
    pub proxy_table: IndexMap<String, ProxyEntry>,
    pub css_source_map: bool,

    /// Local directory served under `<assetsPublicPath>/<assetsSubDirectory>`
    pub static_dir: PathBuf,

    /// Paths watched for rebuilds, relative to the project root
    pub watch: Vec<PathBuf>,
    pub debounce_ms: u64,
}

impl Default for DevSettings {
    fn default() -> Self {
        Self {
            env: node_env("development"),
            port: 8080,
            auto_open_browser: true,
            assets_sub_directory: "static".to_string(),
            assets_public_path: "/".to_string(),
            proxy_table: IndexMap::new(),
            css_source_map: false,
            static_dir: PathBuf::from("static"),
            watch: vec![PathBuf::from("src"), PathBuf::from("index.html")],
            debounce_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildSettings {
    pub env: IndexMap<String, String>,
    pub index: PathBuf,
    pub assets_root: PathBuf,
    pub assets_sub_directory: String,
    pub assets_public_path: String,
    pub production_source_map: bool,
    pub production_gzip: bool,
    pub production_gzip_extensions: Vec<String>,
    pub bundle_analyzer_report: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            env: node_env("production"),
            index: PathBuf::from("dist/index.html"),
            assets_root: PathBuf::from("dist"),
            assets_sub_directory: "static".to_string(),
            assets_public_path: "/".to_string(),
            production_source_map: true,
            production_gzip: false,
            production_gzip_extensions: vec!["js".to_string(), "css".to_string()],
            bundle_analyzer_report: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSettings {
    pub env: IndexMap<String, String>,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            env: node_env("testing"),
        }
    }
}

/// External program that turns a descriptor into emitted assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerSettings {
    pub program: Option<String>,
    pub args: Vec<String>,
}

/// Values are source literals, so strings carry their own quotes.
fn node_env(name: &str) -> IndexMap<String, String> {
    IndexMap::from([(NODE_ENV.to_string(), format!("\"{name}\""))])
}
