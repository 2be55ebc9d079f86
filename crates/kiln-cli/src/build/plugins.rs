//! Post-emit plugins: steps that run on the output directory after the
//! bundler's assets are written.
//!
//! The descriptor lists them like any other plugin; [`post_emit_plugins`]
//! picks out the ones this side runs, in descriptor order. Everything else
//! in `plugins` belongs to the bundler.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use globset::{Glob, GlobSet, GlobSetBuilder};
use kiln_config::{plugin_names, ConfigDescriptor, PluginSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::BuildError;

/// A file written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedAsset {
    /// Forward-slash path relative to the output directory
    pub path: String,
    pub size: u64,
}

/// Output directory plus everything written to it so far.
#[derive(Debug)]
pub struct EmitContext {
    pub out_dir: PathBuf,
    pub assets: Vec<EmittedAsset>,
}

impl EmitContext {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            assets: Vec::new(),
        }
    }

    /// Write `bytes` at `relative`, creating parents, and record it.
    pub fn write(&mut self, relative: &str, bytes: &[u8]) -> Result<(), BuildError> {
        let target = self.out_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failed(&target, e))?;
        }
        fs::write(&target, bytes).map_err(|e| write_failed(&target, e))?;

        self.assets.retain(|asset| asset.path != relative);
        self.assets.push(EmittedAsset {
            path: relative.to_string(),
            size: bytes.len() as u64,
        });
        Ok(())
    }

    pub fn get(&self, relative: &str) -> Option<&EmittedAsset> {
        self.assets.iter().find(|asset| asset.path == relative)
    }
}

fn write_failed(path: &Path, err: std::io::Error) -> BuildError {
    BuildError::AssetWriteFailed(format!("{}: {err}", path.display()))
}

pub trait EmitPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, cx: &mut EmitContext) -> Result<(), BuildError>;
}

/// The post-emit plugins named in `descriptor`, in order.
pub fn post_emit_plugins(descriptor: &ConfigDescriptor) -> Result<Vec<Box<dyn EmitPlugin>>, BuildError> {
    let mut plugins: Vec<Box<dyn EmitPlugin>> = Vec::new();
    for spec in &descriptor.plugins {
        let plugin: Box<dyn EmitPlugin> = match spec.name.as_str() {
            plugin_names::COPY_STATIC => Box::new(CopyStatic::from_spec(spec)?),
            plugin_names::COMPRESSION => Box::new(Compression::from_spec(spec)?),
            plugin_names::BUNDLE_REPORT => Box::new(BundleReport::from_spec(spec)?),
            _ => continue,
        };
        plugins.push(plugin);
    }
    Ok(plugins)
}

fn options<T: for<'de> Deserialize<'de>>(spec: &PluginSpec) -> Result<T, BuildError> {
    let value = if spec.options.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        spec.options.clone()
    };
    serde_json::from_value(value).map_err(|e| BuildError::PluginFailed {
        plugin: spec.name.clone(),
        message: format!("invalid options: {e}"),
    })
}

fn failed(plugin: &str, message: impl std::fmt::Display) -> BuildError {
    BuildError::PluginFailed {
        plugin: plugin.to_string(),
        message: message.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct CopyStaticOptions {
    from: PathBuf,
    #[serde(default)]
    to: String,
    #[serde(default)]
    ignore: Vec<String>,
}

/// Copies the project's static directory into the output.
pub struct CopyStatic {
    from: PathBuf,
    to: String,
    ignore: GlobSet,
}

impl CopyStatic {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self, BuildError> {
        let options: CopyStaticOptions = options(spec)?;
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.ignore {
            builder.add(Glob::new(pattern).map_err(|e| failed(plugin_names::COPY_STATIC, e))?);
        }
        Ok(Self {
            from: options.from,
            to: options.to.trim_matches('/').to_string(),
            ignore: builder.build().map_err(|e| failed(plugin_names::COPY_STATIC, e))?,
        })
    }

    /// Patterns apply to each path segment, so `.*` skips dot-directories
    /// along with dotfiles.
    fn ignored(&self, name: &str) -> bool {
        self.ignore.is_match(name)
    }
}

impl EmitPlugin for CopyStatic {
    fn name(&self) -> &'static str {
        plugin_names::COPY_STATIC
    }

    fn apply(&self, cx: &mut EmitContext) -> Result<(), BuildError> {
        if !self.from.is_dir() {
            debug!(from = %self.from.display(), "no static directory to copy");
            return Ok(());
        }

        let walker = WalkDir::new(&self.from)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !self.ignored(&entry.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry.map_err(|e| failed(self.name(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.from)
                .map_err(|e| failed(self.name(), e))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let target = if self.to.is_empty() {
                relative
            } else {
                format!("{}/{}", self.to, relative)
            };

            let bytes = fs::read(entry.path()).map_err(|e| failed(self.name(), e))?;
            cx.write(&target, &bytes)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompressionOptions {
    #[serde(default = "default_asset")]
    asset: String,
    #[serde(default = "default_algorithm")]
    algorithm: String,
    test: String,
    #[serde(default)]
    threshold: u64,
    #[serde(default = "default_min_ratio")]
    min_ratio: f64,
}

fn default_asset() -> String {
    "[path].gz[query]".to_string()
}

fn default_algorithm() -> String {
    "gzip".to_string()
}

fn default_min_ratio() -> f64 {
    0.8
}

/// Writes a gzip copy next to each matching asset that is big enough and
/// actually shrinks.
pub struct Compression {
    asset: String,
    test: Regex,
    threshold: u64,
    min_ratio: f64,
}

impl Compression {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self, BuildError> {
        let options: CompressionOptions = options(spec)?;
        if options.algorithm != "gzip" {
            return Err(failed(
                plugin_names::COMPRESSION,
                format!("unsupported algorithm '{}'", options.algorithm),
            ));
        }
        Ok(Self {
            asset: options.asset,
            test: Regex::new(&options.test).map_err(|e| failed(plugin_names::COMPRESSION, e))?,
            threshold: options.threshold,
            min_ratio: options.min_ratio,
        })
    }

    fn target_name(&self, path: &str) -> String {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, format!("?{query}")),
            None => (path, String::new()),
        };
        self.asset.replace("[path]", path).replace("[query]", &query)
    }

    fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), GzLevel::best());
        encoder.write_all(bytes)?;
        encoder.finish()
    }
}

impl EmitPlugin for Compression {
    fn name(&self) -> &'static str {
        plugin_names::COMPRESSION
    }

    fn apply(&self, cx: &mut EmitContext) -> Result<(), BuildError> {
        let candidates: Vec<EmittedAsset> = cx
            .assets
            .iter()
            .filter(|asset| self.test.is_match(&asset.path) && asset.size >= self.threshold)
            .cloned()
            .collect();

        for asset in candidates {
            let bytes = fs::read(cx.out_dir.join(&asset.path)).map_err(|e| failed(self.name(), e))?;
            let compressed = Self::gzip(&bytes).map_err(|e| failed(self.name(), e))?;

            let ratio = compressed.len() as f64 / bytes.len().max(1) as f64;
            if ratio > self.min_ratio {
                debug!(path = %asset.path, ratio, "not worth compressing");
                continue;
            }
            cx.write(&self.target_name(&asset.path), &compressed)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BundleReportOptions {
    #[serde(default = "default_report")]
    filename: String,
}

fn default_report() -> String {
    "report.json".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    total_size: u64,
    assets: &'a [EmittedAsset],
}

/// Writes a JSON size report of everything emitted before it.
pub struct BundleReport {
    filename: String,
}

impl BundleReport {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self, BuildError> {
        let options: BundleReportOptions = options(spec)?;
        Ok(Self {
            filename: options.filename,
        })
    }
}

impl EmitPlugin for BundleReport {
    fn name(&self) -> &'static str {
        plugin_names::BUNDLE_REPORT
    }

    fn apply(&self, cx: &mut EmitContext) -> Result<(), BuildError> {
        let mut assets = cx.assets.clone();
        assets.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

        let report = Report {
            total_size: assets.iter().map(|asset| asset.size).sum(),
            assets: &assets,
        };
        let json = serde_json::to_vec_pretty(&report).map_err(|e| failed(self.name(), e))?;
        cx.write(&self.filename, &json)
    }
}
