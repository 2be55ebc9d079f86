//! The seam between kiln and whatever actually bundles the application.
//!
//! kiln never resolves modules or generates code itself. It hands a merged
//! [`ConfigDescriptor`] to a [`Bundler`] and gets back either a
//! [`Compilation`] (the emitted assets, keyed by output-relative path) or a
//! [`CompileError`] with the diagnostics.
//!
//! [`ProcessBundler`] is the production implementation: it runs an external
//! program configured under `[bundler]`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use indexmap::IndexMap;
use kiln_config::{BundlerSettings, ConfigDescriptor, Environment, NODE_ENV};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::BuildError;

/// Variable pointing the bundler at the descriptor file.
pub const DESCRIPTOR_ENV: &str = "KILN_DESCRIPTOR";
/// Variable naming the directory the bundler must emit into.
pub const OUT_DIR_ENV: &str = "KILN_OUT_DIR";

/// One successful bundler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compilation {
    assets: IndexMap<String, Vec<u8>>,
    hash: String,
    warnings: Vec<String>,
}

impl Compilation {
    /// Build a compilation from emitted files. Paths are normalized to
    /// forward slashes without a leading `/`.
    pub fn from_assets<P, B>(assets: impl IntoIterator<Item = (P, B)>) -> Self
    where
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let assets: IndexMap<String, Vec<u8>> = assets
            .into_iter()
            .map(|(path, bytes)| (normalize_asset_path(path.as_ref()), bytes.into()))
            .collect();

        let mut hasher = blake3::Hasher::new();
        for (path, bytes) in &assets {
            hasher.update(path.as_bytes());
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        let hash = hasher.finalize().to_hex().as_str()[..20].to_string();

        Self {
            assets,
            hash,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn assets(&self) -> &IndexMap<String, Vec<u8>> {
        &self.assets
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.assets
            .get(&normalize_asset_path(path))
            .map(Vec::as_slice)
    }

    /// Content hash over every path and byte emitted.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.assets.values().map(|bytes| bytes.len() as u64).sum()
    }
}

/// Diagnostics from a failed bundler run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .errors.join("\n\n"))]
pub struct CompileError {
    pub errors: Vec<String>,
}

impl CompileError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }
}

impl From<CompileError> for BuildError {
    fn from(err: CompileError) -> Self {
        BuildError::Compile { errors: err.errors }
    }
}

/// Turns a descriptor into emitted assets.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn compile(
        &self,
        descriptor: &ConfigDescriptor,
        environment: Environment,
    ) -> Result<Compilation, CompileError>;
}

/// Runs an external bundler program.
///
/// The descriptor is written as JSON to a temp file and the program is run
/// from the project root with `args --config <file>`. `KILN_DESCRIPTOR`,
/// `KILN_OUT_DIR` and `NODE_ENV` are set for it. Exit status 0 means the
/// staging directory holds the compilation; anything else turns its output
/// into diagnostics.
#[derive(Debug, Clone)]
pub struct ProcessBundler {
    program: String,
    args: Vec<String>,
    root: PathBuf,
}

impl ProcessBundler {
    pub fn new(program: impl Into<String>, args: Vec<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            root: root.into(),
        }
    }

    pub fn from_settings(settings: &BundlerSettings, root: &Path) -> Result<Self, BuildError> {
        let program = settings
            .program
            .as_deref()
            .filter(|program| !program.trim().is_empty())
            .ok_or(BuildError::BundlerNotConfigured)?;
        Ok(Self::new(program, settings.args.clone(), root))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Bundler for ProcessBundler {
    async fn compile(
        &self,
        descriptor: &ConfigDescriptor,
        environment: Environment,
    ) -> Result<Compilation, CompileError> {
        let staging = tempfile::Builder::new()
            .prefix("kiln-out-")
            .tempdir()
            .map_err(|e| CompileError::single(format!("Failed to create staging directory: {e}")))?;
        let descriptor_file = tempfile::Builder::new()
            .prefix("kiln-descriptor-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| CompileError::single(format!("Failed to create descriptor file: {e}")))?;

        let json = serde_json::to_vec_pretty(descriptor)
            .map_err(|e| CompileError::single(format!("Failed to serialize descriptor: {e}")))?;
        tokio::fs::write(descriptor_file.path(), json)
            .await
            .map_err(|e| CompileError::single(format!("Failed to write descriptor: {e}")))?;

        debug!(
            program = %self.program,
            environment = %environment,
            out_dir = %staging.path().display(),
            "running bundler"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--config")
            .arg(descriptor_file.path())
            .env(DESCRIPTOR_ENV, descriptor_file.path())
            .env(OUT_DIR_ENV, staging.path())
            .env(NODE_ENV, environment.as_str())
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                CompileError::single(format!("Failed to run bundler `{}`: {e}", self.program))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let mut errors = diagnostics(&stderr);
            if errors.is_empty() {
                errors = diagnostics(&stdout);
            }
            if errors.is_empty() {
                errors.push(format!("Bundler exited with {}", output.status));
            }
            return Err(CompileError::new(errors));
        }

        let out_dir = staging.path().to_path_buf();
        let assets = tokio::task::spawn_blocking(move || read_tree(&out_dir))
            .await
            .map_err(|e| CompileError::single(format!("Failed to collect assets: {e}")))??;

        Ok(Compilation::from_assets(assets).with_warnings(diagnostics(&stderr)))
    }
}

/// Blank-line separated blocks, one diagnostic each.
fn diagnostics(output: &str) -> Vec<String> {
    output
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_tree(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, CompileError> {
    let mut assets = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CompileError::single(format!("Failed to read output: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| CompileError::single(e.to_string()))?;
        let bytes = std::fs::read(entry.path()).map_err(|e| {
            CompileError::single(format!("Failed to read {}: {e}", entry.path().display()))
        })?;
        assets.push((relative.to_string_lossy().into_owned(), bytes));
    }
    Ok(assets)
}

fn normalize_asset_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}
