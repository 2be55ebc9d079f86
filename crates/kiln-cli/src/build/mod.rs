//! Production builds.
//!
//! [`BuildRunner::run`] cleans the asset sub directory, compiles the
//! production descriptor once and, only when that succeeds, writes the
//! bundle and runs the post-emit plugins. A failed compile leaves the
//! output directory exactly as the cleanup left it.

pub mod plugins;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_config::{ConfigMerger, Environment, ProjectConfig};
use tracing::{debug, info};

use crate::bundler::{Bundler, Compilation};
use crate::error::{BuildError, CliError, Result};
use crate::ui::{self, Spinner, SummaryRow};
use crate::version::{VersionGate, VersionProbe};

pub use plugins::{post_emit_plugins, EmitContext, EmitPlugin, EmittedAsset};

/// What a successful build wrote.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub out_dir: PathBuf,
    pub hash: String,
    pub assets: Vec<EmittedAsset>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(|asset| asset.size).sum()
    }

    /// One row per asset; `.gz` copies fold into their original's row.
    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        let mut rows: Vec<SummaryRow> = self
            .assets
            .iter()
            .filter(|asset| !self.is_gzip_copy(&asset.path))
            .map(|asset| SummaryRow {
                name: asset.path.clone(),
                size: asset.size,
                gzip_size: self
                    .assets
                    .iter()
                    .find(|gz| gz.path == format!("{}.gz", asset.path))
                    .map(|gz| gz.size),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    fn is_gzip_copy(&self, path: &str) -> bool {
        path.strip_suffix(".gz")
            .is_some_and(|original| self.assets.iter().any(|asset| asset.path == original))
    }
}

pub struct BuildRunner {
    project: ProjectConfig,
    root: PathBuf,
    bundler: Arc<dyn Bundler>,
    show_spinner: bool,
}

impl BuildRunner {
    pub fn new(project: ProjectConfig, root: impl Into<PathBuf>, bundler: Arc<dyn Bundler>) -> Self {
        Self {
            project,
            root: root.into(),
            bundler,
            show_spinner: true,
        }
    }

    pub fn show_spinner(mut self, show: bool) -> Self {
        self.show_spinner = show;
        self
    }

    /// `<root>/<assetsRoot>`
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.project.build.assets_root)
    }

    /// `<root>/<assetsRoot>/<assetsSubDirectory>`, the directory cleaned
    /// before each build.
    pub fn assets_dir(&self) -> PathBuf {
        self.out_dir().join(&self.project.build.assets_sub_directory)
    }

    /// Check tool versions, then build.
    pub async fn run_gated<P: VersionProbe>(&self, gate: &VersionGate<P>) -> Result<BuildReport> {
        gate.check().await?;
        self.run().await
    }

    pub async fn run(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let descriptor = ConfigMerger::new(&self.project, &self.root).prod_config()?;
        let emitters = post_emit_plugins(&descriptor)?;

        let assets_dir = self.assets_dir();
        tokio::task::spawn_blocking(move || clean(&assets_dir))
            .await
            .map_err(|e| CliError::Custom(format!("cleanup panicked: {e}")))??;

        let spinner = if self.show_spinner {
            Spinner::new("Building for production...")
        } else {
            Spinner::hidden()
        };

        let compilation = match self.bundler.compile(&descriptor, Environment::Production).await {
            Ok(compilation) => compilation,
            Err(err) => {
                spinner.fail("Build failed with errors.");
                return Err(BuildError::from(err).into());
            }
        };
        spinner.set_message("Writing assets...");

        let out_dir = self.out_dir();
        let hash = compilation.hash().to_string();
        let warnings = compilation.warnings().to_vec();
        let assets = tokio::task::spawn_blocking(move || emit(&out_dir, &compilation, &emitters))
            .await
            .map_err(|e| CliError::Custom(format!("asset writer panicked: {e}")))?;

        let assets = match assets {
            Ok(assets) => assets,
            Err(err) => {
                spinner.fail("Failed to write the build output.");
                return Err(err.into());
            }
        };

        let duration = started.elapsed();
        spinner.finish(&format!(
            "Built {} assets in {}",
            assets.len(),
            ui::format_duration(duration)
        ));
        info!(%hash, assets = assets.len(), "build finished");

        Ok(BuildReport {
            out_dir: self.out_dir(),
            hash,
            assets,
            warnings,
            duration,
        })
    }
}

/// Remove `dir` and everything below it. A missing directory is fine.
pub fn clean(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "cleaned");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CliError::Cleanup {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

fn emit(
    out_dir: &Path,
    compilation: &Compilation,
    emitters: &[Box<dyn EmitPlugin>],
) -> std::result::Result<Vec<EmittedAsset>, BuildError> {
    let mut cx = EmitContext::new(out_dir);
    for (path, bytes) in compilation.assets() {
        cx.write(path, bytes)?;
    }
    for plugin in emitters {
        debug!(plugin = plugin.name(), "running post-emit plugin");
        plugin.apply(&mut cx)?;
    }
    Ok(cx.assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(paths: &[(&str, u64)]) -> BuildReport {
        BuildReport {
            out_dir: PathBuf::from("dist"),
            hash: String::new(),
            assets: paths
                .iter()
                .map(|(path, size)| EmittedAsset {
                    path: path.to_string(),
                    size: *size,
                })
                .collect(),
            warnings: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_clean_missing_dir_is_ok() {
        let dir = TempDir::new().unwrap();
        clean(&dir.path().join("dist/static")).unwrap();
    }

    #[test]
    fn test_clean_removes_tree() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("dist/static/js");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("old.js"), "old").unwrap();

        clean(&dir.path().join("dist/static")).unwrap();
        assert!(!dir.path().join("dist/static").exists());
        assert!(dir.path().join("dist").exists());
    }

    #[test]
    fn test_summary_folds_gzip_copies() {
        let report = report(&[
            ("static/js/app.js", 30_000),
            ("static/js/app.js.gz", 9_000),
            ("index.html", 400),
            ("archive.gz", 10),
        ]);
        let rows = report.summary_rows();
        assert_eq!(rows.len(), 3);
        let app = rows.iter().find(|row| row.name == "static/js/app.js").unwrap();
        assert_eq!(app.gzip_size, Some(9_000));
        assert!(rows.iter().any(|row| row.name == "archive.gz"));
        assert_eq!(report.total_size(), 39_410);
    }
}
