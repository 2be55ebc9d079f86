//! End-to-end tests for production builds against a temporary project.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use kiln_cli::build::BuildRunner;
use kiln_cli::bundler::{Bundler, Compilation, CompileError};
use kiln_cli::error::{BuildError, CliError};
use kiln_cli::version::{VersionGate, VersionProbe};
use kiln_config::{plugin_names, ConfigDescriptor, Environment, ProjectConfig};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Records what it was asked to compile and returns a fixed outcome.
struct StubBundler {
    outcome: Result<Vec<(&'static str, String)>, Vec<String>>,
    seen: Mutex<Vec<(ConfigDescriptor, Environment)>>,
}

impl StubBundler {
    fn emitting(assets: Vec<(&'static str, String)>) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(assets),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(errors: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(errors.iter().map(|e| e.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Bundler for StubBundler {
    async fn compile(
        &self,
        descriptor: &ConfigDescriptor,
        environment: Environment,
    ) -> Result<Compilation, CompileError> {
        self.seen.lock().push((descriptor.clone(), environment));
        match &self.outcome {
            Ok(assets) => Ok(Compilation::from_assets(assets.clone())),
            Err(errors) => Err(CompileError::new(errors.clone())),
        }
    }
}

struct FixedProbe(&'static str);

#[async_trait]
impl VersionProbe for FixedProbe {
    async fn version(&self, _tool: &str) -> Option<String> {
        Some(self.0.to_string())
    }
}

fn project_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("static/img")).unwrap();
    fs::write(dir.path().join("static/img/logo.svg"), "<svg/>").unwrap();
    fs::write(dir.path().join("static/.gitkeep"), "").unwrap();
    dir
}

fn app_assets() -> Vec<(&'static str, String)> {
    vec![
        ("index.html", "<html><script src=/static/js/app.js></script></html>".to_string()),
        ("static/js/app.js", "export const greeting = 'hello';\n".repeat(800)),
        ("static/css/app.css", "body { margin: 0 }".to_string()),
    ]
}

fn runner(project: ProjectConfig, dir: &TempDir, bundler: Arc<StubBundler>) -> BuildRunner {
    BuildRunner::new(project, dir.path(), bundler).show_spinner(false)
}

#[tokio::test]
async fn test_failed_compile_writes_nothing() {
    let dir = project_dir();
    let stale = dir.path().join("dist/static/js/old.js");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "stale").unwrap();

    let bundler = StubBundler::failing(&["src/App.vue: Unexpected token", "src/main.js: Module not found"]);
    let result = runner(ProjectConfig::default(), &dir, bundler).run().await;

    match result {
        Err(CliError::Build(BuildError::Compile { errors })) => assert_eq!(errors.len(), 2),
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert!(!stale.exists(), "cleanup runs before compiling");
    assert!(!dir.path().join("dist/index.html").exists());
    assert!(!dir.path().join("dist/static").exists());
}

#[tokio::test]
async fn test_successful_build_writes_assets_and_static_copy() {
    let dir = project_dir();
    let bundler = StubBundler::emitting(app_assets());
    let report = runner(ProjectConfig::default(), &dir, Arc::clone(&bundler))
        .run()
        .await
        .unwrap();

    let dist = dir.path().join("dist");
    assert_eq!(report.out_dir, dist);
    assert!(dist.join("index.html").is_file());
    assert!(dist.join("static/js/app.js").is_file());
    assert!(dist.join("static/img/logo.svg").is_file());
    assert!(!dist.join("static/.gitkeep").exists());
    assert!(!dist.join("static/js/app.js.gz").exists(), "gzip is off by default");
    assert!(!dist.join("report.json").exists());

    let seen = bundler.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, Environment::Production);

    // The page is emitted into the bundler's output tree like any asset
    let html = seen[0].0.plugin(plugin_names::HTML).unwrap();
    assert_eq!(html.options["filename"], "index.html");
    assert!(report.assets.iter().any(|asset| asset.path == "index.html"));
}

#[tokio::test]
async fn test_gzip_and_report() {
    let dir = project_dir();
    let mut project = ProjectConfig::default();
    project.build.production_gzip = true;
    project.build.bundle_analyzer_report = true;

    let report = runner(project, &dir, StubBundler::emitting(app_assets()))
        .run()
        .await
        .unwrap();

    let dist = dir.path().join("dist");
    // Above the 10240 byte threshold and compressible
    assert!(dist.join("static/js/app.js.gz").is_file());
    // Below the threshold
    assert!(!dist.join("static/css/app.css.gz").exists());
    // Not in productionGzipExtensions
    assert!(!dist.join("index.html.gz").exists());

    let json: serde_json::Value =
        serde_json::from_slice(&fs::read(dist.join("report.json")).unwrap()).unwrap();
    assert!(json["assets"].as_array().unwrap().len() >= 4);

    let rows = report.summary_rows();
    let app = rows.iter().find(|row| row.name == "static/js/app.js").unwrap();
    assert!(app.gzip_size.is_some());
}

#[tokio::test]
async fn test_cleanup_only_touches_the_asset_sub_directory() {
    let dir = project_dir();
    let dist = dir.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    fs::write(dist.join("CNAME"), "example.com").unwrap();

    runner(ProjectConfig::default(), &dir, StubBundler::emitting(app_assets()))
        .run()
        .await
        .unwrap();
    assert_eq!(fs::read_to_string(dist.join("CNAME")).unwrap(), "example.com");
}

#[tokio::test]
async fn test_cleanup_failure_stops_the_build() {
    let dir = project_dir();
    let dist = dir.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    // A file where the asset directory should be cannot be removed as a tree
    fs::write(dist.join("static"), "not a directory").unwrap();

    let bundler = StubBundler::emitting(app_assets());
    let result = runner(ProjectConfig::default(), &dir, Arc::clone(&bundler)).run().await;

    match result {
        Err(CliError::Cleanup { path, .. }) => assert_eq!(path, dist.join("static")),
        other => panic!("expected a cleanup error, got {other:?}"),
    }
    assert!(bundler.seen.lock().is_empty());
}

#[tokio::test]
async fn test_version_gate_blocks_the_build() {
    let dir = project_dir();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "engines": { "node": ">=10.0.0", "npm": ">=6.0.0" } }"#,
    )
    .unwrap();

    let bundler = StubBundler::emitting(app_assets());
    let gate = VersionGate::with_probe(dir.path(), FixedProbe("8.0.0"));
    let result = runner(ProjectConfig::default(), &dir, Arc::clone(&bundler))
        .run_gated(&gate)
        .await;

    match result {
        Err(CliError::Precondition(err)) => {
            let tools: Vec<_> = err.violations.iter().map(|v| v.tool.as_str()).collect();
            assert_eq!(tools, vec!["node"]);
        }
        other => panic!("expected a precondition error, got {other:?}"),
    }
    assert!(bundler.seen.lock().is_empty());
    assert!(!dir.path().join("dist").exists());
}
