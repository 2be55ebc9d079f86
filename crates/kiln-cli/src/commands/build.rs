//! `kiln build`: one production build into `build.assetsRoot`.

use std::path::Path;
use std::sync::Arc;

use crate::build::BuildRunner;
use crate::bundler::ProcessBundler;
use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;
use crate::version::VersionGate;

pub async fn execute(args: BuildArgs, cwd: Option<&Path>) -> Result<()> {
    let root = utils::resolve_project_root(cwd)?;
    let mut project = utils::load_project(&root)?;
    if args.report {
        project.build.bundle_analyzer_report = true;
    }
    if args.gzip {
        project.build.production_gzip = true;
    }

    let gate = VersionGate::new(&root);
    let bundler = ProcessBundler::from_settings(&project.bundler, &root)?;
    let runner = BuildRunner::new(project, &root, Arc::new(bundler)).show_spinner(!ui::is_ci());

    let report = runner.run_gated(&gate).await?;

    for warning in &report.warnings {
        ui::warning(warning);
    }
    ui::print_build_summary(&report.summary_rows());
    eprintln!();
    ui::success("Build complete.");
    ui::tip(
        "Built files are meant to be served over an HTTP server.\n  \
         Opening index.html over file:// won't work.",
    );
    Ok(())
}
