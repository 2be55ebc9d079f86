//! `kiln start`: run the development server until Ctrl+C.

use std::path::Path;
use std::sync::Arc;

use kiln_config::{Environment, NODE_ENV};
use tokio::signal;

use crate::bundler::ProcessBundler;
use crate::cli::StartArgs;
use crate::commands::utils;
use crate::dev::DevServer;
use crate::error::Result;
use crate::ui;
use crate::version::VersionGate;

/// 1. Load settings and pick the environment (`NODE_ENV`, else `dev.env`)
/// 2. Check `engines` against the installed tools
/// 3. Bind the port and compile
/// 4. Once the first compile succeeds, print the URL and maybe open a browser
/// 5. Serve until Ctrl+C
pub async fn execute(args: StartArgs, cwd: Option<&Path>) -> Result<()> {
    let root = utils::resolve_project_root(cwd)?;
    let project = utils::load_project(&root)?;

    let configured = project
        .dev
        .env
        .get(NODE_ENV)
        .map(|value| value.parse::<Environment>())
        .transpose()?
        .unwrap_or_default();
    let environment = Environment::from_env_or(configured)?;

    VersionGate::new(&root).check().await?;
    let bundler = ProcessBundler::from_settings(&project.bundler, &root)?;

    let open = project.dev.auto_open_browser && !args.no_open && environment != Environment::Testing;

    let mut server = DevServer::new(project, &root, Arc::new(bundler))
        .environment(environment)
        .watch(!args.no_watch);
    if let Some(port) = args.port {
        server = server.port(port);
    }
    if let Some(host) = args.host {
        server = server.host(host);
    }

    ui::info(&format!("Starting dev server ({environment})..."));
    let pending = server.listen().await?;

    let mut lifecycle = pending.state().subscribe();
    tokio::select! {
        _ = lifecycle.wait_for(|stage| stage.is_ready()) => {}
        _ = signal::ctrl_c() => {
            ui::info("Shutting down dev server...");
            return pending.close().await;
        }
    }
    let handle = pending.ready().await?;

    let url = handle.url();
    ui::success(&format!("Your application is running here: {url}"));
    if open {
        open_browser(&url);
    }
    ui::info("Press Ctrl+C to stop");

    signal::ctrl_c().await?;
    ui::info("Shutting down dev server...");
    handle.close().await?;
    ui::success("Dev server stopped");
    Ok(())
}

fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    if let Err(e) = result {
        ui::warning(&format!("Failed to open browser: {e}"));
    }
}
