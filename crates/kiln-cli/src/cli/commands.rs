use std::net::IpAddr;

use clap::{Args, Subcommand};

use crate::cli::validation::parse_port;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Compiles the development bundle into memory, serves it with hot
    /// reload, proxies configured API paths and rebuilds on file changes.
    Start(StartArgs),

    /// Build for production
    ///
    /// Cleans the asset directory, compiles the production bundle and
    /// writes it to build.assetsRoot.
    Build(BuildArgs),
}

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on (overrides PORT and dev.port)
    #[arg(short, long, value_parser = parse_port)]
    pub port: Option<u16>,

    /// Address to bind (defaults to every interface)
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Don't open a browser even if dev.autoOpenBrowser is set
    #[arg(long)]
    pub no_open: bool,

    /// Compile once and don't rebuild on changes
    #[arg(long)]
    pub no_watch: bool,
}

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Write a bundle size report (report.json) next to the output
    #[arg(long, env = "npm_config_report")]
    pub report: bool,

    /// Write gzip copies of matching assets
    #[arg(long)]
    pub gzip: bool,
}
