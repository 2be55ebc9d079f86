//! Command-line interface, defined with clap's derive macros.
//!
//! - `kiln start` - development server with hot reload and proxying
//! - `kiln build` - production build into `build.assetsRoot`

mod commands;
mod validation;

use std::path::PathBuf;

use clap::Parser;

pub use commands::{BuildArgs, Command, StartArgs};
pub use validation::parse_port;

/// kiln - dev server and production builds for front-end projects
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Dev server and production builds for front-end projects",
    long_about = "kiln composes bundler configuration for development, production and testing,\n\
                  serves the development bundle from memory with hot reload and an API proxy,\n\
                  and runs production builds with compression and size reports."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}
