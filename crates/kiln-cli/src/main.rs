//! kiln entry point: parse arguments, set up logging and colors, dispatch.

use clap::Parser;
use kiln_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    if args.no_color {
        ui::disable_colors();
    } else {
        ui::init_colors();
    }

    let cwd = args.cwd.as_deref();
    let result = match args.command {
        cli::Command::Start(start_args) => commands::start_execute(start_args, cwd).await,
        cli::Command::Build(build_args) => commands::build_execute(build_args, cwd).await,
    };

    result.map_err(error::cli_error_to_miette)
}
