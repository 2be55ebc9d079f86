//! Miette diagnostic conversion for CLI errors.

use crate::error::{BuildError, CliError};
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => build_error_to_miette(e),
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        CliError::Precondition(e) => miette::miette!(
            code = "kiln::precondition",
            "{}",
            e
        ),
        _ => miette::miette!("{}", err),
    }
}

/// Convert BuildError to miette Report
pub fn build_error_to_miette(err: BuildError) -> Report {
    match err {
        BuildError::Compile { errors } => miette::miette!(
            code = "kiln::compile",
            help = "Fix the errors above and run the build again",
            "Build failed with {} error(s):\n\n{}",
            errors.len(),
            errors.join("\n\n")
        ),
        _ => miette::miette!("{}", err),
    }
}
