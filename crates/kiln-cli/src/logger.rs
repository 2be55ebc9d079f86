//! Logging setup for the kiln CLI.
//!
//! Everything logs through `tracing`. The subscriber is installed once from
//! `main`, with the level picked from the global flags:
//!
//! 1. `--verbose`: DEBUG for kiln crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`, when set
//! 4. INFO for kiln crates otherwise
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::logger::init_logger;
//! use tracing::info;
//!
//! init_logger(false, false, false);
//! info!("Starting dev server");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERBOSE_FILTER: &str = "kiln=debug,kiln_cli=debug,kiln_config=debug";
const QUIET_FILTER: &str = "kiln=error,kiln_cli=error,kiln_config=error";
const DEFAULT_FILTER: &str = "kiln=info,kiln_cli=info,kiln_config=info";

/// Pick the filter for the given flags. `verbose` wins over `quiet`.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Install the global subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // try_init: a second install (tests, embedding) is not an error
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Whether colored output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::Term::stdout().features().colors_supported()
}
