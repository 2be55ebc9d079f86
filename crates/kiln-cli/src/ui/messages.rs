//! One-line status messages on stderr.

use owo_colors::OwoColorize;

/// Print a success message.
///
/// ```no_run
/// kiln_cli::ui::success("Build complete.");
/// ```
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Dimmed hint shown after a successful command.
pub fn tip(message: &str) {
    eprintln!("  {} {}", "Tip:".cyan().bold(), message.dimmed());
}

/// Only printed when `RUST_LOG` is set.
pub fn debug(message: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        eprintln!("{} {}", "◆".dimmed(), message.dimmed());
    }
}
