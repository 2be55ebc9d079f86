//! Terminal output for the kiln CLI.
//!
//! Status lines go to stderr with owo-colors; long-running work shows an
//! indicatif spinner; the build stats table is sized to the terminal with
//! `console`. Colors degrade automatically off a TTY.
//!
//! ```no_run
//! use kiln_cli::ui;
//!
//! ui::init_colors();
//! let spinner = ui::Spinner::new("Building for production...");
//! spinner.finish("Compiled");
//! ui::success("Build complete.");
//! ```

mod format;
mod messages;
mod spinner;

pub use format::{format_duration, format_size, print_build_summary, SummaryRow};
pub use messages::{debug, error, info, success, tip, warning};
pub use spinner::Spinner;

/// Whether we're running under CI (GitHub Actions, GitLab, CircleCI, Travis).
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var(var).is_ok())
}

/// Whether stderr output should be colored.
///
/// `NO_COLOR` wins over `FORCE_COLOR`; otherwise we color only when a person
/// is watching stderr.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Apply the color decision globally. Call once from `main`.
pub fn init_colors() {
    let enabled = should_use_color();
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}

/// Disable colors regardless of the environment (`--no-color`).
pub fn disable_colors() {
    console::set_colors_enabled(false);
    console::set_colors_enabled_stderr(false);
    std::env::set_var("NO_COLOR", "1");
}
