//! Spinner for work of unknown duration (a bundler run, a cleanup).

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

/// A running spinner. Dropping it without `finish`/`fail` leaves the line as is.
///
/// ```no_run
/// use kiln_cli::ui::Spinner;
///
/// let spinner = Spinner::new("Building for production...");
/// spinner.finish("Compiled 4 assets");
/// ```
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// A spinner that draws nothing, for `--quiet` and non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    /// Stop with a green check.
    pub fn finish(&self, message: &str) {
        self.pb
            .finish_with_message(format!("{} {}", "✓".green(), message));
    }

    /// Stop with a red cross.
    pub fn fail(&self, message: &str) {
        self.pb
            .finish_with_message(format!("{} {}", "✗".red(), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_finish() {
        let spinner = Spinner::new("Building for production...");
        spinner.set_message("Writing assets");
        spinner.finish("Compiled");
    }

    #[test]
    fn test_hidden_spinner_fail() {
        let spinner = Spinner::hidden();
        spinner.fail("Compilation failed");
    }
}
