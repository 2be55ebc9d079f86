//! Sizes, durations and the build stats table.

use console::Term;
use owo_colors::OwoColorize;
use std::time::Duration;

/// Bytes in the largest unit that keeps the number at or above 1.
///
/// ```
/// use kiln_cli::ui::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(10_240), "10.00 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// `850ms`, `1.50s` or `2m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

/// One line of the build stats table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub name: String,
    pub size: u64,
    /// Size of the `.gz` copy, when one was written
    pub gzip_size: Option<u64>,
}

/// Print the build stats table to stderr, sized to the terminal.
///
/// ```no_run
/// use kiln_cli::ui::{print_build_summary, SummaryRow};
///
/// print_build_summary(&[SummaryRow {
///     name: "static/js/app.3f2a.js".to_string(),
///     size: 15_234,
///     gzip_size: Some(5_120),
/// }]);
/// ```
pub fn print_build_summary(rows: &[SummaryRow]) {
    let term = Term::stderr();
    let width = (term.size().1 as usize).min(80);
    let name_width = rows
        .iter()
        .map(|row| row.name.len())
        .max()
        .unwrap_or(0)
        .min(width.saturating_sub(24));

    eprintln!("\n{}", "Build Summary".bold().underline());
    eprintln!("{}", "─".repeat(width));

    for row in rows {
        let gzip = row
            .gzip_size
            .map(|size| format!("gzip {}", format_size(size)))
            .unwrap_or_default();
        eprintln!(
            "  {} {:<name_width$} {:>10} {}",
            "▸".blue(),
            row.name.bright_white().bold(),
            format_size(row.size).dimmed(),
            gzip.dimmed(),
        );
    }

    eprintln!("{}", "─".repeat(width));

    let total_size: u64 = rows.iter().map(|row| row.size).sum();
    eprintln!(
        "  {} {} in {} files",
        "Total:".bold(),
        format_size(total_size).green(),
        rows.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_zero() {
        assert_eq!(format_size(0), "0 B");
    }

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(1), "1 B");
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_kilobytes() {
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(10_240), "10.00 KB");
    }

    #[test]
    fn test_format_size_megabytes() {
        assert_eq!(format_size(1_048_576), "1.00 MB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
        assert_eq!(format_size(10_485_760), "10.00 MB");
    }

    #[test]
    fn test_format_size_gigabytes() {
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn test_format_duration_milliseconds() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "60.00s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "61m 1s");
    }

    #[test]
    fn test_print_build_summary() {
        let rows = vec![
            SummaryRow {
                name: "static/js/app.js".to_string(),
                size: 15_234,
                gzip_size: Some(5_000),
            },
            SummaryRow {
                name: "index.html".to_string(),
                size: 512,
                gzip_size: None,
            },
        ];

        // Should not panic
        print_build_summary(&rows);
    }

    #[test]
    fn test_print_build_summary_empty() {
        // Should handle empty input gracefully
        print_build_summary(&[]);
    }
}
