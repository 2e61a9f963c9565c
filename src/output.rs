//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored event lines,
//! the destination folder check, the live counter spinner and the session
//! summary. This module abstracts away output details, making it easy to
//! change formatting globally.

use crate::events::{LogEvent, Severity, StatsSnapshot};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
///
/// Severity decides the color of an event line:
/// - Success in green with ✓
/// - Error in red with ✗
/// - Warning in yellow with ⚠
/// - Info in cyan
pub struct OutputFormatter;

impl OutputFormatter {
    /// Formats an event as a single colored line with an `[HH:MM:SS]` prefix.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortwatch::events::{EventKind, LogEvent};
    /// use sortwatch::output::OutputFormatter;
    ///
    /// let event = LogEvent::new(EventKind::NoRule { filename: "data.xyz".into() });
    /// println!("{}", OutputFormatter::event_line(&event));
    /// ```
    pub fn event_line(event: &LogEvent) -> String {
        let timestamp = format!("[{}]", event.timestamp.format("%H:%M:%S")).dimmed();
        let message = event.kind.message();
        let body = match event.severity {
            Severity::Success => format!("{} {}", "✓".green(), message.green()),
            Severity::Error => format!("{} {}", "✗".red(), message.red()),
            Severity::Warning => format!("{} {}", "⚠".yellow(), message.yellow()),
            Severity::Info => message.cyan().to_string(),
        };
        format!("{} {}", timestamp, body)
    }

    /// Formats an event as one JSON line.
    pub fn event_json(event: &LogEvent) -> String {
        serde_json::to_string(event).unwrap_or_else(|e| {
            format!(
                "{{\"kind\":\"serialization-error\",\"detail\":{:?}}}",
                e.to_string()
            )
        })
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning in yellow with a warning sign.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message.yellow());
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints whether a folder exists, e.g. `✓ Pictures folder exists`.
    pub fn folder_status(path: &Path, exists: bool) {
        let name = crate::rules::directory_name(path);
        if exists {
            println!("{} {} folder exists", "✓".green(), name);
        } else {
            println!(
                "{} {} folder not found ({})",
                "✗".yellow(),
                name,
                path.display().to_string().dimmed()
            );
        }
    }

    /// Creates a spinner showing the live counters while monitoring.
    pub fn create_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Short counters line used as the spinner message.
    pub fn stats_line(stats: &StatsSnapshot) -> String {
        format!(
            "Watching… moved: {}  duplicates: {}  errors: {}",
            stats.files_moved.to_string().green(),
            stats.duplicates_handled.to_string().yellow(),
            stats.errors.to_string().red()
        )
    }

    /// Prints a summary table of the session counters.
    pub fn summary_table(stats: &StatsSnapshot) {
        Self::header("SUMMARY");

        let rows = [
            ("Files moved", stats.files_moved),
            ("Duplicates handled", stats.duplicates_handled),
            ("Errors", stats.errors),
        ];
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let count = if label == "Errors" && count > 0 {
                count.to_string().red()
            } else {
                count.to_string().green()
            };
            println!("{:<width$} | {}", label, count, width = width);
        }
        println!("{}", "-".repeat(width + 10));
    }
}
