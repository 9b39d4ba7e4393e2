//! Output formatting for CLI commands.
//!
//! Formatters return strings; the binary decides where they go. Diffs and
//! reports belong on stdout, messages and warnings on stderr.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::planner::{AppReport, ApplyOutcome, Marker};
use crate::push::PushReport;
use crate::render::{DiffLine, DiffRenderer, RenderedDiff};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Application row for the summary table.
#[derive(Tabled)]
struct AppSummaryRow {
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Applied")]
    applied: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns the configured format.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Formats a push report: one diff per application, then a summary.
    #[must_use]
    pub fn format_push(&self, report: &PushReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_push_text(report),
        }
    }

    fn format_push_text(report: &PushReport) -> String {
        let mut output = String::new();
        let renderer = DiffRenderer::new();

        for app in &report.apps {
            let _ = writeln!(output, "{}", app.app.bold());
            output.push_str(&Self::format_diff_text(&renderer.render(&app.changeset)));
            output.push('\n');
        }

        let rows: Vec<AppSummaryRow> = report.apps.iter().map(Self::summary_row).collect();
        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        for app in &report.apps {
            Self::write_problems(&mut output, app);
        }

        if report.dry_run {
            let _ = writeln!(output, "\nDry run: no changes were applied.");
        }

        output
    }

    /// Formats the result of a single-application command such as `start`.
    #[must_use]
    pub fn format_app(&self, report: &AppReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = if !report.is_success() {
                    format!("{} {}: {}\n", "✗".red(), report.app, Self::outcome_label(&report.outcome))
                } else if report.changeset.is_empty() {
                    format!("{} {}: nothing to do ({})\n", "✓".green(), report.app, report.phase)
                } else {
                    let ops: Vec<String> = report.applied.iter().map(ToString::to_string).collect();
                    format!("{} {}: {}\n", "✓".green(), report.app, ops.join(", "))
                };
                Self::write_problems(&mut output, report);
                output
            }
        }
    }

    /// Formats rendered diff lines, colored by marker.
    #[must_use]
    pub fn format_diff(&self, diff: &RenderedDiff) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diff).unwrap_or_default(),
            OutputFormat::Text => Self::format_diff_text(diff),
        }
    }

    fn format_diff_text(diff: &RenderedDiff) -> String {
        diff.lines
            .iter()
            .map(|line| format!("{}\n", Self::color_line(line)))
            .collect()
    }

    fn color_line(line: &DiffLine) -> String {
        let text = line.to_string();
        match line.marker {
            Marker::Added => text.green().to_string(),
            Marker::Removed => text.red().to_string(),
            Marker::Unchanged => text,
        }
    }

    fn summary_row(app: &AppReport) -> AppSummaryRow {
        AppSummaryRow {
            app: app.app.clone(),
            outcome: Self::outcome_label(&app.outcome),
            phase: app.phase.to_string(),
            applied: app.applied.len(),
            failed: app.failures.len(),
            skipped: app.skipped.len(),
        }
    }

    fn outcome_label(outcome: &ApplyOutcome) -> String {
        match outcome {
            ApplyOutcome::Planned => "planned".dimmed().to_string(),
            ApplyOutcome::FullyApplied => "applied".green().to_string(),
            ApplyOutcome::PartiallyApplied => "partially applied".yellow().to_string(),
            ApplyOutcome::RejectedBeforeStart { .. } => "rejected".red().to_string(),
        }
    }

    fn write_problems(output: &mut String, app: &AppReport) {
        if let ApplyOutcome::RejectedBeforeStart { reason } = &app.outcome {
            let _ = writeln!(output, "{} {}: {reason}", "✗".red(), app.app);
        }
        for failure in &app.failures {
            let _ = writeln!(output, "{} {}: {}", "✗".red(), failure.op, failure.message);
        }
        if !app.skipped.is_empty() {
            let skipped: Vec<String> = app.skipped.iter().map(ToString::to_string).collect();
            let _ = writeln!(output, "   not attempted: {}", skipped.join(", "));
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "success", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "warning", "message": message });
                serde_json::to_string(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "⚠".yellow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ChangeOp, ChangeSet, FieldDiff, FieldShape};

    fn report() -> AppReport {
        let mut changeset = ChangeSet::empty("web", false);
        changeset.ops.push(ChangeOp::Start);
        let mut field = FieldDiff::new("instances", FieldShape::Scalar);
        field.push(Marker::Removed, "1");
        field.push(Marker::Added, "3");
        changeset.annotations.push(field);
        AppReport::planned(changeset)
    }

    #[test]
    fn test_push_text_contains_diff_and_summary() {
        colored::control::set_override(false);
        let push = PushReport {
            apps: vec![report()],
            warnings: Vec::new(),
            dry_run: true,
        };

        let text = OutputFormatter::new(OutputFormat::Text).format_push(&push);
        assert!(text.contains("- instances: 1\n"));
        assert!(text.contains("+ instances: 3\n"));
        assert!(text.contains("planned"));
        assert!(text.contains("Dry run"));
    }

    #[test]
    fn test_push_json() {
        let push = PushReport {
            apps: vec![report()],
            warnings: vec![String::from("old flag")],
            dry_run: false,
        };

        let json = OutputFormatter::new(OutputFormat::Json).format_push(&push);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["apps"][0]["app"], "web");
        assert_eq!(value["apps"][0]["outcome"]["status"], "planned");
        assert_eq!(value["warnings"][0], "old flag");
    }

    #[test]
    fn test_rejected_app_shows_reason() {
        colored::control::set_override(false);
        let report = AppReport::rejected("web", "Cannot read application bits");
        let text = OutputFormatter::new(OutputFormat::Text).format_app(&report);
        assert!(text.contains("web: Cannot read application bits"));
    }
}
