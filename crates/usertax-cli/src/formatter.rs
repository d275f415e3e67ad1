//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use usertax_core::{Term, TermNode};
use usertax_sync::{BackfillReport, BulkEditReport};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format a flat term listing.
    fn format_terms(&self, terms: &[Term]) -> String;

    /// Format a term forest.
    fn format_tree(&self, forest: &[TermNode]) -> String;

    /// Format the outcome of a bulk edit.
    fn format_bulk(&self, action: &str, report: &BulkEditReport) -> String;

    /// Format a backfill report.
    fn format_backfill(&self, report: &BackfillReport) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_terms(&self, terms: &[Term]) -> String {
        if terms.is_empty() {
            return "No terms".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["id", "slug", "name", "parent", "count"]);
        for term in terms {
            table.add_row(vec![
                Cell::new(term.term_id),
                Cell::new(&term.slug),
                Cell::new(&term.name),
                Cell::new(term.parent),
                Cell::new(term.count),
            ]);
        }
        table.to_string()
    }

    fn format_tree(&self, forest: &[TermNode]) -> String {
        if forest.is_empty() {
            return "No terms".to_string();
        }

        let mut lines = Vec::new();
        for root in forest {
            root.walk(0, &mut |term, depth| {
                lines.push(format!(
                    "{}{} ({}) [{}]",
                    "  ".repeat(depth),
                    term.name,
                    term.slug,
                    term.count
                ));
            });
        }
        lines.join("\n")
    }

    fn format_bulk(&self, action: &str, report: &BulkEditReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["action", "updated", "unchanged", "skipped"]);
        table.add_row(vec![
            Cell::new(action),
            Cell::new(report.updated.len()),
            Cell::new(report.unchanged.len()),
            Cell::new(report.skipped.len()),
        ]);
        table.to_string()
    }

    fn format_backfill(&self, report: &BackfillReport) -> String {
        let mut output = format!(
            "Backfilled field {} into '{}': {} row(s) scanned, {} user(s) updated, {} unchanged",
            report.field_id,
            report.taxonomy,
            report.rows_scanned,
            report.users_updated,
            report.users_unchanged
        );
        for error in &report.errors {
            output.push_str(&format!("\n  user {}: {}", error.user_id, error.error_message));
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_terms(&self, terms: &[Term]) -> String {
        serde_json::to_string_pretty(terms).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_tree(&self, forest: &[TermNode]) -> String {
        serde_json::to_string_pretty(forest).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_bulk(&self, action: &str, report: &BulkEditReport) -> String {
        serde_json::json!({
            "action": action,
            "updated": report.updated,
            "unchanged": report.unchanged,
            "skipped": report.skipped,
        })
        .to_string()
    }

    fn format_backfill(&self, report: &BackfillReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }
}
